//! Direct value-stack manipulation opcodes (spec.md §4.7):
//! `stkcount`/`stkpeek`/`stkswap`/`stkcopy`/`stkroll`. Thin glue over
//! `Stack`'s primitives -- all the bounds-checking lives there.

use crate::error::FaultResult;
use crate::vm::Vm;

impl Vm {
    pub(crate) fn op_stkcount(&self) -> u32 {
        self.stack.count()
    }

    pub(crate) fn op_stkpeek(&self, index: u32) -> FaultResult<u32> {
        self.stack.peek_value(index)
    }

    pub(crate) fn op_stkswap(&mut self) -> FaultResult<()> {
        self.stack.swap_top_two()
    }

    pub(crate) fn op_stkcopy(&mut self, n: u32) -> FaultResult<()> {
        self.stack.copy_top_n(n)
    }

    pub(crate) fn op_stkroll(&mut self, n: u32, places: i32) -> FaultResult<()> {
        self.stack.roll_top_n(n, places)
    }
}
