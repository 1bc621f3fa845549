//! Conditional and unconditional jumps (spec.md §4.4), including the
//! `PerformJump` special cases for branch values `0`/`1` ("leave the
//! current function, optionally as if returning that value") grounded
//! on `original_source/exec.c`'s `PerformJump`.

use crate::error::FaultResult;
use crate::vm::Vm;

pub fn is_zero(a: u32) -> bool {
    a == 0
}

pub fn eq(a: u32, b: u32) -> bool {
    a == b
}

pub fn lt(a: u32, b: u32) -> bool {
    (a as i32) < (b as i32)
}

pub fn le(a: u32, b: u32) -> bool {
    (a as i32) <= (b as i32)
}

pub fn gt(a: u32, b: u32) -> bool {
    (a as i32) > (b as i32)
}

pub fn ge(a: u32, b: u32) -> bool {
    (a as i32) >= (b as i32)
}

pub fn ltu(a: u32, b: u32) -> bool {
    a < b
}

pub fn leu(a: u32, b: u32) -> bool {
    a <= b
}

pub fn gtu(a: u32, b: u32) -> bool {
    a > b
}

pub fn geu(a: u32, b: u32) -> bool {
    a >= b
}

impl Vm {
    /// `branch_value` is the already-decoded (sign-extended) load
    /// operand naming the jump target; `pc_after_operand` is `pc` as it
    /// stands right after that operand was read (spec.md §4.4's `-2`
    /// bias is relative to that point, not to the opcode's start).
    pub(crate) fn perform_jump(&mut self, branch_value: u32, pc_after_operand: u32) -> FaultResult<()> {
        match branch_value as i32 {
            0 => self.op_return(0),
            1 => self.op_return(1),
            bv => {
                self.pc = (pc_after_operand as i64 + bv as i64 - 2) as u32;
                Ok(())
            }
        }
    }
}
