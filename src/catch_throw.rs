//! `catch`/`throw`: non-local control flow, not an error channel
//! (spec.md §4.6). `catch` pushes an ordinary call-stub -- keyed by its
//! store destination, with `pc` set to the point right after its own
//! operands, exactly like `call`'s stub -- hands back the stack
//! position just past that stub as an opaque "catch token", and then
//! performs the jump named by its branch operand, exactly like `jump`.
//! `throw` unwinds the stack straight to a token and resumes through
//! the stub sitting there.

use crate::error::FaultResult;
use crate::stack::{CallStub, StoreDest};
use crate::vm::Vm;

impl Vm {
    /// `catch dest branch`: push a call-stub keyed by `dest` whose
    /// resume point is right after this instruction, return the token
    /// (current stack height) a matching `throw` must name, and perform
    /// the branch -- including its `0`/`1` leave-function/halt sentinels
    /// -- exactly as `jump` would.
    pub(crate) fn op_catch(&mut self, dest: StoreDest, branch: u32, pc_after_operand: u32) -> FaultResult<()> {
        let stub = CallStub {
            dest,
            pc: pc_after_operand,
            frame_ptr: self.stack.frameptr(),
        };
        self.stack.push_callstub(stub)?;
        let token = self.stack.stackptr();
        self.store(dest, token)?;
        self.perform_jump(branch, pc_after_operand)
    }

    /// `throw value token`: unwind to `token`, pop the call-stub that
    /// sits there, resume its frame, and store `value` through its
    /// destination.
    pub(crate) fn op_throw(&mut self, value: u32, token: u32) -> FaultResult<()> {
        self.stack.unwind_to(token)?;
        let stub = self.stack.pop_callstub()?;
        self.locals_pos = self.stack.resume_frame(stub.frame_ptr)?;
        self.pc = stub.pc;
        self.store(stub.dest, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{BumpHeap, InMemorySaveIo, NullHost, StdHostRng};
    use crate::image::{load, HEADER_LEN};

    fn vm_with_code(code: &[u8]) -> Vm {
        let mut data = vec![0u8; 256];
        data[0..4].copy_from_slice(b"Glul");
        byteorder::BigEndian::write_u32(&mut data[4..8], 0x0003_0102);
        byteorder::BigEndian::write_u32(&mut data[8..12], 64);
        byteorder::BigEndian::write_u32(&mut data[12..16], 64);
        byteorder::BigEndian::write_u32(&mut data[16..20], 256);
        byteorder::BigEndian::write_u32(&mut data[20..24], 256);
        byteorder::BigEndian::write_u32(&mut data[24..28], HEADER_LEN);
        data[HEADER_LEN as usize..HEADER_LEN as usize + code.len()].copy_from_slice(code);
        let loaded = load(data, 256).unwrap();
        Vm::new(
            loaded,
            Box::new(NullHost),
            Box::new(InMemorySaveIo::default()),
            Box::new(StdHostRng::default()),
            Box::new(BumpHeap::new(64, 256)),
        )
        .unwrap()
    }

    #[test]
    fn throw_resumes_through_catchs_destination() {
        let mut vm = vm_with_code(&[0xC1, 0x00, 0x00]);
        // branch == 2 is the fallthrough case: target == pc_after_operand.
        vm.op_catch(StoreDest::Memory(0x50), 2, vm.pc + 4).unwrap();
        let token = vm.mem.read_u32(0x50).unwrap();
        vm.stack.push_value(111).unwrap();
        vm.stack.push_value(222).unwrap();
        vm.op_throw(777, token).unwrap();
        assert_eq!(vm.mem.read_u32(0x50).unwrap(), 777);
    }
}
