//! Function headers, call frames, and the `call`/`callf*`/`tailcall`/
//! `return` family (spec.md §3, §4.5). Grounded on spec.md §3's frame
//! layout description and on `original_source/exec.c`'s
//! `enter_function`/`do_return`.

use crate::error::{Fault, FaultResult};
use crate::stack::{CallStub, StoreDest};
use crate::vm::Vm;

const FN_STACK_CALL: u8 = 0xC0;
const FN_LOCAL_CALL: u8 = 0xC1;

struct FunctionHeader {
    stack_call: bool,
    locals_format: Vec<(u8, u8)>,
    code_start: u32,
}

fn parse_function_header(vm: &Vm, addr: u32) -> FaultResult<FunctionHeader> {
    let tag = vm.mem.read_u8(addr)? as u8;
    let stack_call = match tag {
        FN_STACK_CALL => true,
        FN_LOCAL_CALL => false,
        other => return Err(Fault::MalformedImage(format!("bad function tag {other:#x}"))),
    };
    let mut pos = addr + 1;
    let mut locals_format = Vec::new();
    loop {
        let ty = vm.mem.read_u8(pos)? as u8;
        let count = vm.mem.read_u8(pos + 1)? as u8;
        pos += 2;
        if ty == 0 && count == 0 {
            break;
        }
        locals_format.push((ty, count));
    }
    Ok(FunctionHeader {
        stack_call,
        locals_format,
        code_start: pos,
    })
}

/// Byte offset and width of the `index`-th local, walking the
/// locals-format groups in order (spec.md §3).
fn local_slot(locals_format: &[(u8, u8)], index: u32) -> Option<(u32, u32)> {
    let mut offset = 0u32;
    let mut seen = 0u32;
    for &(ty, count) in locals_format {
        let width = ty as u32;
        if width == 0 {
            continue;
        }
        if offset % width != 0 {
            offset += width - (offset % width);
        }
        for _ in 0..count {
            if seen == index {
                return Some((offset, width));
            }
            offset += width;
            seen += 1;
        }
    }
    None
}

impl Vm {
    /// Parse `func_addr`'s header, lay out a new frame, bind `args`
    /// per the function's calling convention, and position `pc` at its
    /// first instruction.
    pub(crate) fn enter_function(&mut self, func_addr: u32, args: &[u32]) -> FaultResult<()> {
        let header = parse_function_header(self, func_addr)?;
        let locals_pos = self.stack.enter_frame(&header.locals_format)?;

        if header.stack_call {
            for &a in args {
                self.stack.push_value(a)?;
            }
            self.stack.push_value(args.len() as u32)?;
        } else {
            for (i, &a) in args.iter().enumerate() {
                if let Some((offset, width)) = local_slot(&header.locals_format, i as u32) {
                    let addr = self.stack.local_addr(locals_pos, offset);
                    match width {
                        1 => self.stack.raw_write::<u8>(addr, a)?,
                        2 => self.stack.raw_write::<u16>(addr, a)?,
                        4 => self.stack.raw_write::<u32>(addr, a)?,
                        _ => unreachable!(),
                    }
                }
                // Extra arguments beyond the declared locals are
                // silently dropped, matching the reference
                // interpreter's "excess arguments are discarded" rule.
            }
        }

        self.locals_pos = locals_pos;
        self.pc = header.code_start;
        Ok(())
    }

    pub(crate) fn op_call(&mut self, func_addr: u32, argc: u32, dest: StoreDest) -> FaultResult<()> {
        let mut args = Vec::with_capacity(argc as usize);
        for _ in 0..argc {
            args.push(self.stack.pop_value()?);
        }
        args.reverse();
        let stub = CallStub {
            dest,
            pc: self.pc,
            frame_ptr: self.stack.frameptr(),
        };
        self.stack.push_callstub(stub)?;
        self.enter_function(func_addr, &args)
    }

    pub(crate) fn op_tailcall(&mut self, func_addr: u32, argc: u32) -> FaultResult<()> {
        let mut args = Vec::with_capacity(argc as usize);
        for _ in 0..argc {
            args.push(self.stack.pop_value()?);
        }
        args.reverse();
        self.stack.leave_function();
        self.enter_function(func_addr, &args)
    }

    pub(crate) fn op_callf(&mut self, func_addr: u32, args: &[u32], dest: StoreDest) -> FaultResult<()> {
        let stub = CallStub {
            dest,
            pc: self.pc,
            frame_ptr: self.stack.frameptr(),
        };
        self.stack.push_callstub(stub)?;
        self.enter_function(func_addr, args)
    }

    /// `return`: unwind the current frame and either resume the
    /// caller (storing the result through its call-stub) or, if this
    /// was the outermost bootstrap frame, halt the machine (spec.md
    /// §6's "the start function's return ends the program").
    pub(crate) fn op_return(&mut self, value: u32) -> FaultResult<()> {
        self.stack.leave_function();
        if self.stack.stackptr() == 0 {
            self.running = false;
            return Ok(());
        }
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

    fn sample_image(code: &[u8]) -> Vec<u8> {
        let ramstart = 64u32;
        let endmem = 256u32;
        let mut data = vec![0u8; endmem as usize];
        data[0..4].copy_from_slice(b"Glul");
        byteorder::BigEndian::write_u32(&mut data[4..8], 0x0003_0102);
        byteorder::BigEndian::write_u32(&mut data[8..12], ramstart);
        byteorder::BigEndian::write_u32(&mut data[12..16], ramstart);
        byteorder::BigEndian::write_u32(&mut data[16..20], endmem);
        byteorder::BigEndian::write_u32(&mut data[20..24], 256);
        byteorder::BigEndian::write_u32(&mut data[24..28], HEADER_LEN);
        data[HEADER_LEN as usize..HEADER_LEN as usize + code.len()].copy_from_slice(code);
        data
    }

    fn vm_with_code(code: &[u8]) -> Vm {
        let data = sample_image(code);
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
    fn bootstrap_enters_local_call_function_with_no_locals() {
        // 0xC1, terminator (0,0), then a single-byte opcode placeholder.
        let vm = vm_with_code(&[0xC1, 0x00, 0x00, 0x00]);
        assert_eq!(vm.pc(), HEADER_LEN + 3);
    }

    #[test]
    fn return_at_bootstrap_frame_halts() {
        let mut vm = vm_with_code(&[0xC1, 0x00, 0x00]);
        assert!(vm.is_running());
        vm.op_return(42).unwrap();
        assert!(!vm.is_running());
    }

    #[test]
    fn local_call_binds_arguments_into_locals() {
        // one local, 4 bytes wide
        let mut vm = vm_with_code(&[0xC1, 4, 1, 0, 0]);
        let locals_pos = vm.locals_pos;
        vm.enter_function(HEADER_LEN, &[99]).unwrap();
        let addr = vm.stack.local_addr(locals_pos, 0);
        assert_eq!(vm.stack.raw_read::<u32>(addr).unwrap(), 99);
    }
}
