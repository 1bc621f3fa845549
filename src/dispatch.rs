//! The outer loop: fetch the next opcode, decode its operands, select
//! behavior, store the result (spec.md §2's "Dispatcher", §4.1).
//! Opcode-number encoding grounded on `original_source/exec.c`'s
//! `execute_loop`; the per-opcode behavior itself lives in the sibling
//! `arithmetic`/`branch`/`call`/`catch_throw`/`stack_ops`/`array_ops`/
//! `search`/`gestalt`/`stream` modules, all as `impl Vm` blocks.

use log::trace;

use crate::error::{Fault, FaultResult};
use crate::opcode::Opcode;
use crate::operand::{decode_operands, DecodeContext};
use crate::stack::StoreDest;
use crate::vm::Vm;

/// Read the variable-length opcode number at `pc`, per spec.md §4.1:
/// top two bits `00` -> 1-byte opcode (0x00-0x7F); top two bits `10` ->
/// 2-byte opcode (0x0000-0x3FFF); top two bits `11` -> 4-byte opcode.
fn fetch_opcode_number(vm: &Vm, pc: &mut u32) -> FaultResult<u32> {
    let first = vm.mem().read_u8(*pc)?;
    if first & 0x80 == 0 {
        *pc += 1;
        Ok(first)
    } else if first & 0xC0 == 0x80 {
        let second = vm.mem().read_u8(*pc + 1)?;
        *pc += 2;
        Ok(((first & 0x3F) << 8) | second)
    } else {
        let b1 = vm.mem().read_u8(*pc + 1)?;
        let b2 = vm.mem().read_u8(*pc + 2)?;
        let b3 = vm.mem().read_u8(*pc + 3)?;
        *pc += 4;
        Ok(((first & 0x3F) << 24) | (b1 << 16) | (b2 << 8) | b3)
    }
}

impl Vm {
    pub(crate) fn store(&mut self, dest: StoreDest, value: u32) -> FaultResult<()> {
        match dest {
            StoreDest::Discard => Ok(()),
            StoreDest::Memory(addr) => self.mem.write_u32(addr, value),
            StoreDest::Local(addr) => self.stack.raw_write::<u32>(addr, value),
            StoreDest::Stack => self.stack.push_value(value),
        }
    }

    /// Execute exactly one instruction. Returns `Ok(())` having updated
    /// `pc`/state, or `Err` on an unrecoverable fault (spec.md §2).
    pub fn step(&mut self) -> FaultResult<()> {
        self.host_io.tick();

        let mut pc = self.pc;
        let opnum = fetch_opcode_number(self, &mut pc)?;
        let op = Opcode::try_from(opnum).map_err(|_| Fault::UnknownOpcode(opnum))?;
        let shape = op.shape();

        let mut cx = DecodeContext {
            mem: &self.mem,
            stack: &mut self.stack,
            locals_pos: self.locals_pos,
        };
        let operands = decode_operands(&shape, &mut cx, &mut pc)?;
        self.pc = pc;
        trace!("{op:?} loads={:?} stores={:?}", operands.loads, operands.stores);

        self.execute(op, &operands.loads, &operands.stores)
    }

    /// Run until the machine halts (`quit`, the bootstrap function
    /// returning, or a fault).
    pub fn run(&mut self) -> FaultResult<()> {
        while self.running {
            self.step()?;
        }
        Ok(())
    }

    fn execute(&mut self, op: Opcode, loads: &[u32], stores: &[StoreDest]) -> FaultResult<()> {
        use Opcode::*;

        let pc_after_operands = self.pc;
        let store0 = |s: &[StoreDest]| s.first().copied().unwrap_or(StoreDest::Discard);

        match op {
            NOP => Ok(()),

            ADD => self.store(store0(stores), crate::arithmetic::add(loads[0], loads[1])),
            SUB => self.store(store0(stores), crate::arithmetic::sub(loads[0], loads[1])),
            MUL => self.store(store0(stores), crate::arithmetic::mul(loads[0], loads[1])),
            DIV => {
                let v = crate::arithmetic::div(loads[0], loads[1])?;
                self.store(store0(stores), v)
            }
            MOD => {
                let v = crate::arithmetic::rem(loads[0], loads[1])?;
                self.store(store0(stores), v)
            }
            NEG => self.store(store0(stores), crate::arithmetic::neg(loads[0])),

            BITAND => self.store(store0(stores), crate::arithmetic::bitand(loads[0], loads[1])),
            BITOR => self.store(store0(stores), crate::arithmetic::bitor(loads[0], loads[1])),
            BITXOR => self.store(store0(stores), crate::arithmetic::bitxor(loads[0], loads[1])),
            BITNOT => self.store(store0(stores), crate::arithmetic::bitnot(loads[0])),
            SHIFTL => self.store(store0(stores), crate::arithmetic::shiftl(loads[0], loads[1])),
            SSHIFTR => self.store(store0(stores), crate::arithmetic::sshiftr(loads[0], loads[1])),
            USHIFTR => self.store(store0(stores), crate::arithmetic::ushiftr(loads[0], loads[1])),

            SEXS => self.store(store0(stores), crate::arithmetic::sexs(loads[0])),
            SEXB => self.store(store0(stores), crate::arithmetic::sexb(loads[0])),
            COPY => self.store(store0(stores), loads[0]),
            COPYS => self.store(store0(stores), loads[0] & 0xFFFF),
            COPYB => self.store(store0(stores), loads[0] & 0xFF),

            JUMP => self.perform_jump(loads[0], pc_after_operands),
            JZ => self.branch_if(crate::branch::is_zero(loads[0]), loads[1], pc_after_operands),
            JNZ => self.branch_if(!crate::branch::is_zero(loads[0]), loads[1], pc_after_operands),
            JEQ => self.branch_if(crate::branch::eq(loads[0], loads[1]), loads[2], pc_after_operands),
            JNE => self.branch_if(!crate::branch::eq(loads[0], loads[1]), loads[2], pc_after_operands),
            JLT => self.branch_if(crate::branch::lt(loads[0], loads[1]), loads[2], pc_after_operands),
            JGE => self.branch_if(crate::branch::ge(loads[0], loads[1]), loads[2], pc_after_operands),
            JGT => self.branch_if(crate::branch::gt(loads[0], loads[1]), loads[2], pc_after_operands),
            JLE => self.branch_if(crate::branch::le(loads[0], loads[1]), loads[2], pc_after_operands),
            JLTU => self.branch_if(crate::branch::ltu(loads[0], loads[1]), loads[2], pc_after_operands),
            JGEU => self.branch_if(crate::branch::geu(loads[0], loads[1]), loads[2], pc_after_operands),
            JGTU => self.branch_if(crate::branch::gtu(loads[0], loads[1]), loads[2], pc_after_operands),
            JLEU => self.branch_if(crate::branch::leu(loads[0], loads[1]), loads[2], pc_after_operands),
            JUMPABS => {
                self.pc = loads[0];
                Ok(())
            }

            CALL => self.op_call(loads[0], loads[1], store0(stores)),
            TAILCALL => self.op_tailcall(loads[0], loads[1]),
            RETURN => self.op_return(loads[0]),
            CALLF => self.op_callf(loads[0], &[], store0(stores)),
            CALLFI => self.op_callf(loads[0], &loads[1..2], store0(stores)),
            CALLFII => self.op_callf(loads[0], &loads[1..3], store0(stores)),
            CALLFIII => self.op_callf(loads[0], &loads[1..4], store0(stores)),

            CATCH => self.op_catch(store0(stores), loads[0], pc_after_operands),
            THROW => self.op_throw(loads[0], loads[1]),

            ALOAD => {
                let v = self.op_aload(loads[0], loads[1])?;
                self.store(store0(stores), v)
            }
            ALOADS => {
                let v = self.op_aloads(loads[0], loads[1])?;
                self.store(store0(stores), v)
            }
            ALOADB => {
                let v = self.op_aloadb(loads[0], loads[1])?;
                self.store(store0(stores), v)
            }
            ALOADBIT => {
                let v = self.op_aloadbit(loads[0], loads[1] as i32)?;
                self.store(store0(stores), v)
            }
            ASTORE => self.op_astore(loads[0], loads[1], loads[2]),
            ASTORES => self.op_astores(loads[0], loads[1], loads[2]),
            ASTOREB => self.op_astoreb(loads[0], loads[1], loads[2]),
            ASTOREBIT => self.op_astorebit(loads[0], loads[1] as i32, loads[2]),
            MZERO => self.op_mzero(loads[0], loads[1]),
            MCOPY => self.op_mcopy(loads[0], loads[1], loads[2]),

            STKCOUNT => self.store(store0(stores), self.op_stkcount()),
            STKPEEK => {
                let v = self.op_stkpeek(loads[0])?;
                self.store(store0(stores), v)
            }
            STKSWAP => self.op_stkswap(),
            STKCOPY => self.op_stkcopy(loads[0]),
            STKROLL => self.op_stkroll(loads[0], loads[1] as i32),

            STREAMCHAR => {
                self.op_streamchar(loads[0]);
                Ok(())
            }
            STREAMUNICHAR => {
                self.op_streamunichar(loads[0]);
                Ok(())
            }
            STREAMNUM => {
                self.op_streamnum(loads[0]);
                Ok(())
            }
            STREAMSTR => self.op_streamstr(loads[0]),

            GESTALT => {
                let v = self.op_gestalt(loads[0], loads[1]);
                self.store(store0(stores), v)
            }
            DEBUGTRAP => self.op_debugtrap(loads[0]),
            GETMEMSIZE => self.store(store0(stores), self.op_getmemsize()),
            SETMEMSIZE => {
                let v = self.op_setmemsize(loads[0])?;
                self.store(store0(stores), v)
            }

            RANDOM => {
                let v = self.op_random(loads[0]);
                self.store(store0(stores), v)
            }
            SETRANDOM => {
                self.op_setrandom(loads[0]);
                Ok(())
            }

            QUIT => {
                self.op_quit();
                Ok(())
            }
            VERIFY => self.store(store0(stores), self.op_verify()),
            RESTART => self.op_restart(self.startfunc_hint()),
            SAVE => {
                let v = self.op_save(loads[0], store0(stores))?;
                self.store(store0(stores), v)
            }
            RESTORE => match self.op_restore(loads[0])? {
                Some(v) => self.store(store0(stores), v),
                None => Ok(()),
            },
            SAVEUNDO => {
                let v = self.op_saveundo(store0(stores));
                self.store(store0(stores), v)
            }
            RESTOREUNDO => match self.op_restoreundo()? {
                Some(v) => self.store(store0(stores), v),
                None => Ok(()),
            },
            HASUNDO => self.store(store0(stores), self.op_hasundo()),
            DISCARDUNDO => {
                self.op_discardundo();
                Ok(())
            }
            PROTECT => {
                self.op_protect(loads[0], loads[1]);
                Ok(())
            }

            GLK => {
                let v = self.op_glk(loads[0], loads[1])?;
                self.store(store0(stores), v)
            }

            GETSTRINGTBL => self.store(store0(stores), self.op_getstringtbl()),
            SETSTRINGTBL => {
                self.op_setstringtbl(loads[0]);
                Ok(())
            }
            GETIOSYS => {
                let (mode, rock) = self.op_getiosys();
                self.store(stores[0], mode)?;
                self.store(stores[1], rock)
            }
            SETIOSYS => {
                self.op_setiosys(loads[0], loads[1]);
                Ok(())
            }

            LINEARSEARCH => {
                let v = self.op_linearsearch(
                    loads[0], loads[1], loads[2], loads[3], loads[4], loads[5], loads[6],
                )?;
                self.store(store0(stores), v)
            }
            BINARYSEARCH => {
                let v = self.op_binarysearch(
                    loads[0], loads[1], loads[2], loads[3], loads[4], loads[5], loads[6],
                )?;
                self.store(store0(stores), v)
            }
            LINKEDSEARCH => {
                let v = self.op_linkedsearch(loads[0], loads[1], loads[2], loads[3], loads[4], loads[5])?;
                self.store(store0(stores), v)
            }

            MALLOC => {
                let v = self.op_malloc(loads[0]);
                self.store(store0(stores), v)
            }
            MFREE => {
                self.op_mfree(loads[0]);
                Ok(())
            }
            ACCELFUNC => {
                self.op_accelfunc(loads[0], loads[1]);
                Ok(())
            }
            ACCELPARAM => {
                self.op_accelparam(loads[0], loads[1]);
                Ok(())
            }
        }
    }

    fn branch_if(&mut self, cond: bool, branch_value: u32, pc_after_operands: u32) -> FaultResult<()> {
        if cond {
            self.perform_jump(branch_value, pc_after_operands)
        } else {
            Ok(())
        }
    }

    /// `restart` re-enters the program's original start function; this
    /// core keeps that address around for exactly that purpose.
    fn startfunc_hint(&self) -> u32 {
        self.restart_startfunc
    }
}
