//! Array/memory-block opcodes: the `aload*`/`astore*` family, bit
//! addressing, and `mzero`/`mcopy` (spec.md §4.8). Grounded on
//! `original_source/exec.c`'s operand-width switch for the `aload`
//! family.

use crate::error::FaultResult;
use crate::vm::Vm;

impl Vm {
    pub(crate) fn op_aload(&self, addr: u32, index: u32) -> FaultResult<u32> {
        self.mem.read_u32(addr.wrapping_add(index.wrapping_mul(4)))
    }

    pub(crate) fn op_aloads(&self, addr: u32, index: u32) -> FaultResult<u32> {
        self.mem.read_u16(addr.wrapping_add(index.wrapping_mul(2)))
    }

    pub(crate) fn op_aloadb(&self, addr: u32, index: u32) -> FaultResult<u32> {
        self.mem.read_u8(addr.wrapping_add(index))
    }

    /// Bit index `i` may run negative relative to `addr`; both the byte
    /// offset and the in-byte bit position use floor division so that
    /// `i = -1` addresses bit 7 of the byte before `addr`.
    pub(crate) fn op_aloadbit(&self, addr: u32, index: i32) -> FaultResult<u32> {
        let (byte_off, bit) = bit_split(index);
        let byte = self.mem.read_u8(addr.wrapping_add(byte_off as u32))?;
        Ok((byte >> bit) & 1)
    }

    pub(crate) fn op_astore(&mut self, addr: u32, index: u32, value: u32) -> FaultResult<()> {
        self.mem.write_u32(addr.wrapping_add(index.wrapping_mul(4)), value)
    }

    pub(crate) fn op_astores(&mut self, addr: u32, index: u32, value: u32) -> FaultResult<()> {
        self.mem.write_u16(addr.wrapping_add(index.wrapping_mul(2)), value)
    }

    pub(crate) fn op_astoreb(&mut self, addr: u32, index: u32, value: u32) -> FaultResult<()> {
        self.mem.write_u8(addr.wrapping_add(index), value)
    }

    pub(crate) fn op_astorebit(&mut self, addr: u32, index: i32, value: u32) -> FaultResult<()> {
        let (byte_off, bit) = bit_split(index);
        let byte_addr = addr.wrapping_add(byte_off as u32);
        let mut byte = self.mem.read_u8(byte_addr)?;
        if value != 0 {
            byte |= 1 << bit;
        } else {
            byte &= !(1 << bit);
        }
        self.mem.write_u8(byte_addr, byte)
    }

    pub(crate) fn op_mzero(&mut self, addr: u32, len: u32) -> FaultResult<()> {
        self.mem.zero_fill(addr, len)
    }

    pub(crate) fn op_mcopy(&mut self, src: u32, dest: u32, len: u32) -> FaultResult<()> {
        self.mem.copy_within(src, dest, len)
    }
}

fn bit_split(index: i32) -> (i32, u32) {
    let byte_off = index.div_euclid(8);
    let bit = index.rem_euclid(8) as u32;
    (byte_off, bit)
}
