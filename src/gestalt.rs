//! The miscellaneous "ask the interpreter about itself" and
//! machine-lifecycle opcodes: `gestalt`, `getmemsize`/`setmemsize`,
//! `random`/`setrandom`, `quit`/`verify`/`restart`,
//! `save`/`restore`/`saveundo`/`restoreundo`/`hasundo`/`discardundo`,
//! `protect`, `getiosys`/`setiosys`, `getstringtbl`/`setstringtbl`,
//! `malloc`/`mfree`, `accelfunc`/`accelparam`, and `debugtrap` (spec.md
//! §4.11, §5, §6, §7). Version/selector numbers grounded on
//! `original_source/gestalt.c`.

use crate::error::{Fault, FaultResult};
use crate::save::{read_iff, write_iff, MachineSnapshot};
use crate::stack::StoreDest;
use crate::vm::Vm;

const GESTALT_VERSION: u32 = 0;
const GESTALT_TERP_VERSION: u32 = 1;
const GESTALT_RESIZE_MEM: u32 = 2;
const GESTALT_UNDO: u32 = 3;
const GESTALT_IO_SYSTEM: u32 = 4;
const GESTALT_UNICODE: u32 = 5;
const GESTALT_MEM_COPY: u32 = 6;
const GESTALT_MALLOC: u32 = 7;
const GESTALT_MALLOC_HEAP: u32 = 8;
const GESTALT_ACCELERATION: u32 = 9;
const GESTALT_ACCEL_FUNC: u32 = 10;
const GESTALT_FLOAT: u32 = 11;
const GESTALT_EXT_UNDO: u32 = 12;

const IOSYS_NULL: u32 = 0;
const IOSYS_FILTER: u32 = 1;
const IOSYS_GLK: u32 = 2;

impl Vm {
    pub(crate) fn op_gestalt(&self, selector: u32, arg: u32) -> u32 {
        match selector {
            GESTALT_VERSION => 0x0003_0102,
            GESTALT_TERP_VERSION => GESTALT_TERP_VERSION,
            GESTALT_RESIZE_MEM => 1,
            GESTALT_UNDO => 1,
            GESTALT_IO_SYSTEM => match arg {
                IOSYS_NULL | IOSYS_FILTER | IOSYS_GLK => 1,
                _ => 0,
            },
            GESTALT_UNICODE => 1,
            GESTALT_MEM_COPY => 1,
            GESTALT_MALLOC => 1,
            GESTALT_MALLOC_HEAP => 0,
            GESTALT_ACCELERATION => 0,
            GESTALT_ACCEL_FUNC => 0,
            GESTALT_FLOAT => 0,
            GESTALT_EXT_UNDO => 1,
            _ => 0,
        }
    }

    pub(crate) fn op_getmemsize(&self) -> u32 {
        self.mem.endmem()
    }

    /// Returns the program-visible success flag (`0` on success, `1`
    /// on failure), not a `Fault` -- alignment/range violations are
    /// ordinary failures (spec.md §7).
    pub(crate) fn op_setmemsize(&mut self, new_size: u32) -> FaultResult<u32> {
        Ok(if self.mem.set_mem_size(new_size)? { 0 } else { 1 })
    }

    pub(crate) fn op_random(&mut self, range: u32) -> u32 {
        if range == 0 {
            self.rng.next_u32()
        } else if (range as i32) < 0 {
            let span = (-(range as i32)) as u32;
            (self.rng.next_u32() % span).wrapping_neg()
        } else {
            self.rng.next_u32() % range
        }
    }

    pub(crate) fn op_setrandom(&mut self, seed: u32) {
        self.rng.reseed(seed);
    }

    pub(crate) fn op_quit(&mut self) {
        self.running = false;
    }

    pub(crate) fn op_verify(&self) -> u32 {
        let computed = self.mem.recompute_checksum(self.checksum_offset);
        if computed == self.expected_checksum {
            0
        } else {
            1
        }
    }

    pub(crate) fn op_restart(&mut self, startfunc: u32) -> FaultResult<()> {
        self.mem.restart();
        self.stack = crate::stack::Stack::new(self.stack.size());
        self.enter_function(startfunc, &[])
    }

    pub(crate) fn op_protect(&mut self, start: u32, len: u32) {
        self.mem.set_protect_range(start, start.wrapping_add(len));
    }

    fn snapshot(&self, save_dest: StoreDest) -> MachineSnapshot {
        MachineSnapshot {
            ram: self.mem.ram().to_vec(),
            endmem: self.mem.endmem(),
            stack_bytes: self.stack.as_bytes().to_vec(),
            stackptr: self.stack.stackptr(),
            frameptr: self.stack.frameptr(),
            valstackbase: self.stack.valstackbase(),
            pc: self.pc,
            save_dest,
        }
    }

    fn apply_snapshot(&mut self, snap: &MachineSnapshot) -> FaultResult<()> {
        self.mem.set_mem_size(snap.endmem)?;
        for (i, &b) in snap.ram.iter().enumerate() {
            self.mem.write_u8(self.mem.ramstart() + i as u32, b as u32)?;
        }
        self.stack
            .restore_raw(&snap.stack_bytes, snap.stackptr, snap.frameptr, snap.valstackbase);
        self.locals_pos = self.stack.locals_pos_of(snap.frameptr)?;
        self.pc = snap.pc;
        Ok(())
    }

    pub(crate) fn op_save(&mut self, stream_id: u32, dest: StoreDest) -> FaultResult<u32> {
        let snap = self.snapshot(dest);
        let mut bytes = Vec::new();
        write_iff(&snap, &mut bytes)
            .map_err(|e| Fault::Other(format!("save serialization failed: {e}")))?;
        Ok(if self.save_io.save(stream_id, &bytes) { 0 } else { 1 })
    }

    /// On success, execution resumes at the *saved* call-stub's
    /// destination and PC, not at whatever follows this opcode (spec.md
    /// §8) -- so this never returns a value through `restore`'s own
    /// store operand on the success path.
    pub(crate) fn op_restore(&mut self, stream_id: u32) -> FaultResult<Option<u32>> {
        let Some(bytes) = self.save_io.restore(stream_id) else {
            return Ok(Some(1));
        };
        let mut cursor = std::io::Cursor::new(bytes);
        let snap = read_iff(&mut cursor)
            .map_err(|_| Fault::MalformedImage("corrupt save file".into()))?;
        let dest = snap.save_dest;
        self.apply_snapshot(&snap)?;
        self.store(dest, 0xFFFF_FFFF)?;
        Ok(None)
    }

    pub(crate) fn op_saveundo(&mut self, dest: StoreDest) -> u32 {
        self.undo_ring.push(self.snapshot(dest));
        0
    }

    pub(crate) fn op_restoreundo(&mut self) -> FaultResult<Option<u32>> {
        let Some(snap) = self.undo_ring.pop() else {
            return Ok(Some(1));
        };
        let dest = snap.save_dest;
        self.apply_snapshot(&snap)?;
        self.store(dest, 0xFFFF_FFFF)?;
        Ok(None)
    }

    pub(crate) fn op_hasundo(&self) -> u32 {
        if self.undo_ring.has_any() {
            0
        } else {
            1
        }
    }

    pub(crate) fn op_discardundo(&mut self) {
        self.undo_ring.discard_all();
    }

    pub(crate) fn op_getiosys(&self) -> (u32, u32) {
        (self.iosys_mode, self.iosys_rock)
    }

    pub(crate) fn op_setiosys(&mut self, mode: u32, rock: u32) {
        self.iosys_mode = mode;
        self.iosys_rock = rock;
    }

    pub(crate) fn op_getstringtbl(&self) -> u32 {
        self.string_table
    }

    pub(crate) fn op_setstringtbl(&mut self, addr: u32) {
        self.string_table = addr;
    }

    pub(crate) fn op_malloc(&mut self, size: u32) -> u32 {
        self.heap.alloc(size)
    }

    pub(crate) fn op_mfree(&mut self, addr: u32) {
        self.heap.free(addr)
    }

    /// Acceleration is out of this core's scope (spec.md §1): these
    /// opcodes are accepted but always report "not accelerated."
    pub(crate) fn op_accelfunc(&mut self, _index: u32, _addr: u32) {}

    pub(crate) fn op_accelparam(&mut self, _index: u32, _value: u32) {}

    pub(crate) fn op_debugtrap(&mut self, code: u32) -> FaultResult<()> {
        Err(Fault::DebugTrap(code))
    }
}
