//! The machine itself: memory, stack, program counter, and the boxed
//! collaborators the dispatcher calls through for anything this core
//! delegates to the host (spec.md §1, §6). Modeled on the teacher's
//! `Machine` struct holding boxed trait objects for the parts it
//! doesn't implement itself.

use crate::error::FaultResult;
use crate::host::{Heap, HostIo, HostRng, SaveIo};
use crate::image::LoadedImage;
use crate::memory::Memory;
use crate::save::UndoRing;
use crate::stack::Stack;

/// How many `saveundo` snapshots to retain before evicting the oldest
/// (spec.md §5 leaves this host-configurable; we pick a fixed depth).
pub const DEFAULT_UNDO_DEPTH: usize = 8;

pub struct Vm {
    pub(crate) mem: Memory,
    pub(crate) stack: Stack,
    pub(crate) pc: u32,
    pub(crate) locals_pos: u32,
    pub(crate) running: bool,

    pub(crate) host_io: Box<dyn HostIo>,
    pub(crate) save_io: Box<dyn SaveIo>,
    pub(crate) rng: Box<dyn HostRng>,
    pub(crate) heap: Box<dyn Heap>,
    pub(crate) undo_ring: UndoRing,

    pub(crate) decoding_table: u32,
    pub(crate) checksum_offset: u32,
    pub(crate) expected_checksum: u32,
    pub(crate) iosys_mode: u32,
    pub(crate) iosys_rock: u32,
    pub(crate) string_table: u32,
    pub(crate) restart_startfunc: u32,
}

impl Vm {
    /// Build a `Vm` and perform the bootstrap call into `startfunc`
    /// (spec.md §6): the start function runs as an ordinary call with
    /// zero arguments, except that no call-stub is pushed for it, so
    /// `return` at the outermost frame has nothing to pop and instead
    /// halts the machine (see `call::op_return`).
    pub fn new(
        image: LoadedImage,
        host_io: Box<dyn HostIo>,
        save_io: Box<dyn SaveIo>,
        rng: Box<dyn HostRng>,
        heap: Box<dyn Heap>,
    ) -> FaultResult<Self> {
        let stack = Stack::new(image.header.stacksize);
        let startfunc = image.header.startfunc;
        let mut vm = Vm {
            mem: image.memory,
            stack,
            pc: 0,
            locals_pos: 0,
            running: true,
            host_io,
            save_io,
            rng,
            heap,
            undo_ring: UndoRing::new(DEFAULT_UNDO_DEPTH),
            decoding_table: image.header.decoding_table,
            checksum_offset: crate::image::CHECKSUM_OFFSET,
            expected_checksum: image.header.checksum,
            iosys_mode: 0,
            iosys_rock: 0,
            string_table: 0,
            restart_startfunc: startfunc,
        };
        vm.enter_function(startfunc, &[])?;
        Ok(vm)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn mem(&self) -> &Memory {
        &self.mem
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }
}
