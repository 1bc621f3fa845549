//! Collaborator traits: the narrow interfaces the dispatcher calls
//! through for everything spec.md §1 places out of the core's scope --
//! Glk I/O, platform RNG, and the heap allocator. Modeled on the
//! teacher's `MagicallyCallable` trait-object pattern
//! (`examples/LinuxRocks2000-anyvm/src/lib.rs`), which lets the VM hold
//! a boxed callback without knowing its concrete type.

use crate::error::FaultResult;

/// `host_tick`, `host_glk`, `host_stream_char`, `host_stream_unichar`
/// (spec.md §6). The Glk dispatch itself is entirely the host's
/// business; the core only knows how to call it.
pub trait HostIo {
    /// Called once per dispatcher iteration, before fetching the next
    /// opcode (spec.md §4.1, §5).
    fn tick(&mut self) {}

    /// `glk selector, argc, argv -> result`.
    fn glk(&mut self, selector: u32, args: &[u32]) -> FaultResult<u32>;

    fn stream_char(&mut self, ch: u8);
    fn stream_unichar(&mut self, ch: u32);
}

/// `host_random`/`host_seed_random` (spec.md §6). Per
/// `original_source/osdepend.c`, seeding with `0` means "reseed from
/// whatever platform entropy is available."
pub trait HostRng {
    fn next_u32(&mut self) -> u32;
    fn reseed(&mut self, seed: u32);
}

/// `host_malloc`/`host_realloc`/`host_free`, narrowed to the heap
/// opcodes' view: allocate/free regions inside the memory image,
/// returning `0` on failure (spec.md §4.11, §7).
pub trait Heap {
    fn alloc(&mut self, size: u32) -> u32;
    fn free(&mut self, addr: u32);
}

/// `host_save(stream) -> ok?` / `host_restore(stream) -> ok?` (spec.md
/// §6), narrowed from an opaque stream handle to plain bytes: the core
/// serializes/deserializes the IFF payload itself (see `save.rs`) and
/// only asks the host to persist or retrieve the resulting blob for a
/// given stream id.
pub trait SaveIo {
    fn save(&mut self, stream_id: u32, bytes: &[u8]) -> bool;
    fn restore(&mut self, stream_id: u32) -> Option<Vec<u8>>;
}

/// A host that cannot do I/O at all -- useful for headless tests of the
/// dispatcher's arithmetic/control-flow behavior, where no opcode under
/// test touches Glk.
#[derive(Default)]
pub struct NullHost;

impl HostIo for NullHost {
    fn glk(&mut self, selector: u32, _args: &[u32]) -> FaultResult<u32> {
        Err(crate::error::Fault::UnresolvedGlkSelector(selector))
    }

    fn stream_char(&mut self, _ch: u8) {}
    fn stream_unichar(&mut self, _ch: u32) {}
}

/// A bump allocator over a byte range, adequate for tests and for hosts
/// that don't need reclamation smarts. Production embedders are
/// expected to supply their own `Heap` (spec.md §1 lists heap bookkeeping
/// as an external collaborator).
pub struct BumpHeap {
    next: u32,
    limit: u32,
}

impl BumpHeap {
    pub fn new(start: u32, limit: u32) -> Self {
        BumpHeap { next: start, limit }
    }
}

impl Heap for BumpHeap {
    fn alloc(&mut self, size: u32) -> u32 {
        let addr = self.next;
        match addr.checked_add(size) {
            Some(end) if end <= self.limit => {
                self.next = end;
                addr
            }
            _ => 0,
        }
    }

    fn free(&mut self, _addr: u32) {
        // Bump allocator: no reclamation. Real embedders replace this.
    }
}

/// An in-memory stand-in for a host's named save streams, used by tests
/// and the CLI's `--save` flag's sibling in-process mode.
#[derive(Default)]
pub struct InMemorySaveIo {
    streams: std::collections::HashMap<u32, Vec<u8>>,
}

impl SaveIo for InMemorySaveIo {
    fn save(&mut self, stream_id: u32, bytes: &[u8]) -> bool {
        self.streams.insert(stream_id, bytes.to_vec());
        true
    }

    fn restore(&mut self, stream_id: u32) -> Option<Vec<u8>> {
        self.streams.get(&stream_id).cloned()
    }
}

/// `rand`-backed RNG matching `osdepend.c`'s `glulx_random`/
/// `glulx_setrandom`: seed `0` pulls from the OS entropy source via
/// `rand::rngs::OsRng`, any other seed is deterministic.
pub struct StdHostRng {
    rng: rand::rngs::StdRng,
}

impl Default for StdHostRng {
    fn default() -> Self {
        use rand::SeedableRng;
        StdHostRng {
            rng: rand::rngs::StdRng::from_entropy(),
        }
    }
}

impl HostRng for StdHostRng {
    fn next_u32(&mut self) -> u32 {
        use rand::RngCore;
        self.rng.next_u32()
    }

    fn reseed(&mut self, seed: u32) {
        use rand::SeedableRng;
        if seed == 0 {
            self.rng = rand::rngs::StdRng::from_entropy();
        } else {
            self.rng = rand::rngs::StdRng::seed_from_u64(seed as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_heap_fails_past_limit() {
        let mut heap = BumpHeap::new(100, 108);
        assert_eq!(heap.alloc(4), 100);
        assert_eq!(heap.alloc(4), 104);
        assert_eq!(heap.alloc(4), 0);
    }

    #[test]
    fn in_memory_save_round_trips() {
        let mut io = InMemorySaveIo::default();
        assert!(io.save(1, &[1, 2, 3]));
        assert_eq!(io.restore(1), Some(vec![1, 2, 3]));
        assert_eq!(io.restore(2), None);
    }
}
