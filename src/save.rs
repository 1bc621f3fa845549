//! `save`/`restore`/`saveundo`/`restoreundo` and the IFF container they
//! write. Grounded on spec.md §5's description of the `Quetzal`-style
//! chunked format (`IFhd`/`CMem`/`Stks` under a top-level `FORM`/`IFZS`)
//! and on the restore subtlety called out in spec.md §8: a restored
//! machine reports success through the *save opcode's* original store
//! destination, not through whatever opcode happens to run next.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{Fault, FaultResult};
use crate::stack::StoreDest;

/// Everything needed to resume execution exactly where `save` left off,
/// plus the one piece of bookkeeping that isn't part of the machine
/// state: where to write the `-1`/`0` success flag once restored.
#[derive(Debug, Clone)]
pub struct MachineSnapshot {
    pub ram: Vec<u8>,
    pub endmem: u32,
    pub stack_bytes: Vec<u8>,
    pub stackptr: u32,
    pub frameptr: u32,
    pub valstackbase: u32,
    pub pc: u32,
    pub save_dest: StoreDest,
}

const FORM_ID: [u8; 4] = *b"FORM";
const IFZS_ID: [u8; 4] = *b"IFZS";
const CMEM_ID: [u8; 4] = *b"CMem";
const STKS_ID: [u8; 4] = *b"Stks";
const MAGX_ID: [u8; 4] = *b"MAGX"; // dest/pc/valstackbase bookkeeping, our own chunk

fn pad_even(w: &mut impl Write, len: usize) -> io::Result<()> {
    if len % 2 == 1 {
        w.write_u8(0)?;
    }
    Ok(())
}

/// Serialize a snapshot to the FORM/IFZS container described in
/// spec.md §5. `CMem` carries the full RAM image (uncompressed -- this
/// core does not implement Quetzal's RLE `CMem` encoding, only its
/// chunk framing), `Stks` the raw stack bytes, and `MAGX` the three
/// cursor words plus the save destination, which real Quetzal leaves
/// to the interpreter's own private chunk.
pub fn write_iff(snapshot: &MachineSnapshot, w: &mut impl Write) -> io::Result<()> {
    let mut body = Vec::new();

    body.write_all(&IFZS_ID)?;

    body.write_all(&CMEM_ID)?;
    body.write_u32::<BigEndian>(snapshot.ram.len() as u32 + 4)?;
    body.write_u32::<BigEndian>(snapshot.endmem)?;
    body.write_all(&snapshot.ram)?;
    pad_even(&mut body, snapshot.ram.len())?;

    body.write_all(&STKS_ID)?;
    body.write_u32::<BigEndian>(snapshot.stack_bytes.len() as u32)?;
    body.write_all(&snapshot.stack_bytes)?;
    pad_even(&mut body, snapshot.stack_bytes.len())?;

    body.write_all(&MAGX_ID)?;
    body.write_u32::<BigEndian>(24)?;
    body.write_u32::<BigEndian>(snapshot.stackptr)?;
    body.write_u32::<BigEndian>(snapshot.frameptr)?;
    body.write_u32::<BigEndian>(snapshot.valstackbase)?;
    body.write_u32::<BigEndian>(snapshot.pc)?;
    body.write_u32::<BigEndian>(snapshot.save_dest.wire_type())?;
    body.write_u32::<BigEndian>(snapshot.save_dest.wire_addr())?;

    w.write_all(&FORM_ID)?;
    w.write_u32::<BigEndian>(body.len() as u32)?;
    w.write_all(&body)?;
    Ok(())
}

fn read_exact_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_chunk_id(r: &mut impl Read) -> io::Result<[u8; 4]> {
    let mut id = [0u8; 4];
    r.read_exact(&mut id)?;
    Ok(id)
}

/// Parse a FORM/IFZS blob written by `write_iff`. Chunk order is not
/// assumed beyond `CMem` carrying its own `endmem` prefix; unrecognized
/// chunks (a genuine Quetzal file's `IFhd`, `Mem#`, `AUTH`, etc.) are
/// skipped rather than rejected, since spec.md §5 only requires this
/// core to round-trip its own saves.
pub fn read_iff(r: &mut impl Read) -> FaultResult<MachineSnapshot> {
    let map_io = |e: io::Error| Fault::MalformedImage(format!("save stream: {e}"));

    let form = read_chunk_id(r).map_err(map_io)?;
    if form != FORM_ID {
        return Err(Fault::MalformedImage("missing FORM chunk".into()));
    }
    let _form_len = read_exact_u32(r).map_err(map_io)?;
    let ifzs = read_chunk_id(r).map_err(map_io)?;
    if ifzs != IFZS_ID {
        return Err(Fault::MalformedImage("not an IFZS save".into()));
    }

    let mut ram = None;
    let mut endmem = 0u32;
    let mut stack_bytes = None;
    let mut stackptr = 0u32;
    let mut frameptr = 0u32;
    let mut valstackbase = 0u32;
    let mut pc = 0u32;
    let mut save_dest_ty = 0u32;
    let mut save_dest_addr = 0u32;

    loop {
        let id = match read_chunk_id(r) {
            Ok(id) => id,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(map_io(e)),
        };
        let len = read_exact_u32(r).map_err(map_io)?;
        let mut payload = vec![0u8; len as usize];
        r.read_exact(&mut payload).map_err(map_io)?;
        if len % 2 == 1 {
            let mut pad = [0u8; 1];
            let _ = r.read_exact(&mut pad);
        }

        match &id {
            _ if id == CMEM_ID => {
                endmem = u32::from_be_bytes(payload[0..4].try_into().unwrap());
                ram = Some(payload[4..].to_vec());
            }
            _ if id == STKS_ID => {
                stack_bytes = Some(payload);
            }
            _ if id == MAGX_ID => {
                stackptr = u32::from_be_bytes(payload[0..4].try_into().unwrap());
                frameptr = u32::from_be_bytes(payload[4..8].try_into().unwrap());
                valstackbase = u32::from_be_bytes(payload[8..12].try_into().unwrap());
                pc = u32::from_be_bytes(payload[12..16].try_into().unwrap());
                save_dest_ty = u32::from_be_bytes(payload[16..20].try_into().unwrap());
                save_dest_addr = u32::from_be_bytes(payload[20..24].try_into().unwrap());
            }
            _ => {} // unrecognized chunk, e.g. a real Quetzal file's IFhd/AUTH
        }
    }

    Ok(MachineSnapshot {
        ram: ram.ok_or_else(|| Fault::MalformedImage("save missing CMem chunk".into()))?,
        endmem,
        stack_bytes: stack_bytes
            .ok_or_else(|| Fault::MalformedImage("save missing Stks chunk".into()))?,
        stackptr,
        frameptr,
        valstackbase,
        pc,
        save_dest: StoreDest::from_wire(save_dest_ty, save_dest_addr)?,
    })
}

/// In-core ring buffer for `saveundo`/`restoreundo`/`hasundo`/
/// `discardundo` (spec.md §5): these never touch the host at all, they
/// just keep the last few snapshots around in memory.
#[derive(Default)]
pub struct UndoRing {
    slots: Vec<MachineSnapshot>,
    capacity: usize,
}

impl UndoRing {
    pub fn new(capacity: usize) -> Self {
        UndoRing {
            slots: Vec::new(),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: MachineSnapshot) {
        if self.slots.len() == self.capacity {
            self.slots.remove(0);
        }
        self.slots.push(snapshot);
    }

    pub fn pop(&mut self) -> Option<MachineSnapshot> {
        self.slots.pop()
    }

    pub fn has_any(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn discard_all(&mut self) {
        self.slots.clear();
    }
}
