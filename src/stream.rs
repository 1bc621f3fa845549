//! Output opcodes: `streamchar`/`streamunichar`/`streamnum`/`streamstr`
//! (spec.md §4.12). These funnel through the `HostIo` collaborator
//! one character at a time -- actual Glk window/stream selection is
//! entirely the host's business (spec.md §1).
//!
//! `streamstr` supports the two uncompressed Glulx string encodings
//! (plain Latin-1, type byte `0xE0`, and plain Unicode, type byte
//! `0xE2`). The Huffman-compressed encoding (`0xE1`, keyed off the
//! image's decoding table) is a large separate format in its own
//! right and is out of this core's scope; encountering one reports a
//! malformed string rather than silently printing nothing.

use crate::error::{Fault, FaultResult};
use crate::vm::Vm;

const STRING_LATIN1: u32 = 0xE0;
const STRING_COMPRESSED: u32 = 0xE1;
const STRING_UNICODE: u32 = 0xE2;

impl Vm {
    pub(crate) fn op_streamchar(&mut self, ch: u32) {
        self.host_io.stream_char(ch as u8);
    }

    pub(crate) fn op_streamunichar(&mut self, ch: u32) {
        self.host_io.stream_unichar(ch);
    }

    pub(crate) fn op_streamnum(&mut self, value: u32) {
        for byte in (value as i32).to_string().into_bytes() {
            self.host_io.stream_char(byte);
        }
    }

    /// `glk selector argc -> result`: pops `argc` already-pushed
    /// argument values off the stack (same left-to-right convention as
    /// `call`) and hands them to the host's Glk dispatch verbatim.
    pub(crate) fn op_glk(&mut self, selector: u32, argc: u32) -> FaultResult<u32> {
        let mut args = Vec::with_capacity(argc as usize);
        for _ in 0..argc {
            args.push(self.stack.pop_value()?);
        }
        args.reverse();
        self.host_io.glk(selector, &args)
    }

    pub(crate) fn op_streamstr(&mut self, addr: u32) -> FaultResult<()> {
        let tag = self.mem.read_u8(addr)?;
        match tag {
            STRING_LATIN1 => {
                let mut pos = addr + 1;
                loop {
                    let b = self.mem.read_u8(pos)?;
                    if b == 0 {
                        break;
                    }
                    self.host_io.stream_char(b as u8);
                    pos += 1;
                }
                Ok(())
            }
            STRING_UNICODE => {
                let mut pos = addr + 1;
                loop {
                    let ch = self.mem.read_u32(pos)?;
                    if ch == 0 {
                        break;
                    }
                    self.host_io.stream_unichar(ch);
                    pos += 4;
                }
                Ok(())
            }
            STRING_COMPRESSED => Err(Fault::MalformedImage(
                "Huffman-compressed strings are not supported by this core".into(),
            )),
            other => Err(Fault::MalformedImage(format!("bad string type byte {other:#x}"))),
        }
    }
}
