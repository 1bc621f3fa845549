//! Opcode numbering and operand-shape table.
//!
//! Values and operand-count pairs are the literal Glulx assignments,
//! reproduced from `other_examples/.../OrIOg-glulx-terp-rs__.../operations/mod.rs`
//! (a Rust Glulx interpreter retrieved alongside this pack) -- per Design
//! Note "Jump semantics" and spec.md §4.9, these numbers must be preserved
//! bit-exactly. Only the opcodes this execution core implements are
//! listed; floating-point and double-precision opcodes are out of this
//! core's scope (spec.md §1) and are not part of this enum.

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[repr(u32)]
#[derive(Eq, PartialEq, IntoPrimitive, TryFromPrimitive, Copy, Clone, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum Opcode {
    NOP = 0x00,

    ADD = 0x10,
    SUB,
    MUL,
    DIV,
    MOD,
    NEG,

    BITAND = 0x18,
    BITOR,
    BITXOR,
    BITNOT,
    SHIFTL,
    SSHIFTR,
    USHIFTR,

    JUMP = 0x20,
    JZ = 0x22,
    JNZ,
    JEQ,
    JNE,
    JLT,
    JGE,
    JGT,
    JLE,
    JLTU,
    JGEU,
    JGTU,
    JLEU,
    JUMPABS = 0x104,

    CALL = 0x30,
    RETURN,
    CATCH = 0x32,
    THROW,
    TAILCALL = 0x34,

    COPY = 0x40,
    COPYS,
    COPYB,
    SEXS = 0x44,
    SEXB,

    ALOAD = 0x48,
    ALOADS,
    ALOADB,
    ALOADBIT,
    ASTORE,
    ASTORES,
    ASTOREB,
    ASTOREBIT,

    STKCOUNT = 0x50,
    STKPEEK,
    STKSWAP,
    STKROLL,
    STKCOPY,

    STREAMCHAR = 0x70,
    STREAMNUM,
    STREAMSTR,
    STREAMUNICHAR,

    GESTALT = 0x100,
    DEBUGTRAP,
    GETMEMSIZE,
    SETMEMSIZE,

    RANDOM = 0x110,
    SETRANDOM,

    QUIT = 0x120,
    VERIFY,
    RESTART,
    SAVE,
    RESTORE,
    SAVEUNDO,
    RESTOREUNDO,
    PROTECT,
    HASUNDO,
    DISCARDUNDO,

    GLK = 0x130,

    GETSTRINGTBL = 0x140,
    SETSTRINGTBL,

    GETIOSYS = 0x148,
    SETIOSYS,

    LINEARSEARCH = 0x150,
    BINARYSEARCH,
    LINKEDSEARCH,

    CALLF = 0x160,
    CALLFI,
    CALLFII,
    CALLFIII,

    MZERO = 0x170,
    MCOPY,

    MALLOC = 0x178,
    MFREE,

    ACCELFUNC = 0x180,
    ACCELPARAM,
}

/// Operand counts `(loads, stores)` for one opcode. `catch_order` marks
/// the one opcode (`catch`) whose store operand is encoded *before* its
/// load operands -- spec.md §4.9's "preserve literal semantics."
pub struct Shape {
    pub loads: u8,
    pub stores: u8,
    pub catch_order: bool,
}

const fn shape(loads: u8, stores: u8) -> Shape {
    Shape {
        loads,
        stores,
        catch_order: false,
    }
}

impl Opcode {
    pub fn shape(self) -> Shape {
        use Opcode::*;
        match self {
            NOP | STKSWAP | QUIT | RESTART | DISCARDUNDO => shape(0, 0),

            STKCOUNT | GETMEMSIZE | SAVEUNDO | RESTOREUNDO | HASUNDO | VERIFY
            | GETSTRINGTBL => shape(0, 1),

            GETIOSYS => shape(0, 2),

            JUMP | JUMPABS | STKCOPY | RETURN | MFREE | STREAMCHAR | STREAMUNICHAR
            | STREAMNUM | STREAMSTR | SETSTRINGTBL | SETRANDOM | DEBUGTRAP => shape(1, 0),

            NEG | BITNOT | COPY | COPYS | COPYB | SEXS | SEXB | STKPEEK | CALLF
            | SETMEMSIZE | MALLOC | SAVE | RESTORE | RANDOM => shape(1, 1),

            CATCH => Shape {
                loads: 1,
                stores: 1,
                catch_order: true,
            },

            JZ | JNZ | STKROLL | TAILCALL | THROW | PROTECT | SETIOSYS | MZERO
            | ACCELFUNC | ACCELPARAM => shape(2, 0),

            ADD | SUB | MUL | DIV | MOD | BITAND | BITOR | BITXOR | SHIFTL | USHIFTR
            | SSHIFTR | ALOAD | ALOADS | ALOADB | ALOADBIT | CALL | CALLFI | GESTALT
            | GLK => shape(2, 1),

            JEQ | JNE | JLT | JLE | JGT | JGE | JLTU | JLEU | JGTU | JGEU | ASTORE
            | ASTORES | ASTOREB | ASTOREBIT | MCOPY => shape(3, 0),

            CALLFII => shape(3, 1),

            CALLFIII => shape(4, 1),

            LINKEDSEARCH => shape(6, 1),

            LINEARSEARCH | BINARYSEARCH => shape(7, 1),
        }
    }
}
