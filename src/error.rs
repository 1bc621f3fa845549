//! Fatal-error model for the dispatcher.
//!
//! Glulx draws a hard line (spec.md §7) between *fatal* errors -- VM
//! invariants broken, or a collaborator failing in a way it has no
//! recovery path for -- and *program-visible* failures, which are just
//! ordinary opcode results (a non-zero `setmemsize`, a `0` from `malloc`,
//! a search sentinel). Only the former gets an error type; the latter is
//! plain `u32`/`bool` data flowing through the store gateway.

use thiserror::Error;

/// An unrecoverable VM condition. There is no catch for this: the
/// dispatcher that produces one must stop running, full stop.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Fault {
    #[error("Encountered unknown opcode: {0:#x}")]
    UnknownOpcode(u32),

    #[error("Invalid operand addressing mode: {0:#x}")]
    InvalidAddressingMode(u8),

    #[error("Stack underflow in {0}")]
    StackUnderflow(&'static str),

    #[error("Stack overflow in {0}")]
    StackOverflow(&'static str),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Division by zero doing remainder")]
    RemainderByZero,

    #[error("{0} outside current stack range")]
    OutOfRange(&'static str),

    #[error("Memory access out of bounds: addr {addr:#x} width {width}, endmem {endmem:#x}")]
    MemoryOutOfBounds { addr: u32, width: u32, endmem: u32 },

    #[error("Write to read-only memory at {addr:#x} (ramstart {ramstart:#x})")]
    RomWrite { addr: u32, ramstart: u32 },

    #[error("Unresolvable Glk selector: {0:#x}")]
    UnresolvedGlkSelector(u32),

    #[error("Malformed program image: {0}")]
    MalformedImage(String),

    #[error("Negative operand in {0}")]
    NegativeOperand(&'static str),

    #[error("user debugtrap encountered: {0:#x}")]
    DebugTrap(u32),

    #[error("{0}")]
    Other(String),
}

/// Result type used throughout the dispatcher and its collaborators.
pub type FaultResult<T> = Result<T, Fault>;
