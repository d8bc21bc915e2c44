#![forbid(unsafe_code)]

//! Serialized execution of ledger commands.

/// Clock boundary.
pub mod clock;
/// Command executor.
pub mod executor;
