#![forbid(unsafe_code)]

//! Persistent state.

/// sled-backed key-value state and ledger snapshots.
pub mod persistent_state;
