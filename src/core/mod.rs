#![forbid(unsafe_code)]

//! Core ledger primitives.

/// Node configuration loading.
pub mod config;
/// Staking economics: interest engine, stake store, balances.
pub mod economics;
/// Serialized executor and clock boundary.
pub mod runtime;
/// Authorization boundary.
pub mod security;
/// Persistent state.
pub mod state;
/// Deterministic types and canonical encoding.
pub mod types;
