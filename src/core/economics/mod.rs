#![forbid(unsafe_code)]

//! Staking economics.

/// Balance collaborator boundary.
pub mod balances;
/// Interest accrual engine.
pub mod interest;
/// Stake record store.
pub mod staking;
