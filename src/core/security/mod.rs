#![forbid(unsafe_code)]

//! Authorization boundary.

/// Owner identity check.
pub mod authority;
