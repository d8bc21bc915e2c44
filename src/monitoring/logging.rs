#![forbid(unsafe_code)]

//! Structured logging setup.

use std::str::FromStr;
use tracing::Level;

/// Install the global subscriber. Compact text by default, JSON lines when `json` is set.
/// Unknown level names fall back to `info`. Safe to call more than once.
pub fn init(json: bool, level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}
