#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Monitoring: Prometheus metrics and structured logging.

pub mod logging;
pub mod metrics;
