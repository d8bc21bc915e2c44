// Copyright (c) 2026 EFY Finance
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! EFY staking ledger - per-account stake records with time-weighted interest.
//!
//! This repository provides:
//! - A deterministic stake record store with stable, append-only indices
//! - An integer-only interest accrual engine (256-bit intermediates, truncating division)
//! - A checkpointed annual rate log with a configurable rate policy
//! - Persistent snapshots (sled) with canonical encoding and SHA-256 state digests
//! - A local HTTP node with Prometheus metrics and structured logging

/// API surface (HTTP routes over the serialized runtime).
pub mod api;
/// Core ledger primitives (types, economics, runtime, security, state).
pub mod core;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
