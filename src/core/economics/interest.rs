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

//! Interest accrual engine: simple (non-compounding) interest, integer only.
//!
//! interest = principal * Σ(rate_i * seconds_i) / (SECONDS_PER_YEAR * INTEREST_RATE_SCALE)
//!
//! `Σ(rate_i * seconds_i)` ("rate-seconds") is at most `u32::MAX * u64::MAX < 2^96`, so the
//! product with a `u128` principal fits in 224 bits. The quotient is truncated toward zero;
//! sub-unit residue is never paid.

use crate::core::types::{Amount, Timestamp};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed-point denominator for annual rates (`20_000` = 20%).
pub const INTEREST_RATE_SCALE: u32 = 100_000;

/// 365 days, no leap handling.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 3600;

/// Interest engine errors.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum InterestError {
    /// `end < start`.
    #[error("negative elapsed time")]
    NegativeElapsed,
    /// Checkpoint timestamp earlier than the last one.
    #[error("checkpoint out of order")]
    CheckpointOutOfOrder,
    /// Result does not fit in an amount.
    #[error("interest overflow")]
    Overflow,
}

/// How a mutable annual rate applies to a stake that spans rate changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RatePolicy {
    /// The rate in force at query/close time covers the whole elapsed span.
    #[default]
    FlatCurrent,
    /// Each sub-interval is charged at the rate in force during it.
    Checkpointed,
}

/// One recorded rate change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCheckpoint {
    /// Time the rate took effect.
    pub at: Timestamp,
    /// Annual rate scaled by `INTEREST_RATE_SCALE`.
    pub rate: u32,
}

/// Ordered rate log. The first checkpoint is the genesis rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSchedule {
    checkpoints: Vec<RateCheckpoint>,
}

impl RateSchedule {
    /// Schedule starting at `rate` from `at`.
    pub fn new(rate: u32, at: Timestamp) -> Self {
        Self {
            checkpoints: vec![RateCheckpoint { at, rate }],
        }
    }

    /// All checkpoints, oldest first.
    pub fn checkpoints(&self) -> &[RateCheckpoint] {
        &self.checkpoints
    }

    /// Rate currently in force.
    pub fn current_rate(&self) -> u32 {
        self.checkpoints.last().map(|c| c.rate).unwrap_or(0)
    }

    /// Timestamp of the latest checkpoint.
    pub fn last_change(&self) -> Timestamp {
        self.checkpoints.last().map(|c| c.at).unwrap_or(0)
    }

    /// Record a rate change. A change at the same instant as the last one replaces it.
    pub fn push(&mut self, at: Timestamp, rate: u32) -> Result<(), InterestError> {
        match self.checkpoints.last_mut() {
            Some(last) if at < last.at => Err(InterestError::CheckpointOutOfOrder),
            Some(last) if at == last.at => {
                last.rate = rate;
                Ok(())
            }
            _ => {
                self.checkpoints.push(RateCheckpoint { at, rate });
                Ok(())
            }
        }
    }

    /// Rate in force at `t`. Times before genesis use the genesis rate.
    pub fn rate_at(&self, t: Timestamp) -> u32 {
        let idx = self.checkpoints.partition_point(|c| c.at <= t);
        match idx {
            0 => self.checkpoints.first().map(|c| c.rate).unwrap_or(0),
            i => self.checkpoints[i - 1].rate,
        }
    }

    /// Σ(rate * seconds) over `[start, end]` under `policy`.
    pub fn rate_seconds(
        &self,
        start: Timestamp,
        end: Timestamp,
        policy: RatePolicy,
    ) -> Result<u128, InterestError> {
        if end < start {
            return Err(InterestError::NegativeElapsed);
        }
        match policy {
            RatePolicy::FlatCurrent => {
                Ok(u128::from(self.current_rate()) * u128::from(end - start))
            }
            RatePolicy::Checkpointed => {
                let mut total: u128 = 0;
                let mut cursor = start;
                let mut rate = self.rate_at(start);
                let first = self.checkpoints.partition_point(|c| c.at <= start);
                for cp in &self.checkpoints[first..] {
                    if cp.at >= end {
                        break;
                    }
                    total = total
                        .checked_add(u128::from(rate) * u128::from(cp.at - cursor))
                        .ok_or(InterestError::Overflow)?;
                    cursor = cp.at;
                    rate = cp.rate;
                }
                total
                    .checked_add(u128::from(rate) * u128::from(end - cursor))
                    .ok_or(InterestError::Overflow)
            }
        }
    }

    /// Interest owed on `principal` held over `[start, end]` under `policy`.
    pub fn accrued(
        &self,
        principal: Amount,
        start: Timestamp,
        end: Timestamp,
        policy: RatePolicy,
    ) -> Result<Amount, InterestError> {
        let rs = self.rate_seconds(start, end, policy)?;
        interest_for_rate_seconds(principal, rs)
    }
}

fn denominator() -> U256 {
    U256::from(SECONDS_PER_YEAR) * U256::from(INTEREST_RATE_SCALE)
}

/// `principal * rate_seconds / (SECONDS_PER_YEAR * INTEREST_RATE_SCALE)`, truncated.
pub fn interest_for_rate_seconds(
    principal: Amount,
    rate_seconds: u128,
) -> Result<Amount, InterestError> {
    if principal == 0 || rate_seconds == 0 {
        return Ok(0);
    }
    let num = U256::from(principal)
        .checked_mul(U256::from(rate_seconds))
        .ok_or(InterestError::Overflow)?;
    let q = num / denominator();
    if q > U256::from(u128::MAX) {
        return Err(InterestError::Overflow);
    }
    Ok(q.as_u128())
}

/// Simple interest at a single annual rate over `elapsed` seconds.
pub fn simple_interest(
    principal: Amount,
    annual_rate: u32,
    elapsed: u64,
) -> Result<Amount, InterestError> {
    interest_for_rate_seconds(principal, u128::from(annual_rate) * u128::from(elapsed))
}
