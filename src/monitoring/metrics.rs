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

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Applied stake commands.
    pub stakes_total: IntCounter,
    /// Applied unstake commands.
    pub unstakes_total: IntCounter,
    /// Applied rate changes.
    pub rate_changes_total: IntCounter,
    /// Rejected commands of any kind.
    pub rejected_total: IntCounter,
    /// Applied commands undone because the snapshot could not be persisted.
    pub rollbacks_total: IntCounter,
    /// Commands after which the book's staked balance disagreed with open stakes.
    pub staked_mismatch_total: IntCounter,

    /// Open stake entries across all accounts.
    pub open_stakes: IntGauge,
    /// Annual rate in force (scaled).
    pub annual_interest_rate: IntGauge,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let stakes_total = IntCounter::new("efy_stakes_total", "Applied stake commands")
            .map_err(|_| MetricsError::Prom)?;
        let unstakes_total = IntCounter::new("efy_unstakes_total", "Applied unstake commands")
            .map_err(|_| MetricsError::Prom)?;
        let rate_changes_total =
            IntCounter::new("efy_rate_changes_total", "Applied annual rate changes")
                .map_err(|_| MetricsError::Prom)?;
        let rejected_total = IntCounter::new("efy_rejected_total", "Rejected commands")
            .map_err(|_| MetricsError::Prom)?;
        let rollbacks_total = IntCounter::new(
            "efy_rollbacks_total",
            "Commands rolled back after a failed persist",
        )
        .map_err(|_| MetricsError::Prom)?;
        let staked_mismatch_total = IntCounter::new(
            "efy_staked_mismatch_total",
            "Staked balance diverged from open stakes",
        )
        .map_err(|_| MetricsError::Prom)?;

        let open_stakes = IntGauge::new("efy_open_stakes", "Open stake entries")
            .map_err(|_| MetricsError::Prom)?;
        let annual_interest_rate = IntGauge::new(
            "efy_annual_interest_rate",
            "Annual interest rate scaled by 100000",
        )
        .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(stakes_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(unstakes_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(rate_changes_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(rejected_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(rollbacks_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(staked_mismatch_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(open_stakes.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(annual_interest_rate.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            stakes_total,
            unstakes_total,
            rate_changes_total,
            rejected_total,
            rollbacks_total,
            staked_mismatch_total,
            open_stakes,
            annual_interest_rate,
        })
    }

    /// Prometheus text exposition.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|_| MetricsError::Prom)?;
        String::from_utf8(buf).map_err(|_| MetricsError::Prom)
    }
}
