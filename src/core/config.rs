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
#![deny(missing_docs)]

//! Node configuration (TOML).
//!
//! ```text
//! [node]
//! name = "efy-dev"
//! data_dir = "./data"
//!
//! [http]
//! listen_addr = "127.0.0.1:9090"
//!
//! [log]
//! json = false
//! level = "info"
//!
//! [ledger]
//! owner = "0x..."
//! annual_interest_rate = 20000
//! rate_policy = "flat-current"   # or "checkpointed"
//!
//! [[genesis]]
//! account = "0x..."
//! amount = "1000000000000000000000"
//! ```
//!
//! Amounts are decimal strings: TOML integers stop at `i64`.

use crate::core::economics::balances::InMemoryBalances;
use crate::core::economics::interest::RatePolicy;
use crate::core::economics::staking::StakingLedger;
use crate::core::runtime::executor::RuntimeState;
use crate::core::security::authority::OwnerAuthority;
use crate::core::types::{Address, Amount, Timestamp};
use serde::Deserialize;
use std::fs;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Cannot read config file.
    #[error("read config {0}")]
    Read(String),
    /// Cannot parse TOML.
    #[error("parse config: {0}")]
    Parse(String),
    /// Genesis amount is not a decimal u128.
    #[error("invalid genesis amount for {0}")]
    InvalidAmount(String),
    /// Genesis allocations overflow the supply.
    #[error("genesis supply overflow")]
    SupplyOverflow,
}

/// Node configuration root.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    /// Node settings.
    pub node: NodeSettings,
    /// HTTP endpoint.
    pub http: HttpConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
    /// Ledger parameters.
    pub ledger: LedgerConfig,
    /// Initial token allocations.
    #[serde(default)]
    pub genesis: Vec<GenesisAllocation>,
}

/// Node settings.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeSettings {
    /// Human-readable name.
    pub name: String,
    /// Data directory (sled db).
    pub data_dir: String,
}

/// HTTP config.
#[derive(Clone, Debug, Deserialize)]
pub struct HttpConfig {
    /// Listen address, e.g. 127.0.0.1:9090.
    pub listen_addr: String,
}

/// Logging config.
#[derive(Clone, Debug, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of compact text.
    #[serde(default)]
    pub json: bool,
    /// Max level (trace, debug, info, warn, error).
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Ledger parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct LedgerConfig {
    /// Address allowed to change the annual rate.
    pub owner: Address,
    /// Genesis annual rate scaled by `INTEREST_RATE_SCALE`.
    #[serde(default)]
    pub annual_interest_rate: u32,
    /// How rate changes apply to open stakes.
    #[serde(default)]
    pub rate_policy: RatePolicy,
}

/// One genesis allocation.
#[derive(Clone, Debug, Deserialize)]
pub struct GenesisAllocation {
    /// Receiving account.
    pub account: Address,
    /// Decimal amount in smallest units.
    pub amount: String,
}

impl NodeConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path).map_err(|_| ConfigError::Read(path.to_string()))?;
        Self::from_toml_str(&s)
    }

    /// Fresh runtime state: empty ledger, genesis balances minted, configured owner.
    pub fn genesis_state(
        &self,
        now: Timestamp,
    ) -> Result<RuntimeState<InMemoryBalances, OwnerAuthority>, ConfigError> {
        let mut balances = InMemoryBalances::new();
        for alloc in &self.genesis {
            let amount: Amount = alloc
                .amount
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidAmount(alloc.account.to_string()))?;
            balances
                .mint(&alloc.account, amount)
                .map_err(|_| ConfigError::SupplyOverflow)?;
        }
        Ok(RuntimeState {
            ledger: StakingLedger::new(
                self.ledger.annual_interest_rate,
                now,
                self.ledger.rate_policy,
            ),
            balances,
            authority: OwnerAuthority::new(self.ledger.owner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[node]
name = "efy-dev"
data_dir = "./data"

[http]
listen_addr = "127.0.0.1:9090"

[ledger]
owner = "0x0000000000000000000000000000000000000001"
annual_interest_rate = 20000
rate_policy = "checkpointed"

[[genesis]]
account = "0x0000000000000000000000000000000000000004"
amount = "1000000000000000000000"
"#;

    #[test]
    fn parses_sample_and_builds_genesis() {
        let cfg = NodeConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.ledger.rate_policy, RatePolicy::Checkpointed);
        assert_eq!(cfg.log.level, "info");

        let st = cfg.genesis_state(42).unwrap();
        assert_eq!(st.ledger.annual_interest_rate(), 20_000);
        assert_eq!(st.ledger.last_time(), 42);
        let eco: Address = "0x0000000000000000000000000000000000000004".parse().unwrap();
        assert_eq!(st.balances.balance_of(&eco), 1_000_000_000_000_000_000_000);
    }

    #[test]
    fn rejects_bad_owner_and_bad_amount() {
        let bad_owner = SAMPLE.replace("0x0000000000000000000000000000000000000001", "nope");
        assert!(matches!(
            NodeConfig::from_toml_str(&bad_owner),
            Err(ConfigError::Parse(_))
        ));

        let bad_amount = SAMPLE.replace("\"1000000000000000000000\"", "\"-5\"");
        let cfg = NodeConfig::from_toml_str(&bad_amount).unwrap();
        assert!(matches!(
            cfg.genesis_state(0),
            Err(ConfigError::InvalidAmount(_))
        ));
    }
}
