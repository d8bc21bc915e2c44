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

//! Ledger runtime: the single mutation path.
//!
//! Every command reads the clock once and is applied as one atomic transition: either the
//! ledger and the balance book both change, or neither does. Callers serialize access (the
//! node holds the runtime behind one mutex).

use crate::core::economics::balances::BalanceBook;
use crate::core::economics::staking::{
    StakeView, StakesView, StakingError, StakingLedger, UnstakeReceipt,
};
use crate::core::runtime::clock::Clock;
use crate::core::security::authority::Authority;
use crate::core::types::{Address, Amount, Timestamp};
use crate::monitoring::metrics::Metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State-changing command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Open a stake entry.
    Stake {
        /// Staking account.
        account: Address,
        /// Principal.
        amount: Amount,
    },
    /// Close a stake entry.
    Unstake {
        /// Staking account.
        account: Address,
        /// Entry index returned by `Stake`.
        index: usize,
    },
    /// Owner-only annual rate change.
    SetAnnualInterestRate {
        /// Claimed owner.
        caller: Address,
        /// Rate scaled by `INTEREST_RATE_SCALE`.
        rate: u32,
    },
}

/// Result of an applied command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// New entry index.
    Staked {
        /// Index of the new entry.
        index: usize,
    },
    /// Closed entry payout.
    Unstaked(UnstakeReceipt),
    /// Rate now in force.
    RateSet {
        /// New rate.
        rate: u32,
    },
}

/// Everything the runtime persists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState<B, A> {
    /// Stake records and rate log.
    pub ledger: StakingLedger,
    /// Balance collaborator.
    pub balances: B,
    /// Authorization collaborator.
    pub authority: A,
}

/// Ledger plus its collaborators.
pub struct LedgerRuntime<B, A, C> {
    state: RuntimeState<B, A>,
    clock: C,
    metrics: Option<Arc<Metrics>>,
    open: usize,
}

impl Command {
    /// Account whose staked balance the command touches.
    fn staker(&self) -> Option<&Address> {
        match self {
            Command::Stake { account, .. } | Command::Unstake { account, .. } => Some(account),
            Command::SetAnnualInterestRate { .. } => None,
        }
    }
}

impl<B, A, C> LedgerRuntime<B, A, C>
where
    B: BalanceBook + Clone,
    A: Authority + Clone,
    C: Clock,
{
    /// Runtime over `state`, reading time from `clock`.
    pub fn new(state: RuntimeState<B, A>, clock: C) -> Self {
        let open = state.ledger.open_entries();
        Self {
            state,
            clock,
            metrics: None,
            open,
        }
    }

    /// Attach metrics; gauges are refreshed immediately.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self.refresh_gauges();
        self
    }

    /// Current state.
    pub fn state(&self) -> &RuntimeState<B, A> {
        &self.state
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RuntimeState<B, A> {
        self.state.clone()
    }

    /// Replace the state wholesale (rollback after a failed commit).
    pub fn restore(&mut self, state: RuntimeState<B, A>) {
        self.open = state.ledger.open_entries();
        self.state = state;
        self.refresh_gauges();
    }

    /// Clock reading.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Apply one command and count it as committed.
    pub fn execute(&mut self, cmd: Command) -> Result<Outcome, StakingError> {
        let outcome = self.stage(cmd)?;
        self.record_committed(&outcome);
        Ok(outcome)
    }

    /// Apply one command without counting it as committed.
    ///
    /// Callers that persist the result call [`Self::record_committed`] once the commit
    /// succeeds, or [`Self::restore`] if it fails.
    pub fn stage(&mut self, cmd: Command) -> Result<Outcome, StakingError> {
        let now = self.clock.now();
        let RuntimeState {
            ledger,
            balances,
            authority,
        } = &mut self.state;

        let res = match &cmd {
            Command::Stake { account, amount } => ledger
                .stake(balances, account, *amount, now)
                .map(|index| Outcome::Staked { index }),
            Command::Unstake { account, index } => ledger
                .unstake(balances, account, *index, now)
                .map(Outcome::Unstaked),
            Command::SetAnnualInterestRate { caller, rate } => ledger
                .set_annual_interest_rate(&*authority, caller, *rate, now)
                .map(|()| Outcome::RateSet { rate: *rate }),
        };

        match &res {
            Ok(outcome) => {
                info!(now, ?cmd, ?outcome, "command applied");
                match outcome {
                    Outcome::Staked { .. } => self.open += 1,
                    Outcome::Unstaked(_) => self.open = self.open.saturating_sub(1),
                    Outcome::RateSet { .. } => {}
                }
                if let Some(account) = cmd.staker() {
                    if !self.staked_invariant_holds(account) {
                        warn!(%account, "staked balance diverged from open stakes");
                        if let Some(m) = &self.metrics {
                            m.staked_mismatch_total.inc();
                        }
                    }
                }
            }
            Err(e) => {
                warn!(now, ?cmd, error = %e, "command rejected");
                if let Some(m) = &self.metrics {
                    m.rejected_total.inc();
                }
            }
        }
        self.refresh_gauges();
        res
    }

    /// Bump the applied-command counter for `outcome`.
    pub fn record_committed(&self, outcome: &Outcome) {
        if let Some(m) = &self.metrics {
            match outcome {
                Outcome::Staked { .. } => m.stakes_total.inc(),
                Outcome::Unstaked(_) => m.unstakes_total.inc(),
                Outcome::RateSet { .. } => m.rate_changes_total.inc(),
            }
        }
    }

    /// Per-entry views for `account` as of the clock's now.
    pub fn stakes(&self, account: &Address) -> Result<Vec<StakeView>, StakingError> {
        self.state
            .ledger
            .get_stakes(account, self.clock.now())
            .collect()
    }

    /// Parallel-array query shape for `account` as of the clock's now.
    pub fn stakes_view(&self, account: &Address) -> Result<StakesView, StakingError> {
        self.state.ledger.stakes_view(account, self.clock.now())
    }

    /// Open principals recorded by the ledger equal the book's staked balance.
    pub fn staked_invariant_holds(&self, account: &Address) -> bool {
        let ledger_side = self.state.ledger.staked_total(account);
        let book_side = self.state.balances.staked_of(account);
        if ledger_side != book_side {
            debug!(%account, ledger_side, book_side, "staked balance mismatch");
            return false;
        }
        true
    }

    /// Open stake entries across all accounts.
    pub fn open_entries(&self) -> usize {
        self.open
    }

    fn refresh_gauges(&self) {
        if let Some(m) = &self.metrics {
            m.open_stakes.set(i64::try_from(self.open).unwrap_or(i64::MAX));
            m.annual_interest_rate
                .set(i64::from(self.state.ledger.annual_interest_rate()));
        }
    }
}
