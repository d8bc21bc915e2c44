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

//! Balance collaborator: moves funds between spendable and staked.

use crate::core::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Balance errors.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("insufficient staked balance")]
    InsufficientStaked,
    #[error("balance overflow")]
    Overflow,
}

/// Balance-holding collaborator. Each call is all-or-nothing.
pub trait BalanceBook {
    /// Move `amount` from spendable into staked.
    fn debit(&mut self, account: &Address, amount: Amount) -> Result<(), BalanceError>;
    /// Release `principal` from staked and pay `principal + interest` to spendable.
    fn credit(
        &mut self,
        account: &Address,
        principal: Amount,
        interest: Amount,
    ) -> Result<(), BalanceError>;
    /// Amount currently held as staked.
    fn staked_of(&self, account: &Address) -> Amount;
}

/// In-memory token book. Interest is minted on release.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryBalances {
    spendable: BTreeMap<Address, Amount>,
    staked: BTreeMap<Address, Amount>,
    total_supply: Amount,
}

impl InMemoryBalances {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` new tokens in `account`'s spendable balance.
    pub fn mint(&mut self, account: &Address, amount: Amount) -> Result<(), BalanceError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        let bal = self
            .balance_of(account)
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        self.total_supply = supply;
        self.spendable.insert(*account, bal);
        Ok(())
    }

    /// Spendable balance.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.spendable.get(account).copied().unwrap_or(0)
    }

    /// Total tokens in existence (spendable + staked).
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }
}

impl BalanceBook for InMemoryBalances {
    fn debit(&mut self, account: &Address, amount: Amount) -> Result<(), BalanceError> {
        let bal = self.balance_of(account);
        let remaining = bal
            .checked_sub(amount)
            .ok_or(BalanceError::InsufficientBalance)?;
        let staked = self
            .staked_of(account)
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        self.spendable.insert(*account, remaining);
        self.staked.insert(*account, staked);
        Ok(())
    }

    fn credit(
        &mut self,
        account: &Address,
        principal: Amount,
        interest: Amount,
    ) -> Result<(), BalanceError> {
        let staked = self
            .staked_of(account)
            .checked_sub(principal)
            .ok_or(BalanceError::InsufficientStaked)?;
        let payout = principal
            .checked_add(interest)
            .ok_or(BalanceError::Overflow)?;
        let bal = self
            .balance_of(account)
            .checked_add(payout)
            .ok_or(BalanceError::Overflow)?;
        let supply = self
            .total_supply
            .checked_add(interest)
            .ok_or(BalanceError::Overflow)?;
        self.staked.insert(*account, staked);
        self.spendable.insert(*account, bal);
        self.total_supply = supply;
        Ok(())
    }

    fn staked_of(&self, account: &Address) -> Amount {
        self.staked.get(account).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_bytes([0xA1; 20])
    }

    #[test]
    fn debit_and_credit_move_funds() {
        let mut b = InMemoryBalances::new();
        b.mint(&alice(), 1_000).unwrap();
        b.debit(&alice(), 600).unwrap();
        assert_eq!(b.balance_of(&alice()), 400);
        assert_eq!(b.staked_of(&alice()), 600);

        b.credit(&alice(), 600, 50).unwrap();
        assert_eq!(b.balance_of(&alice()), 1_050);
        assert_eq!(b.staked_of(&alice()), 0);
        assert_eq!(b.total_supply(), 1_050);
    }

    #[test]
    fn failed_debit_changes_nothing() {
        let mut b = InMemoryBalances::new();
        b.mint(&alice(), 10).unwrap();
        let before = b.clone();
        assert_eq!(b.debit(&alice(), 11), Err(BalanceError::InsufficientBalance));
        assert_eq!(b, before);
    }

    #[test]
    fn failed_credit_changes_nothing() {
        let mut b = InMemoryBalances::new();
        b.mint(&alice(), 10).unwrap();
        b.debit(&alice(), 10).unwrap();
        let before = b.clone();
        assert_eq!(b.credit(&alice(), 11, 0), Err(BalanceError::InsufficientStaked));
        assert_eq!(b.credit(&alice(), 10, u128::MAX), Err(BalanceError::Overflow));
        assert_eq!(b, before);
    }
}
