#![allow(missing_docs)]
// Copyright (c) 2026 EFY Finance
// Licensed under the Apache License, Version 2.0

//! Deterministic staking ledger: per-account stake entries with interest accrual.
//!
//! Entries live in an append-only arena per account. Closing an entry marks it in place and
//! freezes its interest, so an index handed out by `stake` stays valid for the life of the
//! ledger.

#![forbid(unsafe_code)]

use crate::core::economics::balances::{BalanceBook, BalanceError};
use crate::core::economics::interest::{InterestError, RateCheckpoint, RatePolicy, RateSchedule};
use crate::core::security::authority::Authority;
use crate::core::types::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StakingError {
    #[error("invalid amount")]
    InvalidAmount,
    #[error("stake index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("stake {index} already closed")]
    AlreadyClosed { index: usize },
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("arithmetic overflow")]
    Overflow,
    #[error("balance: {0}")]
    Balance(#[from] BalanceError),
}

impl From<InterestError> for StakingError {
    fn from(e: InterestError) -> Self {
        match e {
            InterestError::NegativeElapsed => StakingError::InvalidState("start time after now"),
            InterestError::CheckpointOutOfOrder => {
                StakingError::InvalidState("rate change before last checkpoint")
            }
            InterestError::Overflow => StakingError::Overflow,
        }
    }
}

/// Final state of a closed entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedStake {
    pub closed_at: Timestamp,
    /// Interest paid at close; never recomputed.
    pub interest: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEntry {
    pub principal: Amount,
    pub start_time: Timestamp,
    pub closed: Option<ClosedStake>,
}

impl StakeEntry {
    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }
}

/// Read-only projection of one entry at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StakeView {
    pub index: usize,
    pub principal: Amount,
    pub start_time: Timestamp,
    pub closed: bool,
    pub accrued_interest: Amount,
}

/// Parallel-array query shape: `(amounts, start_times, closed, accrued_interest)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StakesView {
    pub amounts: Vec<Amount>,
    pub start_times: Vec<Timestamp>,
    pub closed: Vec<bool>,
    pub accrued_interest: Vec<Amount>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnstakeReceipt {
    pub index: usize,
    pub principal: Amount,
    pub interest: Amount,
    pub total_returned: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingLedger {
    /// Stake arenas keyed by account.
    accounts: BTreeMap<Address, Vec<StakeEntry>>,
    /// Annual rate log.
    rates: RateSchedule,
    policy: RatePolicy,
    /// Latest `now` accepted by a state-changing call.
    last_time: Timestamp,
}

impl StakingLedger {
    /// Empty ledger with `annual_rate` in force from `genesis`.
    pub fn new(annual_rate: u32, genesis: Timestamp, policy: RatePolicy) -> Self {
        Self {
            accounts: BTreeMap::new(),
            rates: RateSchedule::new(annual_rate, genesis),
            policy,
            last_time: genesis,
        }
    }

    pub fn annual_interest_rate(&self) -> u32 {
        self.rates.current_rate()
    }

    pub fn rate_policy(&self) -> RatePolicy {
        self.policy
    }

    pub fn rate_checkpoints(&self) -> &[RateCheckpoint] {
        self.rates.checkpoints()
    }

    pub fn last_time(&self) -> Timestamp {
        self.last_time
    }

    fn check_time(&self, now: Timestamp) -> Result<(), StakingError> {
        if now < self.last_time {
            return Err(StakingError::InvalidState("time went backwards"));
        }
        Ok(())
    }

    /// Open a new entry for `amount`, debiting the balance book first. Returns its index.
    pub fn stake<B: BalanceBook>(
        &mut self,
        book: &mut B,
        account: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<usize, StakingError> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        self.check_time(now)?;
        book.debit(account, amount)?;

        let list = self.accounts.entry(*account).or_default();
        list.push(StakeEntry {
            principal: amount,
            start_time: now,
            closed: None,
        });
        self.last_time = now;
        Ok(list.len() - 1)
    }

    /// Close entry `index`, paying principal plus final interest through the balance book.
    pub fn unstake<B: BalanceBook>(
        &mut self,
        book: &mut B,
        account: &Address,
        index: usize,
        now: Timestamp,
    ) -> Result<UnstakeReceipt, StakingError> {
        self.check_time(now)?;
        let entry = self.entry(account, index)?;
        if entry.is_closed() {
            return Err(StakingError::AlreadyClosed { index });
        }
        let principal = entry.principal;
        let interest = self.entry_interest(entry, now)?;
        let total_returned = principal
            .checked_add(interest)
            .ok_or(StakingError::Overflow)?;

        book.credit(account, principal, interest)?;

        // Validated above; the arena and index exist.
        if let Some(e) = self
            .accounts
            .get_mut(account)
            .and_then(|list| list.get_mut(index))
        {
            e.closed = Some(ClosedStake {
                closed_at: now,
                interest,
            });
        }
        self.last_time = now;
        Ok(UnstakeReceipt {
            index,
            principal,
            interest,
            total_returned,
        })
    }

    /// Owner-only rate change, recorded as a checkpoint at `now`.
    pub fn set_annual_interest_rate<A: Authority>(
        &mut self,
        authority: &A,
        caller: &Address,
        new_rate: u32,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        if !authority.is_owner(caller) {
            return Err(StakingError::Unauthorized);
        }
        self.check_time(now)?;
        self.rates.push(now, new_rate)?;
        self.last_time = now;
        Ok(())
    }

    pub fn entry(&self, account: &Address, index: usize) -> Result<&StakeEntry, StakingError> {
        let list = self.entries(account);
        list.get(index).ok_or(StakingError::IndexOutOfRange {
            index,
            len: list.len(),
        })
    }

    fn entries(&self, account: &Address) -> &[StakeEntry] {
        self.accounts
            .get(account)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn entry_interest(&self, entry: &StakeEntry, now: Timestamp) -> Result<Amount, StakingError> {
        if let Some(c) = entry.closed {
            return Ok(c.interest);
        }
        Ok(self
            .rates
            .accrued(entry.principal, entry.start_time, now, self.policy)?)
    }

    /// Interest accrued by entry `index` as of `now` (frozen once closed).
    pub fn accrued_interest(
        &self,
        account: &Address,
        index: usize,
        now: Timestamp,
    ) -> Result<Amount, StakingError> {
        let entry = self.entry(account, index)?;
        self.entry_interest(entry, now)
    }

    /// Lazy per-entry views for `account` as of `now`. Clone the iterator to restart it.
    pub fn get_stakes(&self, account: &Address, now: Timestamp) -> Stakes<'_> {
        Stakes {
            ledger: self,
            entries: self.entries(account).iter().enumerate(),
            now,
        }
    }

    pub fn stakes_view(&self, account: &Address, now: Timestamp) -> Result<StakesView, StakingError> {
        let mut out = StakesView::default();
        for v in self.get_stakes(account, now) {
            let v = v?;
            out.amounts.push(v.principal);
            out.start_times.push(v.start_time);
            out.closed.push(v.closed);
            out.accrued_interest.push(v.accrued_interest);
        }
        Ok(out)
    }

    /// Sum of open principals; must match the balance book's staked amount.
    pub fn staked_total(&self, account: &Address) -> Amount {
        self.entries(account)
            .iter()
            .filter(|e| !e.is_closed())
            .fold(0u128, |acc, e| acc.saturating_add(e.principal))
    }

    pub fn open_entries(&self) -> usize {
        self.accounts
            .values()
            .flat_map(|l| l.iter())
            .filter(|e| !e.is_closed())
            .count()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.accounts.keys()
    }
}

/// Iterator returned by [`StakingLedger::get_stakes`].
#[derive(Clone)]
pub struct Stakes<'a> {
    ledger: &'a StakingLedger,
    entries: std::iter::Enumerate<std::slice::Iter<'a, StakeEntry>>,
    now: Timestamp,
}

impl Iterator for Stakes<'_> {
    type Item = Result<StakeView, StakingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, e) = self.entries.next()?;
        Some(
            self.ledger
                .entry_interest(e, self.now)
                .map(|accrued_interest| StakeView {
                    index,
                    principal: e.principal,
                    start_time: e.start_time,
                    closed: e.is_closed(),
                    accrued_interest,
                }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Stakes<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::economics::balances::InMemoryBalances;
    use crate::core::economics::interest::SECONDS_PER_YEAR;
    use crate::core::security::authority::OwnerAuthority;

    const TOKEN: u128 = 1_000_000_000_000_000_000;

    fn owner() -> Address {
        Address::from_bytes([0x01; 20])
    }

    fn staker() -> Address {
        Address::from_bytes([0x05; 20])
    }

    fn setup(policy: RatePolicy) -> (StakingLedger, InMemoryBalances) {
        let mut book = InMemoryBalances::new();
        book.mint(&staker(), 10_000 * TOKEN).unwrap();
        (StakingLedger::new(20_000, 0, policy), book)
    }

    #[test]
    fn zero_amount_is_rejected_without_change() {
        let (mut l, mut b) = setup(RatePolicy::FlatCurrent);
        let before = (l.clone(), b.clone());
        assert_eq!(l.stake(&mut b, &staker(), 0, 10), Err(StakingError::InvalidAmount));
        assert_eq!((l, b), before);
    }

    #[test]
    fn stake_debits_and_returns_sequential_indices() {
        let (mut l, mut b) = setup(RatePolicy::FlatCurrent);
        assert_eq!(l.stake(&mut b, &staker(), 100 * TOKEN, 1).unwrap(), 0);
        assert_eq!(l.stake(&mut b, &staker(), 50 * TOKEN, 2).unwrap(), 1);
        assert_eq!(b.staked_of(&staker()), 150 * TOKEN);
        assert_eq!(l.staked_total(&staker()), 150 * TOKEN);
        assert_eq!(l.open_entries(), 2);
    }

    #[test]
    fn insufficient_balance_leaves_ledger_unchanged() {
        let (mut l, mut b) = setup(RatePolicy::FlatCurrent);
        let before = (l.clone(), b.clone());
        let err = l.stake(&mut b, &staker(), 20_000 * TOKEN, 1).unwrap_err();
        assert_eq!(err, StakingError::Balance(BalanceError::InsufficientBalance));
        assert_eq!((l, b), before);
    }

    #[test]
    fn unstake_pays_interest_and_freezes_it() {
        let (mut l, mut b) = setup(RatePolicy::FlatCurrent);
        l.stake(&mut b, &staker(), 1000 * TOKEN, 0).unwrap();
        let r = l.unstake(&mut b, &staker(), 0, SECONDS_PER_YEAR).unwrap();
        assert_eq!(r.principal, 1000 * TOKEN);
        assert_eq!(r.interest, 200 * TOKEN);
        assert_eq!(r.total_returned, 1200 * TOKEN);
        assert_eq!(b.balance_of(&staker()), 10_200 * TOKEN);
        assert_eq!(b.staked_of(&staker()), 0);

        let later = l
            .accrued_interest(&staker(), 0, 5 * SECONDS_PER_YEAR)
            .unwrap();
        assert_eq!(later, r.interest);
    }

    #[test]
    fn unstake_errors_do_not_mutate() {
        let (mut l, mut b) = setup(RatePolicy::FlatCurrent);
        l.stake(&mut b, &staker(), TOKEN, 0).unwrap();
        let before = (l.clone(), b.clone());
        assert_eq!(
            l.unstake(&mut b, &staker(), 3, 10),
            Err(StakingError::IndexOutOfRange { index: 3, len: 1 })
        );
        assert_eq!((l.clone(), b.clone()), before);

        l.unstake(&mut b, &staker(), 0, 10).unwrap();
        let closed = (l.clone(), b.clone());
        assert_eq!(
            l.unstake(&mut b, &staker(), 0, 20),
            Err(StakingError::AlreadyClosed { index: 0 })
        );
        assert_eq!((l, b), closed);
    }

    #[test]
    fn closing_keeps_other_indices_stable() {
        let (mut l, mut b) = setup(RatePolicy::FlatCurrent);
        for i in 0..3u128 {
            l.stake(&mut b, &staker(), (i + 1) * TOKEN, 0).unwrap();
        }
        l.unstake(&mut b, &staker(), 1, 100).unwrap();
        let views: Vec<_> = l
            .get_stakes(&staker(), 100)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(views.len(), 3);
        assert_eq!(views[2].principal, 3 * TOKEN);
        assert!(views[1].closed);
        assert!(!views[0].closed && !views[2].closed);
        assert_eq!(l.staked_total(&staker()), 4 * TOKEN);
    }

    #[test]
    fn time_must_not_go_backwards() {
        let (mut l, mut b) = setup(RatePolicy::FlatCurrent);
        l.stake(&mut b, &staker(), TOKEN, 100).unwrap();
        assert!(matches!(
            l.stake(&mut b, &staker(), TOKEN, 99),
            Err(StakingError::InvalidState(_))
        ));
        assert!(matches!(
            l.accrued_interest(&staker(), 0, 50),
            Err(StakingError::InvalidState(_))
        ));
    }

    #[test]
    fn rate_change_requires_owner() {
        let (mut l, _) = setup(RatePolicy::FlatCurrent);
        let auth = OwnerAuthority::new(owner());
        assert_eq!(
            l.set_annual_interest_rate(&auth, &staker(), 1, 10),
            Err(StakingError::Unauthorized)
        );
        assert_eq!(l.annual_interest_rate(), 20_000);
        l.set_annual_interest_rate(&auth, &owner(), 10_000, 10).unwrap();
        assert_eq!(l.annual_interest_rate(), 10_000);
        assert_eq!(l.rate_checkpoints().len(), 2);
    }

    #[test]
    fn get_stakes_is_restartable_and_pure() {
        let (mut l, mut b) = setup(RatePolicy::Checkpointed);
        l.stake(&mut b, &staker(), TOKEN, 0).unwrap();
        l.stake(&mut b, &staker(), 2 * TOKEN, 10).unwrap();
        let it = l.get_stakes(&staker(), 1_000);
        assert_eq!(it.len(), 2);
        let first: Vec<_> = it.clone().collect();
        let second: Vec<_> = it.collect();
        assert_eq!(first, second);
        assert_eq!(
            l.stakes_view(&staker(), 1_000).unwrap(),
            l.stakes_view(&staker(), 1_000).unwrap()
        );
        assert_eq!(l.get_stakes(&owner(), 1_000).count(), 0);
    }
}
