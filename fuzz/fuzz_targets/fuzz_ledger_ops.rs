// Copyright (c) 2026 EFY Finance
// Licensed under the Apache License, Version 2.0

#![no_main]
#![forbid(unsafe_code)]

use arbitrary::Arbitrary;
use efy_staking::core::economics::balances::{BalanceBook, InMemoryBalances};
use efy_staking::core::economics::interest::RatePolicy;
use efy_staking::core::economics::staking::StakingLedger;
use efy_staking::core::security::authority::OwnerAuthority;
use efy_staking::core::types::Address;
use libfuzzer_sys::fuzz_target;

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    Stake { who: u8, amount: u128, dt: u32 },
    Unstake { who: u8, index: u8, dt: u32 },
    SetRate { caller: u8, rate: u32, dt: u32 },
}

#[derive(Clone, Debug, Arbitrary)]
struct Input {
    checkpointed: bool,
    ops: Vec<Op>,
}

fn addr(b: u8) -> Address {
    Address::from_bytes([b % 4; 20])
}

fuzz_target!(|inp: Input| {
    let policy = if inp.checkpointed {
        RatePolicy::Checkpointed
    } else {
        RatePolicy::FlatCurrent
    };
    let auth = OwnerAuthority::new(addr(0));
    let mut book = InMemoryBalances::new();
    for b in 0..4u8 {
        let _ = book.mint(&addr(b), u128::from(u64::MAX));
    }
    let mut ledger = StakingLedger::new(20_000, 0, policy);
    let mut now = 0u64;

    for op in inp.ops.iter().take(256) {
        match op {
            Op::Stake { who, amount, dt } => {
                now = now.saturating_add(u64::from(*dt));
                let _ = ledger.stake(&mut book, &addr(*who), *amount, now);
            }
            Op::Unstake { who, index, dt } => {
                now = now.saturating_add(u64::from(*dt));
                let _ = ledger.unstake(&mut book, &addr(*who), usize::from(*index), now);
            }
            Op::SetRate { caller, rate, dt } => {
                now = now.saturating_add(u64::from(*dt));
                let _ = ledger.set_annual_interest_rate(&auth, &addr(*caller), *rate, now);
            }
        }
        for b in 0..4u8 {
            assert_eq!(ledger.staked_total(&addr(b)), book.staked_of(&addr(b)));
        }
    }
});
