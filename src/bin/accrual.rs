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

//! `accrual <principal> <rate> <elapsed_seconds>`: print simple interest in smallest units.

use anyhow::{bail, Context, Result};
use efy_staking::core::economics::interest::{simple_interest, INTEREST_RATE_SCALE};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 3 {
        bail!("usage: accrual <principal> <rate (scale {INTEREST_RATE_SCALE})> <elapsed_seconds>");
    }
    let principal: u128 = args[0].parse().context("principal")?;
    let rate: u32 = args[1].parse().context("rate")?;
    let elapsed: u64 = args[2].parse().context("elapsed_seconds")?;

    let interest = simple_interest(principal, rate, elapsed)?;
    println!("{interest}");
    Ok(())
}
