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

#![no_main]
#![forbid(unsafe_code)]

use arbitrary::Arbitrary;
use efy_staking::core::economics::interest::{RatePolicy, RateSchedule};
use libfuzzer_sys::fuzz_target;

#[derive(Clone, Debug, Arbitrary)]
struct Input {
    principal: u128,
    genesis_rate: u32,
    changes: Vec<(u32, u32)>,
    start: u64,
    end: u64,
}

fuzz_target!(|inp: Input| {
    let mut sched = RateSchedule::new(inp.genesis_rate, 0);
    let mut at = 0u64;
    for (gap, rate) in inp.changes.iter().take(64) {
        at = at.saturating_add(u64::from(*gap));
        let _ = sched.push(at, *rate);
    }
    for policy in [RatePolicy::FlatCurrent, RatePolicy::Checkpointed] {
        // Must never panic; errors are fine.
        let _ = sched.accrued(inp.principal, inp.start, inp.end, policy);
    }
});
