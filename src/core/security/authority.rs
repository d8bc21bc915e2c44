#![forbid(unsafe_code)]
#![deny(missing_docs)]
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

//! Owner-gated administration (rate changes).

use crate::core::types::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authority errors.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AuthorityError {
    /// Caller is not the owner.
    #[error("caller is not the owner")]
    NotOwner,
}

/// Identity-check collaborator.
pub trait Authority {
    /// True if `caller` may administer the ledger.
    fn is_owner(&self, caller: &Address) -> bool;
}

/// Single-owner authority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerAuthority {
    owner: Address,
}

impl OwnerAuthority {
    /// Authority owned by `owner`.
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Hand ownership to `new_owner`. Only the current owner may do this.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> Result<(), AuthorityError> {
        if !self.is_owner(caller) {
            return Err(AuthorityError::NotOwner);
        }
        self.owner = new_owner;
        Ok(())
    }
}

impl Authority for OwnerAuthority {
    fn is_owner(&self, caller: &Address) -> bool {
        &self.owner == caller
    }
}
