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

//! Deterministic core types and canonical encoding helpers.

use bincode::Options;
use ring::digest;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Seconds since UNIX epoch, as supplied by the execution environment.
pub type Timestamp = u64;

/// Token amount in smallest units (18 decimals).
pub type Amount = u128;

/// Canonical serialization error.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization")]
    Serialize,
    #[error("deserialization")]
    Deserialize,
    #[error("size limit exceeded")]
    TooLarge,
}

/// Canonical bincode options (deterministic).
fn bincode_opts() -> impl Options {
    // Fixint encoding provides a stable integer representation.
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode with deterministic rules. Requires deterministic container ordering (use BTreeMap/BTreeSet).
pub fn encode_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    bincode_opts()
        .serialize(v)
        .map_err(|_| CodecError::Serialize)
}

/// Decode with a hard size cap.
pub fn decode_canonical_limited<T: DeserializeOwned>(
    bytes: &[u8],
    max: usize,
) -> Result<T, CodecError> {
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Deserialize)
}

/// SHA-256 over the canonical encoding of `v`.
pub fn state_digest<T: Serialize>(v: &T) -> Result<H256, CodecError> {
    let bytes = encode_canonical(v)?;
    let d = digest::digest(&digest::SHA256, &bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(d.as_ref());
    Ok(H256(out))
}

/// 256-bit hash type (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct H256([u8; 32]);

impl H256 {
    /// Construct from raw bytes.
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }
    /// Return bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Address parse error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must be 0x-prefixed")]
    MissingPrefix,
    #[error("address must be 20 bytes of hex")]
    BadHex,
}

/// Account identifier: 20 opaque bytes, written as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// Construct from raw bytes.
    pub const fn from_bytes(b: [u8; 20]) -> Self {
        Self(b)
    }

    /// Return bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;
        let mut out = [0u8; 20];
        hex::decode_to_slice(body, &mut out).map_err(|_| AddressError::BadHex)?;
        Ok(Self(out))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
