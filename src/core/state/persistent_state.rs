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

//! Persistent key-value state using sled, and the ledger snapshot store built on it.
//!
//! A snapshot is written as two keys in one transaction: the canonical encoding and its
//! SHA-256 digest. Loading recomputes the digest and refuses a mismatch.

use crate::core::types::{decode_canonical_limited, encode_canonical, state_digest, H256};
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::ConflictableTransactionError;
use thiserror::Error;

const SNAPSHOT_KEY: &[u8] = b"efy/ledger/snapshot/v1";
const DIGEST_KEY: &[u8] = b"efy/ledger/digest/v1";

/// Upper bound on a decoded snapshot.
pub const MAX_SNAPSHOT_BYTES: usize = 64 * 1024 * 1024;

/// State errors.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("db open")]
    DbOpen,
    #[error("db io")]
    DbIo,
    #[error("codec")]
    Codec,
    #[error("snapshot digest mismatch")]
    Corrupt,
}

/// State operation.
#[derive(Clone, Debug)]
pub enum KvOp {
    /// Put key/value.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete key.
    Del { key: Vec<u8> },
}

/// Persistent state wrapper.
#[derive(Clone)]
pub struct PersistentState {
    db: sled::Db,
}

impl PersistentState {
    /// Open sled DB at path (directory).
    pub fn open(path: &str) -> Result<Self, StateError> {
        let db = sled::open(path).map_err(|_| StateError::DbOpen)?;
        Ok(Self { db })
    }

    /// Get value.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let v = self.db.get(key).map_err(|_| StateError::DbIo)?;
        Ok(v.map(|iv| iv.to_vec()))
    }

    /// Atomic commit using sled transactions.
    pub fn commit_atomic(&self, ops: Vec<KvOp>) -> Result<(), StateError> {
        let res: Result<(), sled::transaction::TransactionError<StateError>> =
            self.db.transaction(|t| {
                for op in ops.iter() {
                    match op {
                        KvOp::Put { key, value } => {
                            t.insert(key.as_slice(), value.as_slice()).map_err(|_| {
                                ConflictableTransactionError::Abort(StateError::DbIo)
                            })?;
                        }
                        KvOp::Del { key } => {
                            t.remove(key.as_slice()).map_err(|_| {
                                ConflictableTransactionError::Abort(StateError::DbIo)
                            })?;
                        }
                    }
                }
                Ok(())
            });

        match res {
            Ok(()) => Ok(()),
            Err(sled::transaction::TransactionError::Abort(e)) => Err(e),
            Err(sled::transaction::TransactionError::Storage(_)) => Err(StateError::DbIo),
        }
    }

    /// Flush dirty pages to disk.
    pub fn flush(&self) -> Result<(), StateError> {
        self.db.flush().map(|_| ()).map_err(|_| StateError::DbIo)
    }
}

/// Snapshot store for the ledger runtime state.
#[derive(Clone)]
pub struct LedgerStore {
    state: PersistentState,
}

impl LedgerStore {
    /// Open the store under `data_dir`.
    pub fn open(data_dir: &str) -> Result<Self, StateError> {
        Ok(Self {
            state: PersistentState::open(data_dir)?,
        })
    }

    /// Persist `snapshot` atomically; returns its digest.
    pub fn save<T: Serialize>(&self, snapshot: &T) -> Result<H256, StateError> {
        let bytes = encode_canonical(snapshot).map_err(|_| StateError::Codec)?;
        let digest = state_digest(snapshot).map_err(|_| StateError::Codec)?;
        self.state.commit_atomic(vec![
            KvOp::Put {
                key: SNAPSHOT_KEY.to_vec(),
                value: bytes,
            },
            KvOp::Put {
                key: DIGEST_KEY.to_vec(),
                value: digest.as_bytes().to_vec(),
            },
        ])?;
        self.state.flush()?;
        Ok(digest)
    }

    /// Load the last snapshot, if any, verifying its digest.
    pub fn load<T: Serialize + DeserializeOwned>(&self) -> Result<Option<(T, H256)>, StateError> {
        let Some(bytes) = self.state.get(SNAPSHOT_KEY)? else {
            return Ok(None);
        };
        let stored = self.state.get(DIGEST_KEY)?.ok_or(StateError::Corrupt)?;
        let value: T =
            decode_canonical_limited(&bytes, MAX_SNAPSHOT_BYTES).map_err(|_| StateError::Codec)?;
        let digest = state_digest(&value).map_err(|_| StateError::Codec)?;
        if digest.as_bytes().as_slice() != stored.as_slice() {
            return Err(StateError::Corrupt);
        }
        Ok(Some((value, digest)))
    }

    /// Remove any stored snapshot.
    pub fn clear(&self) -> Result<(), StateError> {
        self.state.commit_atomic(vec![
            KvOp::Del {
                key: SNAPSHOT_KEY.to_vec(),
            },
            KvOp::Del {
                key: DIGEST_KEY.to_vec(),
            },
        ])
    }

    /// Underlying key-value state.
    pub fn kv(&self) -> &PersistentState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn digest_key() -> &'static [u8] {
        DIGEST_KEY
    }
}

/// Durable destination for runtime snapshots.
pub trait SnapshotSink<T>: Send + Sync {
    /// Persist `snapshot`; returns its digest.
    fn save_snapshot(&self, snapshot: &T) -> Result<H256, StateError>;
}

impl<T: Serialize> SnapshotSink<T> for LedgerStore {
    fn save_snapshot(&self, snapshot: &T) -> Result<H256, StateError> {
        self.save(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tampered_digest_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::open(dir.path().to_str().unwrap()).unwrap();
        store.save(&vec![1u64, 2, 3]).unwrap();
        store
            .kv()
            .commit_atomic(vec![KvOp::Put {
                key: LedgerStore::digest_key().to_vec(),
                value: vec![0u8; 32],
            }])
            .unwrap();
        assert!(matches!(store.load::<Vec<u64>>(), Err(StateError::Corrupt)));
    }

    #[test]
    fn empty_store_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::open(dir.path().to_str().unwrap()).unwrap();
        assert!(store.load::<Vec<u64>>().unwrap().is_none());
        store.save(&vec![9u64]).unwrap();
        store.clear().unwrap();
        assert!(store.load::<Vec<u64>>().unwrap().is_none());
    }
}
