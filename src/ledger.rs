/*
 * classcue/src/ledger.rs
 *
 * Delivery ledger: which reminder checkpoints have already been dispatched.
 *
 * The ledger is a single JSON file rewritten atomically under an advisory
 * lock. Writes are read-merge-write, so a process never drops keys another
 * process committed in the meantime, and keys are never removed.
 *
 * ⚠️ VERSION BUMP REQUIRED:
 * Changes to the on-disk layout (LedgerFile) require incrementing
 * LEDGER_VERSION.
 */

use crate::error::LedgerError;
use crate::storage::LocalStorage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const LEDGER_VERSION: u32 = 1;

// Unknown keys are rejected so that a state file of another shape (or
// another tool's) is reported as corrupt instead of read as empty.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct LedgerFile {
    // Hand-edited ledgers without a version are read as current.
    #[serde(default)]
    version: u32,
    #[serde(default)]
    sent: BTreeMap<String, DateTime<Utc>>,
}

/// Point-in-time copy of the ledger contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    sent: BTreeMap<String, DateTime<Utc>>,
}

impl LedgerSnapshot {
    pub fn contains(&self, checkpoint_key: &str) -> bool {
        self.sent.contains_key(checkpoint_key)
    }

    pub fn sent_at(&self, checkpoint_key: &str) -> Option<DateTime<Utc>> {
        self.sent.get(checkpoint_key).copied()
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryLedger {
    path: PathBuf,
}

impl DeliveryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file without taking the lock. A missing file is an empty
    /// ledger; anything unreadable is corruption.
    fn read_unlocked(&self) -> Result<LedgerFile, LedgerError> {
        let Some(json) = LocalStorage::read_optional(&self.path)? else {
            return Ok(LedgerFile {
                version: LEDGER_VERSION,
                sent: BTreeMap::new(),
            });
        };
        let file: LedgerFile =
            serde_json::from_str(&json).map_err(|e| LedgerError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        if file.version > LEDGER_VERSION {
            return Err(LedgerError::UnsupportedVersion {
                path: self.path.clone(),
                found: file.version,
            });
        }
        Ok(file)
    }

    pub fn load(&self) -> Result<LedgerSnapshot, LedgerError> {
        let file = LocalStorage::with_lock(&self.path, || self.read_unlocked())?;
        Ok(LedgerSnapshot { sent: file.sent })
    }

    /// Fresh read of a single key, seeing every write committed so far.
    pub fn has_been_sent(&self, checkpoint_key: &str) -> Result<bool, LedgerError> {
        Ok(self.load()?.contains(checkpoint_key))
    }

    /// Records `checkpoint_key` as sent at `when`.
    ///
    /// Idempotent: an existing entry keeps its original timestamp and the
    /// call returns `Ok(false)`. Returns `Ok(true)` when the key was added.
    pub fn mark_sent(&self, checkpoint_key: &str, when: DateTime<Utc>) -> Result<bool, LedgerError> {
        LocalStorage::with_lock(&self.path, || {
            let mut file = self.read_unlocked()?;
            if file.sent.contains_key(checkpoint_key) {
                return Ok(false);
            }
            file.sent.insert(checkpoint_key.to_string(), when);
            file.version = LEDGER_VERSION;
            let json = serde_json::to_string_pretty(&file).map_err(|e| LedgerError::Corrupt {
                path: self.path.clone(),
                reason: format!("serialization failed: {}", e),
            })?;
            LocalStorage::atomic_write(&self.path, json)?;
            Ok(true)
        })
    }
}
