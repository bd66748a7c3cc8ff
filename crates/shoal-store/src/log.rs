use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use shoal_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::message::Endpoint;

/// One property write inside a committed transaction, as value tokens.
///
/// `old` is `None` when the property did not exist; `new` is `None` when it
/// was removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub object: ObjectId,
    pub property: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// What the primary hands to the log when it accepts a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub seq: u64,
    pub tx: ObjectId,
    pub origin: Endpoint,
    pub changes: Vec<FieldChange>,
}

/// A logged commit, hash-chained to its predecessor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub seq: u64,
    pub tx: ObjectId,
    pub origin: Endpoint,
    pub changes: Vec<FieldChange>,
    pub prev_digest: Option<[u8; 32]>,
    pub digest: [u8; 32],
}

impl CommitRecord {
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Append-only record of every transaction the primary accepted.
pub trait CommitLog: Send + Sync {
    /// Append the next commit. `entry.seq` must follow the current head.
    fn record(&self, entry: CommitEntry) -> StoreResult<CommitRecord>;

    /// All records in sequence order.
    fn records(&self) -> StoreResult<Vec<CommitRecord>>;

    /// The most recent record, if any.
    fn head(&self) -> StoreResult<Option<CommitRecord>>;
}

/// In-memory commit log for tests, demos, and embedding.
#[derive(Default)]
pub struct InMemoryCommitLog {
    records: RwLock<Vec<CommitRecord>>,
}

impl InMemoryCommitLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check sequence monotonicity, previous-digest links, and digests.
    pub fn verify_chain(&self) -> StoreResult<()> {
        let records = self.records.read().expect("lock poisoned");
        let mut prev: Option<&CommitRecord> = None;
        for record in records.iter() {
            if let Some(p) = prev {
                if record.seq <= p.seq {
                    return Err(StoreError::LogIntegrity {
                        seq: record.seq,
                        reason: format!("sequence does not advance past {}", p.seq),
                    });
                }
            }
            if record.prev_digest != prev.map(|p| p.digest) {
                return Err(StoreError::LogIntegrity {
                    seq: record.seq,
                    reason: "previous digest link mismatch".into(),
                });
            }
            let entry = CommitEntry {
                seq: record.seq,
                tx: record.tx,
                origin: record.origin,
                changes: record.changes.clone(),
            };
            if commit_digest(&entry, record.prev_digest)? != record.digest {
                return Err(StoreError::LogIntegrity {
                    seq: record.seq,
                    reason: "digest mismatch".into(),
                });
            }
            prev = Some(record);
        }
        Ok(())
    }
}

impl CommitLog for InMemoryCommitLog {
    fn record(&self, entry: CommitEntry) -> StoreResult<CommitRecord> {
        let mut records = self.records.write().expect("lock poisoned");
        let last = records.last();
        if let Some(last) = last {
            if entry.seq <= last.seq {
                return Err(StoreError::LogIntegrity {
                    seq: entry.seq,
                    reason: format!("append out of order; head is {}", last.seq),
                });
            }
        }
        let prev_digest = last.map(|r| r.digest);
        let digest = commit_digest(&entry, prev_digest)?;
        let record = CommitRecord {
            seq: entry.seq,
            tx: entry.tx,
            origin: entry.origin,
            changes: entry.changes,
            prev_digest,
            digest,
        };
        records.push(record.clone());
        Ok(record)
    }

    fn records(&self) -> StoreResult<Vec<CommitRecord>> {
        Ok(self.records.read().expect("lock poisoned").clone())
    }

    fn head(&self) -> StoreResult<Option<CommitRecord>> {
        Ok(self.records.read().expect("lock poisoned").last().cloned())
    }
}

impl std::fmt::Debug for InMemoryCommitLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCommitLog")
            .field("records", &self.len())
            .finish()
    }
}

fn commit_digest(entry: &CommitEntry, prev: Option<[u8; 32]>) -> StoreResult<[u8; 32]> {
    let encoded = serde_json::to_vec(entry).map_err(|e| StoreError::LogIntegrity {
        seq: entry.seq,
        reason: e.to_string(),
    })?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"shoal-commit-v1:");
    hasher.update(&prev.unwrap_or([0; 32]));
    hasher.update(&encoded);
    Ok(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u64) -> CommitEntry {
        CommitEntry {
            seq,
            tx: ObjectId::generate(),
            origin: ObjectId::generate(),
            changes: vec![FieldChange {
                object: ObjectId::root(),
                property: "name".into(),
                old: None,
                new: Some(format!("'v{seq}'")),
            }],
        }
    }

    #[test]
    fn records_are_chained() {
        let log = InMemoryCommitLog::new();
        let first = log.record(entry(1)).unwrap();
        let second = log.record(entry(2)).unwrap();
        assert_eq!(first.prev_digest, None);
        assert_eq!(second.prev_digest, Some(first.digest));
        assert_ne!(first.digest, second.digest);
        assert_eq!(log.len(), 2);
        assert_eq!(log.head().unwrap(), Some(second));
        log.verify_chain().unwrap();
    }

    #[test]
    fn gaps_allowed_but_not_regressions() {
        let log = InMemoryCommitLog::new();
        log.record(entry(3)).unwrap();
        log.record(entry(7)).unwrap();
        let err = log.record(entry(7)).unwrap_err();
        assert!(matches!(err, StoreError::LogIntegrity { seq: 7, .. }));
        let err = log.record(entry(5)).unwrap_err();
        assert!(matches!(err, StoreError::LogIntegrity { seq: 5, .. }));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn tampering_detected() {
        let log = InMemoryCommitLog::new();
        log.record(entry(1)).unwrap();
        log.record(entry(2)).unwrap();
        log.records.write().unwrap()[0].changes[0].new = Some("'forged'".into());
        let err = log.verify_chain().unwrap_err();
        assert!(matches!(err, StoreError::LogIntegrity { seq: 1, .. }));
    }

    #[test]
    fn broken_link_detected() {
        let log = InMemoryCommitLog::new();
        log.record(entry(1)).unwrap();
        log.record(entry(2)).unwrap();
        log.records.write().unwrap()[1].prev_digest = Some([9; 32]);
        let err = log.verify_chain().unwrap_err();
        assert!(matches!(err, StoreError::LogIntegrity { seq: 2, .. }));
    }

    #[test]
    fn digest_hex_is_64_chars() {
        let log = InMemoryCommitLog::new();
        let record = log.record(entry(1)).unwrap();
        assert_eq!(record.digest_hex().len(), 64);
        assert!(log.verify_chain().is_ok());
    }
}
