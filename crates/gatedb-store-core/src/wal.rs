//! The write-ahead log and crash-recovery protocol (§4.D).
//!
//! Grounded on `toka-store-core::WriteAheadLog` (stage-then-commit batch
//! abstraction over a durable backend) but narrowed to a single
//! file, `wal/pending.json`, with an explicit per-entry `applied` flag
//! instead of a write-ahead-then-truncate log segment — replay only needs
//! to skip entries already marked done, which makes `recover` idempotent
//! (§8 P6) without a sequence number or checksum scheme.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::traits::{ContentStore, RefMap};

/// A pending content-store write (§3 "WAL pending batch").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutEntry {
    /// Content hash the put will produce (and is keyed by).
    pub hash: String,
    /// The canonical bytes to store, as text (matches the on-disk
    /// canonical encoding produced by `canon::canonicalize`).
    pub content: String,
    /// Whether this entry has already been applied to the store.
    pub applied: bool,
}

/// A pending ref assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefSetEntry {
    /// The ref name being set.
    pub name: String,
    /// The hash it will point to.
    pub hash: String,
    /// Whether this entry has already been applied to the ref map.
    pub applied: bool,
}

/// A pending ref deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefDeleteEntry {
    /// The ref name being deleted.
    pub name: String,
    /// Whether this entry has already been applied to the ref map.
    pub applied: bool,
}

/// The full contents of `wal/pending.json`, present iff a batch is
/// mid-flight (§3 I4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingBatch {
    /// When this batch was begun.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Pending content-store writes.
    pub puts: Vec<PutEntry>,
    /// Pending ref assignments.
    #[serde(rename = "refSets")]
    pub ref_sets: Vec<RefSetEntry>,
    /// Pending ref deletions.
    #[serde(rename = "refDeletes")]
    pub ref_deletes: Vec<RefDeleteEntry>,
}

impl PendingBatch {
    /// Every entry in this batch is marked applied.
    pub fn is_fully_applied(&self) -> bool {
        self.puts.iter().all(|p| p.applied)
            && self.ref_sets.iter().all(|r| r.applied)
            && self.ref_deletes.iter().all(|r| r.applied)
    }
}

/// Durable storage for the single `wal/pending.json` file. A backend
/// implements this over memory (tests, in-memory engine) or a real file
/// (§6.F layout).
pub trait WalBackend {
    /// Write (or overwrite) the pending batch file.
    fn write(&self, batch: &PendingBatch) -> Result<(), StoreError>;

    /// Read the pending batch file, if one exists.
    fn read(&self) -> Result<Option<PendingBatch>, StoreError>;

    /// Remove the pending batch file. A no-op if absent.
    fn remove(&self) -> Result<(), StoreError>;
}

/// Begin a new batch: write `wal/pending.json` with every operation marked
/// `applied = false` (§4.D.1). Returns the batch for the caller (the
/// Runner) to execute op-by-op.
pub fn begin(
    wal: &dyn WalBackend,
    timestamp: chrono::DateTime<chrono::Utc>,
    puts: Vec<PutEntry>,
    ref_sets: Vec<RefSetEntry>,
    ref_deletes: Vec<RefDeleteEntry>,
) -> Result<PendingBatch, StoreError> {
    let batch = PendingBatch {
        timestamp,
        puts: puts
            .into_iter()
            .map(|p| PutEntry { applied: false, ..p })
            .collect(),
        ref_sets: ref_sets
            .into_iter()
            .map(|r| RefSetEntry { applied: false, ..r })
            .collect(),
        ref_deletes: ref_deletes
            .into_iter()
            .map(|r| RefDeleteEntry { applied: false, ..r })
            .collect(),
    };
    wal.write(&batch)?;
    Ok(batch)
}

/// Mark the put at `index` applied and rewrite the file (§4.D.2).
pub fn mark_put_applied(
    wal: &dyn WalBackend,
    batch: &mut PendingBatch,
    index: usize,
) -> Result<(), StoreError> {
    batch.puts[index].applied = true;
    wal.write(batch)
}

/// Mark the ref-set at `index` applied and rewrite the file.
pub fn mark_ref_set_applied(
    wal: &dyn WalBackend,
    batch: &mut PendingBatch,
    index: usize,
) -> Result<(), StoreError> {
    batch.ref_sets[index].applied = true;
    wal.write(batch)
}

/// Mark the ref-delete at `index` applied and rewrite the file.
pub fn mark_ref_delete_applied(
    wal: &dyn WalBackend,
    batch: &mut PendingBatch,
    index: usize,
) -> Result<(), StoreError> {
    batch.ref_deletes[index].applied = true;
    wal.write(batch)
}

/// Remove `wal/pending.json`, ending the batch (§4.D.3).
pub fn commit(wal: &dyn WalBackend) -> Result<(), StoreError> {
    wal.remove()
}

/// Startup check (§4.D.4): if no pending batch exists, the store is clean
/// and this is a no-op returning `Ok(false)`. Otherwise, replay every
/// `applied = false` entry — `store.put` for puts, `refs.set` for ref
/// sets, `refs.delete` for ref deletes — then remove the file and return
/// `Ok(true)`. Replay is idempotent (§8 P6): re-running `check` against an
/// already-clean store is a no-op, and replaying an already-applied entry
/// is harmless since puts are content-addressed and ref-sets overwrite.
pub fn check(
    wal: &dyn WalBackend,
    store: &dyn ContentStore,
    refs: &dyn RefMap,
) -> Result<bool, StoreError> {
    let Some(batch) = wal.read()? else {
        return Ok(false);
    };
    recover(&batch, store, refs)?;
    wal.remove()?;
    Ok(true)
}

/// Reapply every unapplied operation in `batch` against `store`/`refs`.
/// Does not touch the WAL file itself; callers that own the file's
/// lifecycle (`check`) remove it afterward.
pub fn recover(
    batch: &PendingBatch,
    store: &dyn ContentStore,
    refs: &dyn RefMap,
) -> Result<(), StoreError> {
    for put in &batch.puts {
        if !put.applied {
            store.put(put.content.as_bytes())?;
        }
    }
    for ref_set in &batch.ref_sets {
        if !ref_set.applied {
            refs.set(&ref_set.name, &ref_set.hash)?;
        }
    }
    for ref_delete in &batch.ref_deletes {
        if !ref_delete.applied {
            refs.delete(&ref_delete.name)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemWal {
        slot: RefCell<Option<PendingBatch>>,
    }

    impl WalBackend for MemWal {
        fn write(&self, batch: &PendingBatch) -> Result<(), StoreError> {
            *self.slot.borrow_mut() = Some(batch.clone());
            Ok(())
        }
        fn read(&self) -> Result<Option<PendingBatch>, StoreError> {
            Ok(self.slot.borrow().clone())
        }
        fn remove(&self) -> Result<(), StoreError> {
            *self.slot.borrow_mut() = None;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemStore {
        objects: RefCell<HashMap<String, Vec<u8>>>,
    }
    impl ContentStore for MemStore {
        fn put(&self, bytes: &[u8]) -> Result<String, StoreError> {
            let hash = crate::hash::sha256_hex(bytes);
            self.objects.borrow_mut().insert(hash.clone(), bytes.to_vec());
            Ok(hash)
        }
        fn get(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
            self.objects
                .borrow()
                .get(hash)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(hash.to_string()))
        }
        fn has(&self, hash: &str) -> Result<bool, StoreError> {
            Ok(self.objects.borrow().contains_key(hash))
        }
    }

    #[derive(Default)]
    struct MemRefs {
        refs: RefCell<HashMap<String, String>>,
    }
    impl RefMap for MemRefs {
        fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
            Ok(self.refs.borrow().get(name).cloned())
        }
        fn set(&self, name: &str, hash: &str) -> Result<(), StoreError> {
            self.refs.borrow_mut().insert(name.to_string(), hash.to_string());
            Ok(())
        }
        fn delete(&self, name: &str) -> Result<(), StoreError> {
            self.refs.borrow_mut().remove(name);
            Ok(())
        }
        fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            let mut names: Vec<String> = self
                .refs
                .borrow()
                .keys()
                .filter(|n| n.starts_with(prefix) && n.len() > prefix.len())
                .cloned()
                .collect();
            names.sort();
            Ok(names)
        }
    }

    #[test]
    fn clean_store_has_nothing_to_recover() {
        let wal = MemWal::default();
        let store = MemStore::default();
        let refs = MemRefs::default();
        assert_eq!(check(&wal, &store, &refs).unwrap(), false);
    }

    #[test]
    fn recover_replays_only_unapplied_entries() {
        let wal = MemWal::default();
        let store = MemStore::default();
        let refs = MemRefs::default();

        let content = r#"{"id":1,"name":"Alice"}"#.to_string();
        let hash = crate::hash::sha256_hex(content.as_bytes());
        // put already applied (object pre-exists), refSet not yet applied.
        store.put(content.as_bytes()).unwrap();
        let batch = PendingBatch {
            timestamp: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            puts: vec![PutEntry { hash: hash.clone(), content, applied: true }],
            ref_sets: vec![RefSetEntry {
                name: "db/tables/users/rows/1".to_string(),
                hash: hash.clone(),
                applied: false,
            }],
            ref_deletes: vec![],
        };
        wal.write(&batch).unwrap();

        assert_eq!(check(&wal, &store, &refs).unwrap(), true);
        assert_eq!(refs.get("db/tables/users/rows/1").unwrap(), Some(hash));
        assert!(wal.read().unwrap().is_none());
    }

    #[test]
    fn recover_is_idempotent() {
        let wal = MemWal::default();
        let store = MemStore::default();
        let refs = MemRefs::default();

        let content = "x".to_string();
        let hash = crate::hash::sha256_hex(content.as_bytes());
        let batch = PendingBatch {
            timestamp: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            puts: vec![PutEntry { hash, content, applied: false }],
            ref_sets: vec![],
            ref_deletes: vec![],
        };
        wal.write(&batch).unwrap();

        assert_eq!(check(&wal, &store, &refs).unwrap(), true);
        // A second check against the now-clean store is a no-op.
        assert_eq!(check(&wal, &store, &refs).unwrap(), false);
    }

    #[test]
    fn begin_marks_every_entry_unapplied() {
        let wal = MemWal::default();
        let batch = begin(
            &wal,
            chrono::DateTime::from_timestamp(0, 0).unwrap(),
            vec![PutEntry { hash: "h".into(), content: "c".into(), applied: true }],
            vec![],
            vec![],
        )
        .unwrap();
        assert!(!batch.puts[0].applied);
    }
}
