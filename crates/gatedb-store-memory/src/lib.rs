#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gatedb-store-memory** – In-memory storage driver for gatedb.
//!
//! Grounded on `toka-store-memory::MemoryBackend` (HashMap-backed,
//! deduplicated-by-digest storage), narrowed from `Arc<RwLock<...>>` to
//! `RefCell` since gatedb never shares a store across threads, and with
//! the broadcast/live-subscription surface dropped — nothing here needs
//! it; the engine's own event stream already carries notifications.

use std::cell::RefCell;
use std::collections::HashMap;

use gatedb_store_core::{sha256_hex, ContentStore, PendingBatch, RefMap, StoreError, WalBackend};

/// An in-memory, non-persistent object store. All data is lost when the
/// process terminates; intended for tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Number of distinct objects currently stored.
    pub fn object_count(&self) -> usize {
        self.objects.borrow().len()
    }
}

impl ContentStore for MemoryStore {
    fn put(&self, canonical_bytes: &[u8]) -> Result<String, StoreError> {
        let hash = sha256_hex(canonical_bytes);
        self.objects
            .borrow_mut()
            .entry(hash.clone())
            .or_insert_with(|| canonical_bytes.to_vec());
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

/// An in-memory ref map.
#[derive(Debug, Default)]
pub struct MemoryRefs {
    refs: RefCell<HashMap<String, String>>,
}

impl MemoryRefs {
    /// An empty ref map.
    pub fn new() -> MemoryRefs {
        MemoryRefs::default()
    }
}

impl RefMap for MemoryRefs {
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

/// An in-memory WAL slot. Since the whole store is volatile, recovery on
/// "startup" is only meaningful in tests that construct a backend from a
/// batch left over by a simulated crash.
#[derive(Debug, Default)]
pub struct MemoryWal {
    slot: RefCell<Option<PendingBatch>>,
}

impl MemoryWal {
    /// An empty WAL slot.
    pub fn new() -> MemoryWal {
        MemoryWal::default()
    }
}

impl WalBackend for MemoryWal {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_is_deduplicated_by_content_hash() {
        let store = MemoryStore::new();
        let h1 = store.put(b"hello").unwrap();
        let h2 = store.put(b"hello").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn missing_object_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.get("deadbeef"), Err(StoreError::NotFound(_))));
        assert!(!store.has("deadbeef").unwrap());
    }

    #[test]
    fn refs_round_trip_and_delete() {
        let refs = MemoryRefs::new();
        refs.set("db/tables/users", "h1").unwrap();
        assert_eq!(refs.get("db/tables/users").unwrap(), Some("h1".to_string()));
        refs.delete("db/tables/users").unwrap();
        assert_eq!(refs.get("db/tables/users").unwrap(), None);
    }

    #[test]
    fn list_is_strict_prefix_and_sorted() {
        let refs = MemoryRefs::new();
        refs.set("db/tables/users/rows/2", "h").unwrap();
        refs.set("db/tables/users/rows/1", "h").unwrap();
        refs.set("db/tables", "h").unwrap();
        let listed = refs.list("db/tables").unwrap();
        assert_eq!(listed, vec!["db/tables/users/rows/1", "db/tables/users/rows/2"]);
        assert_eq!(refs.list("").unwrap().len(), 3);
    }

    #[test]
    fn wal_slot_is_empty_until_written() {
        let wal = MemoryWal::new();
        assert!(wal.read().unwrap().is_none());
        let batch = PendingBatch {
            timestamp: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            puts: vec![],
            ref_sets: vec![],
            ref_deletes: vec![],
        };
        wal.write(&batch).unwrap();
        assert!(wal.read().unwrap().is_some());
        wal.remove().unwrap();
        assert!(wal.read().unwrap().is_none());
    }
}
