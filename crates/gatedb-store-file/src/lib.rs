#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gatedb-store-file** – Filesystem-backed storage driver for gatedb
//! (§6.F persisted layout).
//!
//! Grounded on `toka-store-sled::SledBackend`'s `open`/`temporary`/`flush`
//! shape, but the persisted layout here is plain files under a base
//! directory rather than an embedded KV engine: a sled-backed driver
//! would violate the literal `<base>/store/<hh>/<rest>` text layout
//! required for direct on-disk inspection. Writes go through a
//! temp-file-then-rename so a crash never leaves a half-written object,
//! ref, or WAL file on disk — a two-phase write per op rather than an
//! in-place rewrite.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use gatedb_store_core::{sha256_hex, ContentStore, PendingBatch, RefMap, StoreError, WalBackend};

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().ok_or_else(|| StoreError::Io("path has no parent".to_string()))?;
    fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("tmp")
    ));
    {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// A content-addressed object store rooted at `<base>/store/` (§6.F).
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if absent) a store rooted at `<base>/store`.
    pub fn open<P: AsRef<Path>>(base: P) -> Result<FileStore, StoreError> {
        let root = base.as_ref().join("store");
        fs::create_dir_all(&root)?;
        Ok(FileStore { root })
    }

    fn object_path(&self, hash: &str) -> PathBuf {
        let (hh, rest) = hash.split_at(2.min(hash.len()));
        self.root.join(hh).join(rest)
    }
}

impl ContentStore for FileStore {
    fn put(&self, canonical_bytes: &[u8]) -> Result<String, StoreError> {
        let hash = sha256_hex(canonical_bytes);
        let path = self.object_path(&hash);
        if !path.exists() {
            atomic_write(&path, canonical_bytes)?;
        }
        Ok(hash)
    }

    fn get(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(hash);
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(hash.to_string())
            } else {
                StoreError::from(e)
            }
        })
    }

    fn has(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(self.object_path(hash).exists())
    }
}

/// A ref map rooted at `<base>/refs/`; each ref is a text file containing
/// the hex hash it points to, with `/`-separated names mapping directly
/// onto nested directories (§6.F).
#[derive(Debug, Clone)]
pub struct FileRefs {
    root: PathBuf,
}

impl FileRefs {
    /// Open (creating if absent) a ref map rooted at `<base>/refs`.
    pub fn open<P: AsRef<Path>>(base: P) -> Result<FileRefs, StoreError> {
        let root = base.as_ref().join("refs");
        fs::create_dir_all(&root)?;
        Ok(FileRefs { root })
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Removes now-empty directories from `path`'s parent up to (but not
    /// including) `self.root`, stopping at the first non-empty one
    /// (§4.B: "empty directories are pruned on delete").
    fn prune_empty_ancestors(&self, path: &Path) {
        let mut dir = match path.parent() {
            Some(d) => d.to_path_buf(),
            None => return,
        };
        while dir != self.root && dir.starts_with(&self.root) {
            match fs::remove_dir(&dir) {
                Ok(()) => {}
                Err(_) => break,
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break,
            }
        }
    }

    fn walk(&self, dir: &Path, acc: &mut Vec<String>) -> Result<(), StoreError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, acc)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                if let Some(name) = relative.to_str() {
                    acc.push(name.replace(std::path::MAIN_SEPARATOR, "/"));
                }
            }
        }
        Ok(())
    }
}

impl RefMap for FileRefs {
    fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.ref_path(name);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn set(&self, name: &str, hash: &str) -> Result<(), StoreError> {
        atomic_write(&self.ref_path(name), hash.as_bytes())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.ref_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_ancestors(&path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut all = Vec::new();
        self.walk(&self.root, &mut all)?;
        let mut matching: Vec<String> = all
            .into_iter()
            .filter(|n| n.starts_with(prefix) && n.len() > prefix.len())
            .collect();
        matching.sort();
        Ok(matching)
    }
}

/// The single `<base>/wal/pending.json` file (§4.D, §6.F).
#[derive(Debug, Clone)]
pub struct FileWal {
    path: PathBuf,
}

impl FileWal {
    /// Open (creating the parent directory if absent) the WAL file at
    /// `<base>/wal/pending.json`.
    pub fn open<P: AsRef<Path>>(base: P) -> Result<FileWal, StoreError> {
        let dir = base.as_ref().join("wal");
        fs::create_dir_all(&dir)?;
        Ok(FileWal { path: dir.join("pending.json") })
    }
}

impl WalBackend for FileWal {
    fn write(&self, batch: &PendingBatch) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(batch)?;
        atomic_write(&self.path, &bytes)
    }

    fn read(&self) -> Result<Option<PendingBatch>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatedb_store_core::{check, PutEntry, RefSetEntry};
    use tempfile::tempdir;

    #[test]
    fn put_dedups_and_lays_out_hh_rest() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let hash = store.put(b"hello").unwrap();
        let expected = dir.path().join("store").join(&hash[..2]).join(&hash[2..]);
        assert!(expected.exists());
        assert_eq!(store.get(&hash).unwrap(), b"hello");
    }

    #[test]
    fn missing_object_not_found() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(store.get("deadbeef"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn refs_persist_as_nested_text_files() {
        let dir = tempdir().unwrap();
        let refs = FileRefs::open(dir.path()).unwrap();
        refs.set("db/tables/users/rows/1", "abc123").unwrap();
        let path = dir.path().join("refs/db/tables/users/rows/1");
        assert_eq!(fs::read_to_string(path).unwrap(), "abc123");
        assert_eq!(refs.get("db/tables/users/rows/1").unwrap(), Some("abc123".to_string()));
    }

    #[test]
    fn list_matches_strict_nested_prefix() {
        let dir = tempdir().unwrap();
        let refs = FileRefs::open(dir.path()).unwrap();
        refs.set("db/tables/users/rows/1", "h").unwrap();
        refs.set("db/tables/users/rows/2", "h").unwrap();
        refs.set("db/tables", "h").unwrap();
        let listed = refs.list("db/tables").unwrap();
        assert_eq!(listed, vec!["db/tables/users/rows/1", "db/tables/users/rows/2"]);
    }

    #[test]
    fn delete_prunes_now_empty_parent_directories() {
        let dir = tempdir().unwrap();
        let refs = FileRefs::open(dir.path()).unwrap();
        refs.set("db/tables/users/rows/1", "h").unwrap();
        refs.set("db/tables/users/rows/2", "h").unwrap();

        refs.delete("db/tables/users/rows/1").unwrap();
        assert!(dir.path().join("refs/db/tables/users/rows").exists());

        refs.delete("db/tables/users/rows/2").unwrap();
        assert!(!dir.path().join("refs/db/tables/users/rows").exists());
        assert!(!dir.path().join("refs/db/tables/users").exists());
        assert!(!dir.path().join("refs/db/tables").exists());
        assert!(dir.path().join("refs").exists());
    }

    #[test]
    fn wal_recovers_after_simulated_crash() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let refs = FileRefs::open(dir.path()).unwrap();
        let wal = FileWal::open(dir.path()).unwrap();

        let content = "x".to_string();
        let hash = sha256_hex(content.as_bytes());
        wal.write(&PendingBatch {
            timestamp: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            puts: vec![PutEntry { hash: hash.clone(), content, applied: false }],
            ref_sets: vec![RefSetEntry {
                name: "db/tables/t/rows/1".to_string(),
                hash: hash.clone(),
                applied: false,
            }],
            ref_deletes: vec![],
        })
        .unwrap();

        assert!(check(&wal, &store, &refs).unwrap());
        assert_eq!(refs.get("db/tables/t/rows/1").unwrap(), Some(hash));
        assert!(wal.read().unwrap().is_none());
    }
}
