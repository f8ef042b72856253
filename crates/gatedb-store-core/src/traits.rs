//! The two durable-state seams gatedb is built on (§3, §4.A/§4.B):
//! content-addressed, immutable object storage, and a mutable name→hash
//! indirection layer on top of it.
//!
//! Grounded on `toka-store-core::StorageBackend` (async `commit`/`header`/
//! `payload_bytes` trait over a `Arc<RwLock<...>>` backend), narrowed to a
//! synchronous `&self`-based shape: every method here takes `&self` and
//! backends hide their mutability behind `RefCell` (in-memory) or the
//! filesystem itself (file-backed), matching the single-threaded model the
//! rest of gatedb is built around.

use crate::error::StoreError;

/// Content-addressed, deduplicated, immutable object storage (§4.A).
pub trait ContentStore {
    /// Store a value's canonical bytes under its content hash, returning
    /// that hash. Storing the same bytes twice is a no-op the second time
    /// (§3 I2) and returns the same hash.
    fn put(&self, canonical_bytes: &[u8]) -> Result<String, StoreError>;

    /// Fetch the canonical bytes previously stored under `hash`.
    fn get(&self, hash: &str) -> Result<Vec<u8>, StoreError>;

    /// Whether an object with this hash has been stored.
    fn has(&self, hash: &str) -> Result<bool, StoreError>;
}

/// Mutable name → content-hash indirection (§4.B).
pub trait RefMap {
    /// The hash a ref currently points to, if it exists.
    fn get(&self, name: &str) -> Result<Option<String>, StoreError>;

    /// Point `name` at `hash`, creating or overwriting it.
    fn set(&self, name: &str, hash: &str) -> Result<(), StoreError>;

    /// Remove a ref. Deleting a name that doesn't exist is a no-op.
    fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Every ref name that strictly extends `prefix` (i.e. starts with it
    /// and has at least one more character), in codepoint-sorted order
    /// (§8 P5: `"db/tables/"` does not match a ref literally named
    /// `"db/tables"`; `""` matches every non-empty name).
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

#[cfg(test)]
mod tests {
    // Exercised against concrete backends in gatedb-store-memory and
    // gatedb-store-file; this crate only defines the contract.
}
