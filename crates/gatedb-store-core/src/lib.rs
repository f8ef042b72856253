#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gatedb-store-core** – Content-addressed storage, ref-map, canonical
//! encoding, and WAL recovery traits (§4.A–§4.D).
//!
//! This crate defines the durable-state contract; `gatedb-store-memory`
//! and `gatedb-store-file` provide concrete backends. Grounded on
//! `toka-store-core`'s `StorageBackend`/`WriteAheadLog` split, generalized
//! from async blake3/MessagePack to synchronous SHA-256 over a bespoke
//! deterministic text encoding (§4.C).

mod canon;
mod error;
mod hash;
mod traits;
mod wal;

pub use canon::{canonicalize, content_hash, parse_canonical};
pub use error::StoreError;
pub use hash::sha256_hex;
pub use traits::{ContentStore, RefMap};
pub use wal::{
    begin, check, commit, mark_put_applied, mark_ref_delete_applied, mark_ref_set_applied,
    recover, PendingBatch, PutEntry, RefDeleteEntry, RefSetEntry, WalBackend,
};
