//! Storage-layer errors (§7).

/// Errors raised by content store, ref map, and WAL operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `ContentStore::get` found no object for the given hash.
    #[error("object not found: {0}")]
    NotFound(String),
    /// A ref resolved to a hash with no backing object — a structural
    /// invariant violation (§3 I1), not a routine "not found".
    #[error("corrupt ref {name}: points to missing object {hash}")]
    CorruptRef {
        /// The ref name.
        name: String,
        /// The hash it pointed to.
        hash: String,
    },
    /// Underlying filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(String),
    /// Canonical/WAL (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
