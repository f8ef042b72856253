//! Runner-level errors (§7): transaction misuse plus whatever the
//! underlying store/ref map surfaces.

/// Errors raised while resolving reads, applying mutations, or managing
/// transactions.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Propagated verbatim from the content store / ref map / WAL.
    #[error(transparent)]
    Store(#[from] gatedb_store_core::StoreError),
    /// `transaction_begin` while a transaction is already active.
    #[error("transaction already active")]
    TransactionAlreadyActive,
    /// `transaction_commit` / `transaction_rollback` with no active
    /// transaction.
    #[error("no active transaction")]
    NoActiveTransaction,
    /// A `MutationBatch::ref_set` referenced a put index beyond the
    /// number of puts staged in the batch so far.
    #[error("ref_set put index {0} out of range")]
    PutIndexOutOfRange(usize),
    /// Propagated from the gate registry (duplicate signature).
    #[error(transparent)]
    Bus(#[from] gatedb_bus::BusError),
}
