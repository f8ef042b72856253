//! Transaction staging (§4.H) and the general snapshot/restore facility
//! (§4.G). These are deliberately two different mechanisms: staging never
//! touches the base store/refs until commit, so rollback is simply
//! discarding the overlay; `Snapshot`/`restore` instead captures and
//! replaces the base state directly, for callers that want a checkpoint
//! outside of `BEGIN`/`COMMIT`.

use std::collections::HashMap;

/// In-memory overlay accumulated between `transaction_begin` and
/// `transaction_commit`/`transaction_rollback`. Reads consult this first;
/// the base store/refs are untouched until commit.
#[derive(Debug, Default)]
pub(crate) struct Overlay {
    pub objects: HashMap<String, Vec<u8>>,
    /// `None` means the ref was deleted within the transaction.
    pub refs: HashMap<String, Option<String>>,
}

/// Transaction manager state (§4.H).
#[derive(Debug, Default)]
pub(crate) enum Transaction {
    #[default]
    None,
    Active(Overlay),
}

/// A deep copy of every ref and the objects it reaches, usable to restore
/// the store to a prior point (§4.G `snapshot`/`restore`).
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub(crate) refs: HashMap<String, String>,
    pub(crate) objects: HashMap<String, Vec<u8>>,
}
