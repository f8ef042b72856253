//! `MutationBatch`: the intent a `StateGate::transform` hands back to the
//! Runner — puts, ref swings, ref deletes, and follow-up events — applied
//! together as one WAL batch (§4.F, §4.G.4).

use gatedb_bus::Event;
use gatedb_types::Value;

use crate::error::RunnerError;

/// A value staged to be written to the content store. `type_tag` is
/// informational only (rows vs. schema vs. counter, for logging/tests) —
/// the content store itself is untyped.
#[derive(Debug, Clone)]
pub struct PendingPut {
    /// Caller-supplied tag describing what this put represents.
    pub type_tag: String,
    /// The value to canonicalize and store.
    pub content: Value,
}

/// Where a ref mutation's hash comes from: a put staged earlier in the
/// same batch, or a hash already known to exist.
#[derive(Debug, Clone)]
pub enum RefSource {
    /// The hash produced by `puts[index]` once the batch is applied.
    PutIndex(usize),
    /// A pre-existing hash (used when swinging a ref to an object that's
    /// already in the store).
    Hash(String),
}

/// One staged ref mutation.
#[derive(Debug, Clone)]
pub enum RefMutation {
    /// Point `name` at the hash resolved from `source`.
    Set { name: String, source: RefSource },
    /// Remove `name`.
    Delete { name: String },
}

/// Chainable builder capturing a `StateGate`'s intent. Applying the same
/// batch twice against the same starting state is idempotent: put hashes
/// are deterministic and ref set/delete are overwrites (§4.F).
#[derive(Debug, Clone, Default)]
pub struct MutationBatch {
    puts: Vec<PendingPut>,
    ref_ops: Vec<RefMutation>,
    follow_ups: Vec<Event>,
}

impl MutationBatch {
    /// An empty batch — a pure query gate that emits no writes, only
    /// follow-up events.
    pub fn new() -> MutationBatch {
        MutationBatch::default()
    }

    /// Stage a content-store write, returning its index for `ref_set`.
    pub fn put(mut self, type_tag: impl Into<String>, content: Value) -> MutationBatch {
        self.puts.push(PendingPut { type_tag: type_tag.into(), content });
        self
    }

    /// The number of puts staged so far.
    pub fn put_count(&self) -> usize {
        self.puts.len()
    }

    /// Bind `name` to the hash the `index`th put in this batch will
    /// produce. Fails if `index` is not yet a staged put.
    pub fn ref_set(mut self, name: impl Into<String>, index: usize) -> Result<MutationBatch, RunnerError> {
        if index >= self.puts.len() {
            return Err(RunnerError::PutIndexOutOfRange(index));
        }
        self.ref_ops.push(RefMutation::Set { name: name.into(), source: RefSource::PutIndex(index) });
        Ok(self)
    }

    /// Bind `name` to a hash already known to exist (no new put).
    pub fn ref_set_hash(mut self, name: impl Into<String>, hash: impl Into<String>) -> MutationBatch {
        self.ref_ops.push(RefMutation::Set { name: name.into(), source: RefSource::Hash(hash.into()) });
        self
    }

    /// Stage a ref removal.
    pub fn ref_delete(mut self, name: impl Into<String>) -> MutationBatch {
        self.ref_ops.push(RefMutation::Delete { name: name.into() });
        self
    }

    /// Queue a follow-up event, dispatched depth-first once this batch's
    /// writes are applied.
    pub fn emit(mut self, event: Event) -> MutationBatch {
        self.follow_ups.push(event);
        self
    }

    /// Staged puts, in order.
    pub fn puts(&self) -> &[PendingPut] {
        &self.puts
    }

    /// Staged ref mutations, in order.
    pub fn ref_ops(&self) -> &[RefMutation] {
        &self.ref_ops
    }

    /// Staged follow-up events, in order.
    pub fn follow_ups(&self) -> &[Event] {
        &self.follow_ups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_set_validates_put_index() {
        let batch = MutationBatch::new().put("row", Value::Int(1));
        assert!(batch.clone().ref_set("x", 0).is_ok());
        assert!(matches!(batch.ref_set("x", 1), Err(RunnerError::PutIndexOutOfRange(1))));
    }
}
