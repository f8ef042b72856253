//! The Runner: a Stream extended to honor `StateGate` (§4.G).
//!
//! Grounded on `toka-kernel::Kernel::submit` (validate → dispatch → emit,
//! with failures turned into structured errors rather than propagated)
//! and `toka-runtime::Runtime` (the facade that wires bus + storage +
//! config together) — narrowed to a single-threaded dispatch loop that
//! owns both the pure-gate registry (shared with `gatedb_bus::Stream` so
//! the two compose under one signature namespace) and a second map of
//! `StateGate`s, plus the content store / ref map / WAL the StateGate half
//! needs to resolve reads and apply mutations.

use std::collections::HashMap;
use std::rc::Rc;

use gatedb_bus::{BusError, Event, Log, PureGate, Registry};
use gatedb_store_core::{
    self as wal_ops, canonicalize, content_hash, parse_canonical, ContentStore, PutEntry,
    RefDeleteEntry, RefMap, RefSetEntry, WalBackend,
};
use gatedb_types::Value;
use tracing::warn;

use crate::error::RunnerError;
use crate::mutation::{MutationBatch, RefMutation, RefSource};
use crate::read_set::{ReadSet, ResolvedState};
use crate::state_gate::StateGate;
use crate::transaction::{Overlay, Snapshot, Transaction};

/// The Runner. Owns the durable state (content store, ref map, WAL) and
/// dispatches events to whichever kind of gate — pure or stateful —
/// claims them, strictly depth-first (§5).
pub struct Runner {
    registry: Rc<Registry>,
    state_gates: HashMap<String, Rc<dyn StateGate>>,
    log: Log,
    pending: Vec<Event>,
    event_count: u64,
    gate_count: u64,
    store: Box<dyn ContentStore>,
    refs: Box<dyn RefMap>,
    wal: Box<dyn WalBackend>,
    transaction: Transaction,
}

impl Runner {
    /// Build a Runner over the given backends, checking for and replaying
    /// any pending WAL batch left by a prior crash (§4.D.4) before
    /// returning.
    pub fn open(
        store: Box<dyn ContentStore>,
        refs: Box<dyn RefMap>,
        wal: Box<dyn WalBackend>,
        log: Log,
    ) -> Result<Runner, RunnerError> {
        wal_ops::check(wal.as_ref(), store.as_ref(), refs.as_ref())?;
        Ok(Runner {
            registry: Rc::new(Registry::new()),
            state_gates: HashMap::new(),
            log,
            pending: Vec::new(),
            event_count: 0,
            gate_count: 0,
            store,
            refs,
            wal,
            transaction: Transaction::None,
        })
    }

    /// The shared pure-gate registry, so callers (the executor's row
    /// pipeline, ad-hoc evaluation contexts) can spin up `gatedb_bus`
    /// child streams that resolve through the same signature namespace.
    pub fn pure_registry(&self) -> Rc<Registry> {
        Rc::clone(&self.registry)
    }

    /// The structured dispatch log shared with every pure-gate stream
    /// derived from this Runner's registry.
    pub fn log(&self) -> &Log {
        &self.log
    }

    /// Register a `PureGate`. Fails on a signature collision with either
    /// registry (§4.E) — the two gate kinds share one namespace.
    pub fn register_pure(&self, gate: Rc<dyn PureGate>) -> Result<(), RunnerError> {
        let sig = gate.signature().to_string();
        if self.state_gates.contains_key(&sig) {
            return Err(BusError::SignatureCollision(sig).into());
        }
        self.registry.register(gate)?;
        Ok(())
    }

    /// Register a `StateGate`. Fails on a signature collision with either
    /// registry.
    pub fn register_state(&mut self, gate: Rc<dyn StateGate>) -> Result<(), RunnerError> {
        let sig = gate.signature().to_string();
        if self.registry.get(&sig).is_some() || self.state_gates.contains_key(&sig) {
            return Err(BusError::SignatureCollision(sig).into());
        }
        self.state_gates.insert(sig, gate);
        Ok(())
    }

    /// Emit an event. If a gate — pure or stateful — claims it, it runs
    /// synchronously and any follow-up event is fully processed before
    /// this call returns (§5 strict depth-first order). Otherwise the
    /// event joins the pending queue.
    pub fn emit(&mut self, event: Event) -> Result<(), RunnerError> {
        self.event_count += 1;

        if let Some(gate) = self.state_gates.get(&event.event_type).cloned() {
            self.gate_count += 1;
            self.log.record(&event.event_type, Some(gate.signature()), 0, None, &event.data);
            match self.dispatch_state(gate.as_ref(), &event) {
                Ok(follow_ups) => {
                    for follow_up in follow_ups {
                        self.emit(follow_up)?;
                    }
                }
                Err(e) => {
                    warn!(gate = %gate.signature(), error = %e, "state gate failed");
                    self.pending.push(Event::error(e.to_string(), gate.signature()));
                }
            }
            return Ok(());
        }

        if let Some(gate) = self.registry.get(&event.event_type) {
            self.gate_count += 1;
            self.log.record(&event.event_type, Some(gate.signature()), 0, None, &event.data);
            match gate.transform(&event) {
                Ok(Some(follow_up)) => self.emit(follow_up)?,
                Ok(None) => {}
                Err(e) => {
                    warn!(gate = %gate.signature(), error = %e, "gate failed");
                    self.pending.push(Event::error(e.to_string(), gate.signature()));
                }
            }
            return Ok(());
        }

        self.log.record(&event.event_type, None, 0, None, &event.data);
        self.pending.push(event);
        Ok(())
    }

    /// Drain and return every pending event, in emission order.
    pub fn drain_pending(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    /// Borrow the pending queue without draining it.
    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    fn dispatch_state(&mut self, gate: &dyn StateGate, event: &Event) -> anyhow::Result<Vec<Event>> {
        let read_set = gate.reads(event);
        let state = self.resolve(&read_set)?;
        let batch = gate.transform(event, &state)?;
        let follow_ups = self.apply(batch)?;
        Ok(follow_ups)
    }

    // ---- Read/Mutate Protocol (§4.G.2–4) ----

    /// Resolve a `ReadSet` against current state (base store, overlaid by
    /// any active transaction's staged writes). Exposed so read-only
    /// callers that don't fit the single-event `StateGate` contract — the
    /// SELECT planner/executor, which may need to read several tables at
    /// once and run non-correlated subqueries before producing a single
    /// `query_result` — can resolve state directly rather than round-trip
    /// their compiled plan through a `Value`-encoded event.
    pub fn read(&self, read_set: &ReadSet) -> Result<ResolvedState, RunnerError> {
        self.resolve(read_set)
    }

    fn resolve(&self, read_set: &ReadSet) -> Result<ResolvedState, RunnerError> {
        let mut refs = HashMap::new();
        for name in read_set.refs() {
            let hash = self.ref_get(name)?;
            let value = match &hash {
                Some(h) => Some(self.object_get(name, h)?),
                None => None,
            };
            refs.insert(name.clone(), value);
        }

        let mut patterns = HashMap::new();
        for prefix in read_set.patterns() {
            let names = self.ref_list(prefix)?;
            let mut resolved = HashMap::new();
            for name in names {
                if let Some(hash) = self.ref_get(&name)? {
                    let value = self.object_get(&name, &hash)?;
                    resolved.insert(name, value);
                }
            }
            patterns.insert(prefix.clone(), resolved);
        }

        Ok(ResolvedState { refs, patterns })
    }

    fn apply(&mut self, batch: MutationBatch) -> Result<Vec<Event>, RunnerError> {
        let put_hashes: Vec<String> = batch
            .puts()
            .iter()
            .map(|p| content_hash(&p.content))
            .collect();

        let puts: Vec<PutEntry> = batch
            .puts()
            .iter()
            .zip(put_hashes.iter())
            .map(|(p, h)| PutEntry { hash: h.clone(), content: canonicalize(&p.content), applied: false })
            .collect();

        let mut ref_sets = Vec::new();
        let mut ref_deletes = Vec::new();
        for op in batch.ref_ops() {
            match op {
                RefMutation::Set { name, source } => {
                    let hash = match source {
                        RefSource::PutIndex(i) => put_hashes
                            .get(*i)
                            .cloned()
                            .ok_or(RunnerError::PutIndexOutOfRange(*i))?,
                        RefSource::Hash(h) => h.clone(),
                    };
                    ref_sets.push(RefSetEntry { name: name.clone(), hash, applied: false });
                }
                RefMutation::Delete { name } => {
                    ref_deletes.push(RefDeleteEntry { name: name.clone(), applied: false });
                }
            }
        }

        if let Transaction::Active(overlay) = &mut self.transaction {
            for (put, hash) in batch.puts().iter().zip(put_hashes.iter()) {
                overlay.objects.insert(hash.clone(), canonicalize(&put.content).into_bytes());
            }
            for entry in &ref_sets {
                overlay.refs.insert(entry.name.clone(), Some(entry.hash.clone()));
            }
            for entry in &ref_deletes {
                overlay.refs.insert(entry.name.clone(), None);
            }
        } else if !puts.is_empty() || !ref_sets.is_empty() || !ref_deletes.is_empty() {
            let mut pending_batch = wal_ops::begin(
                self.wal.as_ref(),
                chrono::Utc::now(),
                puts,
                ref_sets.clone(),
                ref_deletes.clone(),
            )?;

            for (i, put) in pending_batch.puts.clone().iter().enumerate() {
                self.store.put(put.content.as_bytes())?;
                wal_ops::mark_put_applied(self.wal.as_ref(), &mut pending_batch, i)?;
            }
            for (i, entry) in pending_batch.ref_sets.clone().iter().enumerate() {
                self.refs.set(&entry.name, &entry.hash)?;
                wal_ops::mark_ref_set_applied(self.wal.as_ref(), &mut pending_batch, i)?;
            }
            for (i, entry) in pending_batch.ref_deletes.clone().iter().enumerate() {
                self.refs.delete(&entry.name)?;
                wal_ops::mark_ref_delete_applied(self.wal.as_ref(), &mut pending_batch, i)?;
            }
            wal_ops::commit(self.wal.as_ref())?;
        }

        Ok(batch.follow_ups().to_vec())
    }

    fn ref_get(&self, name: &str) -> Result<Option<String>, RunnerError> {
        if let Transaction::Active(overlay) = &self.transaction {
            if let Some(staged) = overlay.refs.get(name) {
                return Ok(staged.clone());
            }
        }
        Ok(self.refs.get(name)?)
    }

    fn ref_list(&self, prefix: &str) -> Result<Vec<String>, RunnerError> {
        let mut names: Vec<String> = self.refs.list(prefix)?;
        if let Transaction::Active(overlay) = &self.transaction {
            for (name, staged) in &overlay.refs {
                if !name.starts_with(prefix) || name.len() <= prefix.len() {
                    continue;
                }
                match staged {
                    Some(_) => {
                        if !names.contains(name) {
                            names.push(name.clone());
                        }
                    }
                    None => names.retain(|n| n != name),
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolves the object a ref points to. `name` is the ref that
    /// produced `hash`, carried only so a missing object can be reported
    /// as a `CorruptRef` (§3 I1) rather than a routine `NotFound` — the
    /// ref existing but its object not resolving is a structural
    /// invariant violation, not an ordinary miss.
    fn object_get(&self, name: &str, hash: &str) -> Result<Value, RunnerError> {
        if let Transaction::Active(overlay) = &self.transaction {
            if let Some(bytes) = overlay.objects.get(hash) {
                return Ok(parse_canonical(std::str::from_utf8(bytes).unwrap_or_default())?);
            }
        }
        let bytes = self.store.get(hash).map_err(|e| match e {
            gatedb_store_core::StoreError::NotFound(hash) => {
                gatedb_store_core::StoreError::CorruptRef { name: name.to_string(), hash }
            }
            other => other,
        })?;
        let text = String::from_utf8(bytes).map_err(|e| {
            RunnerError::Store(gatedb_store_core::StoreError::Serialization(e.to_string()))
        })?;
        Ok(parse_canonical(&text)?)
    }

    // ---- Transaction manager (§4.H) ----

    /// `transaction_begin`. Fails if a transaction is already active.
    pub fn transaction_begin(&mut self) -> Result<(), RunnerError> {
        match self.transaction {
            Transaction::None => {
                self.transaction = Transaction::Active(Overlay::default());
                Ok(())
            }
            Transaction::Active(_) => Err(RunnerError::TransactionAlreadyActive),
        }
    }

    /// `transaction_commit`: replay every staged object/ref mutation
    /// against the base store/refs as one WAL batch, then clear the
    /// overlay.
    pub fn transaction_commit(&mut self) -> Result<(), RunnerError> {
        let overlay = match std::mem::replace(&mut self.transaction, Transaction::None) {
            Transaction::Active(overlay) => overlay,
            Transaction::None => return Err(RunnerError::NoActiveTransaction),
        };

        let puts: Vec<PutEntry> = overlay
            .objects
            .iter()
            .map(|(hash, bytes)| PutEntry {
                hash: hash.clone(),
                content: String::from_utf8_lossy(bytes).to_string(),
                applied: false,
            })
            .collect();
        let mut ref_sets = Vec::new();
        let mut ref_deletes = Vec::new();
        for (name, staged) in &overlay.refs {
            match staged {
                Some(hash) => ref_sets.push(RefSetEntry { name: name.clone(), hash: hash.clone(), applied: false }),
                None => ref_deletes.push(RefDeleteEntry { name: name.clone(), applied: false }),
            }
        }

        if !puts.is_empty() || !ref_sets.is_empty() || !ref_deletes.is_empty() {
            let mut pending_batch = wal_ops::begin(self.wal.as_ref(), chrono::Utc::now(), puts, ref_sets, ref_deletes)?;
            for (i, put) in pending_batch.puts.clone().iter().enumerate() {
                self.store.put(put.content.as_bytes())?;
                wal_ops::mark_put_applied(self.wal.as_ref(), &mut pending_batch, i)?;
            }
            for (i, entry) in pending_batch.ref_sets.clone().iter().enumerate() {
                self.refs.set(&entry.name, &entry.hash)?;
                wal_ops::mark_ref_set_applied(self.wal.as_ref(), &mut pending_batch, i)?;
            }
            for (i, entry) in pending_batch.ref_deletes.clone().iter().enumerate() {
                self.refs.delete(&entry.name)?;
                wal_ops::mark_ref_delete_applied(self.wal.as_ref(), &mut pending_batch, i)?;
            }
            wal_ops::commit(self.wal.as_ref())?;
        }
        Ok(())
    }

    /// `transaction_rollback`: discard the overlay. The base store/refs
    /// were never touched, so this is just dropping the staged maps.
    pub fn transaction_rollback(&mut self) -> Result<(), RunnerError> {
        match self.transaction {
            Transaction::Active(_) => {
                self.transaction = Transaction::None;
                Ok(())
            }
            Transaction::None => Err(RunnerError::NoActiveTransaction),
        }
    }

    /// Whether a transaction is currently active.
    pub fn in_transaction(&self) -> bool {
        matches!(self.transaction, Transaction::Active(_))
    }

    // ---- General snapshot/restore (§4.G) ----

    /// A deep copy of every ref and the object it currently resolves to.
    pub fn snapshot(&self) -> Result<Snapshot, RunnerError> {
        let names = self.refs.list("")?;
        let mut refs = HashMap::new();
        let mut objects = HashMap::new();
        for name in names {
            if let Some(hash) = self.refs.get(&name)? {
                if !objects.contains_key(&hash) {
                    objects.insert(hash.clone(), self.store.get(&hash)?);
                }
                refs.insert(name, hash);
            }
        }
        Ok(Snapshot { refs, objects })
    }

    /// Replace the current refs/objects with a prior snapshot: delete
    /// every ref not present in the snapshot, then set every snapshotted
    /// ref (re-inserting its object if the store happened to have been
    /// GC'd, though gatedb never GCs).
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), RunnerError> {
        let current = self.refs.list("")?;
        for name in current {
            if !snapshot.refs.contains_key(&name) {
                self.refs.delete(&name)?;
            }
        }
        for (hash, bytes) in &snapshot.objects {
            if !self.store.has(hash)? {
                self.store.put(bytes)?;
            }
        }
        for (name, hash) in &snapshot.refs {
            self.refs.set(name, hash)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatedb_bus::LogVerbosity;
    use gatedb_store_memory::{MemoryRefs, MemoryStore, MemoryWal};

    fn new_runner() -> Runner {
        Runner::open(
            Box::new(MemoryStore::new()),
            Box::new(MemoryRefs::new()),
            Box::new(MemoryWal::new()),
            Log::new(LogVerbosity::Off),
        )
        .unwrap()
    }

    struct InsertOne;
    impl StateGate for InsertOne {
        fn signature(&self) -> &str {
            "insert_one"
        }
        fn reads(&self, _event: &Event) -> ReadSet {
            ReadSet::new()
        }
        fn transform(&self, _event: &Event, _state: &ResolvedState) -> anyhow::Result<MutationBatch> {
            let batch = MutationBatch::new()
                .put("row", Value::map([("id".to_string(), Value::Int(1))]))
                .ref_set("db/tables/t/rows/1", 0)?
                .emit(Event::new("row_inserted", Value::Int(1)));
            Ok(batch)
        }
    }

    #[test]
    fn state_gate_writes_land_in_store_and_refs() {
        let mut runner = new_runner();
        runner.register_state(Rc::new(InsertOne)).unwrap();
        runner.emit(Event::new("insert_one", Value::Null)).unwrap();
        let pending = runner.drain_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, "row_inserted");

        let read_set = ReadSet::new().reference("db/tables/t/rows/1");
        let state = runner.resolve(&read_set).unwrap();
        let row = state.get_ref("db/tables/t/rows/1").unwrap();
        assert_eq!(row, &Value::map([("id".to_string(), Value::Int(1))]));
    }

    #[test]
    fn transaction_rollback_leaves_base_untouched() {
        let mut runner = new_runner();
        runner.register_state(Rc::new(InsertOne)).unwrap();
        runner.transaction_begin().unwrap();
        runner.emit(Event::new("insert_one", Value::Null)).unwrap();
        runner.drain_pending();
        runner.transaction_rollback().unwrap();
        assert_eq!(runner.refs.get("db/tables/t/rows/1").unwrap(), None);
    }

    #[test]
    fn transaction_commit_applies_staged_writes() {
        let mut runner = new_runner();
        runner.register_state(Rc::new(InsertOne)).unwrap();
        runner.transaction_begin().unwrap();
        runner.emit(Event::new("insert_one", Value::Null)).unwrap();
        runner.drain_pending();
        runner.transaction_commit().unwrap();
        assert!(runner.refs.get("db/tables/t/rows/1").unwrap().is_some());
    }

    #[test]
    fn double_begin_errors() {
        let mut runner = new_runner();
        runner.transaction_begin().unwrap();
        assert!(matches!(runner.transaction_begin(), Err(RunnerError::TransactionAlreadyActive)));
    }

    #[test]
    fn commit_without_begin_errors() {
        let mut runner = new_runner();
        assert!(matches!(runner.transaction_commit(), Err(RunnerError::NoActiveTransaction)));
    }

    #[test]
    fn ref_to_missing_object_is_corrupt_ref_not_not_found() {
        let runner = new_runner();
        runner.refs.set("db/tables/t/rows/1", "deadbeef").unwrap();
        let read_set = ReadSet::new().reference("db/tables/t/rows/1");
        let err = runner.resolve(&read_set).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Store(gatedb_store_core::StoreError::CorruptRef { name, hash })
                if name == "db/tables/t/rows/1" && hash == "deadbeef"
        ));
    }

    #[test]
    fn snapshot_restore_round_trips() {
        let mut runner = new_runner();
        runner.register_state(Rc::new(InsertOne)).unwrap();
        runner.emit(Event::new("insert_one", Value::Null)).unwrap();
        runner.drain_pending();
        let snap = runner.snapshot().unwrap();

        runner.refs.delete("db/tables/t/rows/1").unwrap();
        assert!(runner.refs.get("db/tables/t/rows/1").unwrap().is_none());

        runner.restore(&snap).unwrap();
        assert!(runner.refs.get("db/tables/t/rows/1").unwrap().is_some());
    }
}
