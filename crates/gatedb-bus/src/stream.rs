//! The depth-first event router (§4.E, §5).
//!
//! Grounded on `toka-bus-core::EventBus`/`InMemoryBus` (a named-signature
//! publish/subscribe abstraction) and `toka-kernel::registry` (a
//! signature-keyed handler map with duplicate-registration rejection), but
//! generalized from Toka's async broadcast model to a single-threaded,
//! strictly depth-first dispatch: an `emit` only returns once
//! every event it (transitively) caused has been fully processed. There is
//! no separate subscriber list — a gate either claims an event outright or
//! it falls through to the pending queue.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tracing::{trace, warn};

use crate::error::BusError;
use crate::event::Event;
use crate::log::Log;

/// A gate that consumes an event and optionally produces one follow-up
/// event, with no access to durable state (§4.F `PureGate`).
pub trait PureGate {
    /// The event type this gate claims.
    fn signature(&self) -> &str;
    /// Transform the event. `Ok(None)` consumes it; `Ok(Some(e))` causes `e`
    /// to be dispatched next, depth-first, before this call returns to its
    /// caller. `Err` is captured by the router as an `error` event.
    fn transform(&self, event: &Event) -> anyhow::Result<Option<Event>>;
}

/// A shared registry of [`PureGate`]s keyed by signature. Shared (via
/// `Rc`) between a root stream and every stream derived from it.
#[derive(Default)]
pub struct Registry {
    gates: RefCell<HashMap<String, Rc<dyn PureGate>>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Register a gate. Fails if its signature is already taken (§4.E).
    pub fn register(&self, gate: Rc<dyn PureGate>) -> Result<(), BusError> {
        let sig = gate.signature().to_string();
        let mut gates = self.gates.borrow_mut();
        if gates.contains_key(&sig) {
            return Err(BusError::SignatureCollision(sig));
        }
        gates.insert(sig, gate);
        Ok(())
    }

    /// Look up the gate claiming a signature, if any.
    pub fn get(&self, signature: &str) -> Option<Rc<dyn PureGate>> {
        self.gates.borrow().get(signature).cloned()
    }
}

fn next_stream_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, AtomicOrdering::Relaxed)
}

/// A shallow, non-live snapshot of a stream's observable state (§4.E
/// `sampleHere`).
#[derive(Debug, Clone)]
pub struct Sample {
    /// Events emitted but not consumed by any gate, in emission order.
    pub pending: Vec<Event>,
    /// Total number of `emit` calls processed on this stream.
    pub event_count: u64,
    /// Total number of those emits a gate claimed.
    pub gate_count: u64,
}

/// A single-threaded, depth-first event stream.
pub struct Stream {
    registry: Rc<Registry>,
    log: Log,
    id: u64,
    parent_id: Option<u64>,
    pending: Vec<Event>,
    event_count: u64,
    gate_count: u64,
}

impl Stream {
    /// Create a new root stream with its own registry and log.
    pub fn new(log: Log) -> Stream {
        Stream {
            registry: Rc::new(Registry::new()),
            log,
            id: next_stream_id(),
            parent_id: None,
            pending: Vec::new(),
            event_count: 0,
            gate_count: 0,
        }
    }

    /// Create a root stream sharing an existing registry (used by the
    /// runner, which keeps its own combined pure/state registry and wants
    /// row-pipeline gates registered on a `Stream` it owns to still resolve
    /// through the same signature namespace is not required; this
    /// constructor exists for callers that build the registry externally).
    pub fn with_registry(registry: Rc<Registry>, log: Log) -> Stream {
        Stream {
            registry,
            log,
            id: next_stream_id(),
            parent_id: None,
            pending: Vec::new(),
            event_count: 0,
            gate_count: 0,
        }
    }

    /// This stream's id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Register a gate on this stream's registry.
    pub fn register(&self, gate: Rc<dyn PureGate>) -> Result<(), BusError> {
        self.registry.register(gate)
    }

    /// Spawn a child stream: shares the registry and log, starts with an
    /// empty pending queue and zeroed counters (§4.E "Child streams").
    pub fn child(&self) -> Stream {
        Stream {
            registry: Rc::clone(&self.registry),
            log: self.log.clone(),
            id: next_stream_id(),
            parent_id: Some(self.id),
            pending: Vec::new(),
            event_count: 0,
            gate_count: 0,
        }
    }

    /// Emit an event. If a gate claims it, `transform` runs synchronously
    /// and any follow-up event is fully processed (recursively) before this
    /// call returns — strict depth-first order (§5). Otherwise the event is
    /// appended to the pending queue.
    pub fn emit(&mut self, event: Event) {
        self.event_count += 1;
        let gate = self.registry.get(&event.event_type);
        match gate {
            Some(gate) => {
                self.gate_count += 1;
                self.log.record(
                    &event.event_type,
                    Some(gate.signature()),
                    self.id,
                    self.parent_id,
                    &event.data,
                );
                match gate.transform(&event) {
                    Ok(Some(follow_up)) => {
                        trace!(from = %event.event_type, to = %follow_up.event_type, "gate follow-up");
                        self.emit(follow_up);
                    }
                    Ok(None) => {
                        trace!(event = %event.event_type, gate = %gate.signature(), "event consumed");
                    }
                    Err(e) => {
                        warn!(gate = %gate.signature(), error = %e, "gate failed");
                        self.pending.push(Event::error(e.to_string(), gate.signature()));
                    }
                }
            }
            None => {
                self.log.record(&event.event_type, None, self.id, self.parent_id, &event.data);
                self.pending.push(event);
            }
        }
    }

    /// Drain and return every pending event, in emission order.
    pub fn drain_pending(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    /// Borrow the pending queue without draining it.
    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    /// A shallow copy of pending + counters; mutating it never affects this
    /// stream (§4.E `sampleHere`).
    pub fn sample_here(&self) -> Sample {
        Sample {
            pending: self.pending.clone(),
            event_count: self.event_count,
            gate_count: self.gate_count,
        }
    }

    /// Access the shared structured log.
    pub fn log(&self) -> &Log {
        &self.log
    }

    /// Access the shared registry (for composing a runner on top).
    pub fn registry(&self) -> Rc<Registry> {
        Rc::clone(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogVerbosity;
    use gatedb_types::Value;

    struct Echo;
    impl PureGate for Echo {
        fn signature(&self) -> &str {
            "echo"
        }
        fn transform(&self, event: &Event) -> anyhow::Result<Option<Event>> {
            Ok(Some(Event::new("echoed", event.data.clone())))
        }
    }

    struct Bad;
    impl PureGate for Bad {
        fn signature(&self) -> &str {
            "bad"
        }
        fn transform(&self, _event: &Event) -> anyhow::Result<Option<Event>> {
            anyhow::bail!("boom")
        }
    }

    #[test]
    fn unclaimed_events_land_in_pending() {
        let mut stream = Stream::new(Log::new(LogVerbosity::Off));
        stream.emit(Event::new("unclaimed", Value::Null));
        let pending = stream.drain_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, "unclaimed");
    }

    #[test]
    fn depth_first_follow_up_is_processed_before_return() {
        let mut stream = Stream::new(Log::new(LogVerbosity::Off));
        stream.register(Rc::new(Echo)).unwrap();
        stream.emit(Event::new("echo", Value::Int(7)));
        let pending = stream.drain_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, "echoed");
        assert_eq!(pending[0].data, Value::Int(7));
    }

    #[test]
    fn gate_error_is_localized() {
        let mut stream = Stream::new(Log::new(LogVerbosity::Off));
        stream.register(Rc::new(Bad)).unwrap();
        stream.emit(Event::new("bad", Value::Null));
        stream.emit(Event::new("unclaimed", Value::Null));
        let pending = stream.drain_pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].event_type, "error");
        let source = pending[0].data.as_map().unwrap().get("source").unwrap();
        assert_eq!(source, &Value::String("bad".to_string()));
        assert_eq!(pending[1].event_type, "unclaimed");
    }

    #[test]
    fn duplicate_signature_rejected() {
        let stream = Stream::new(Log::new(LogVerbosity::Off));
        stream.register(Rc::new(Echo)).unwrap();
        let err = stream.register(Rc::new(Echo)).unwrap_err();
        assert!(matches!(err, BusError::SignatureCollision(_)));
    }

    #[test]
    fn child_stream_has_independent_pending_but_shared_log() {
        let root = Stream::new(Log::new(LogVerbosity::Events));
        let mut child = root.child();
        child.emit(Event::new("x", Value::Null));
        assert_eq!(root.pending().len(), 0);
        assert_eq!(child.pending().len(), 1);
        assert_eq!(child.log().entries().len(), 1);
    }
}
