//! The structured gate-dispatch log (§4.E, §6.C). This is a first-class,
//! queryable part of the engine's data model — distinct from the `tracing`
//! diagnostics emitted alongside it for operators.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use gatedb_types::Value;

/// How much detail the structured log records per emit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogVerbosity {
    /// Nothing is recorded.
    #[default]
    Off,
    /// Event type and the gate that claimed it (if any).
    Events,
    /// `Events` plus stream id and parent stream id.
    Deep,
    /// `Deep` plus the event's data payload.
    Data,
}

/// One structured log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Monotonic sequence number, unique within a log.
    pub seq: u64,
    /// Wall-clock time the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// The event type that was emitted.
    pub event_type: String,
    /// The signature of the gate that claimed the event, if any.
    pub claimed_by: Option<String>,
    /// The id of the stream the emit happened on (only set at `Deep`+).
    pub stream_id: Option<u64>,
    /// The id of that stream's parent, if it is a child stream.
    pub parent_stream_id: Option<u64>,
    /// The event's payload (only set at `Data`).
    pub data: Option<Value>,
}

/// Shared, append-only log. Child streams hold a clone of the same `Rc`, so
/// every stream derived from one root observes the same sequence of
/// entries — single-threaded, hence `Rc<RefCell<..>>` rather than `Arc`.
#[derive(Debug, Clone)]
pub struct Log {
    inner: Rc<RefCell<LogInner>>,
}

#[derive(Debug)]
struct LogInner {
    verbosity: LogVerbosity,
    entries: Vec<LogEntry>,
    next_seq: u64,
}

impl Log {
    /// Create a new log at the given verbosity.
    pub fn new(verbosity: LogVerbosity) -> Log {
        Log {
            inner: Rc::new(RefCell::new(LogInner { verbosity, entries: Vec::new(), next_seq: 0 })),
        }
    }

    /// Record one dispatch. Cheap no-op at `Off`.
    pub fn record(
        &self,
        event_type: &str,
        claimed_by: Option<&str>,
        stream_id: u64,
        parent_stream_id: Option<u64>,
        data: &Value,
    ) {
        let mut inner = self.inner.borrow_mut();
        if inner.verbosity == LogVerbosity::Off {
            return;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let (stream_id, parent_stream_id) = if inner.verbosity >= LogVerbosity::Deep {
            (Some(stream_id), parent_stream_id)
        } else {
            (None, None)
        };
        let data = if inner.verbosity >= LogVerbosity::Data { Some(data.clone()) } else { None };
        inner.entries.push(LogEntry {
            seq,
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            claimed_by: claimed_by.map(|s| s.to_string()),
            stream_id,
            parent_stream_id,
            data,
        });
    }

    /// A snapshot of every entry recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.borrow().entries.clone()
    }

    /// Current verbosity.
    pub fn verbosity(&self) -> LogVerbosity {
        self.inner.borrow().verbosity
    }

    /// Change verbosity for subsequent records.
    pub fn set_verbosity(&self, verbosity: LogVerbosity) {
        self.inner.borrow_mut().verbosity = verbosity;
    }
}
