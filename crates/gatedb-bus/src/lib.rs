#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gatedb-bus** – Single-threaded, depth-first event/gate routing core.
//!
//! Every operation in gatedb — parse, plan step, DML, DDL, transaction
//! control — is a named [`Event`] that a registered [`PureGate`] claims,
//! transforms, and possibly follow-up-emits. This crate provides the
//! signature registry, the depth-first dispatcher, the pending queue, child
//! streams, and the structured dispatch log (§4.E).
//!
//! It deliberately knows nothing about durable state: a gate here can only
//! look at the event it was given and produce another event. The
//! read/mutate protocol layered on top of this (`ReadSet`/`MutationBatch`/
//! `StateGate`) lives in `gatedb-runner`, which embeds a [`Stream`] for its
//! pure-gate dispatch and extends it to resolve state and apply mutations.

mod error;
mod event;
mod log;
mod stream;

pub use error::BusError;
pub use event::Event;
pub use log::{Log, LogEntry, LogVerbosity};
pub use stream::{PureGate, Registry, Sample, Stream};
