//! `StateGate`: the other half of the Read/Mutate Protocol (§4.F), for
//! gates that need durable state rather than just transforming an event
//! in isolation.

use gatedb_bus::Event;

use crate::mutation::MutationBatch;
use crate::read_set::{ReadSet, ResolvedState};

/// A gate whose `transform` needs resolved durable state and whose result
/// is a set of mutations rather than a single follow-up event.
pub trait StateGate {
    /// The event type this gate claims.
    fn signature(&self) -> &str;

    /// Declare what state this gate needs before it can run, given the
    /// triggering event.
    fn reads(&self, event: &Event) -> ReadSet;

    /// Produce the mutations (and follow-up events) this gate's logic
    /// implies, given the resolved state declared by `reads`.
    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch>;
}
