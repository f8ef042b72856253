//! The event envelope every gate consumes and produces (§3, §6.C).

use gatedb_types::Value;

/// A named event carrying a structured payload. `sql`, `query_result`,
/// `row_inserted`, `error`, and every other name in §6.C's taxonomy are all
/// instances of this one type — the taxonomy is convention, not a type
/// hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The event's type name; this is what the router matches a gate's
    /// `signature()` against.
    pub event_type: String,
    /// The event's payload.
    pub data: Value,
}

impl Event {
    /// Build a new event.
    pub fn new(event_type: impl Into<String>, data: Value) -> Event {
        Event { event_type: event_type.into(), data }
    }

    /// Build an `error` event with `{message, source}` (§4.E failure clause).
    pub fn error(message: impl Into<String>, source: impl Into<String>) -> Event {
        Event::new(
            "error",
            Value::map([
                ("message".to_string(), Value::String(message.into())),
                ("source".to_string(), Value::String(source.into())),
            ]),
        )
    }
}
