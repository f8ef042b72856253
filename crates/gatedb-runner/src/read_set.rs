//! `ReadSet`: a `StateGate`'s declaration of what state it needs before it
//! can run, and `ResolvedState`: what the Runner hands back once it has
//! fetched that state (§4.F, §4.G.2).

use std::collections::HashMap;

use gatedb_types::Value;

/// Chainable builder a `StateGate::reads` implementation returns. Declares
/// refs and ref-prefix patterns without touching storage; the Runner
/// resolves it.
#[derive(Debug, Clone, Default)]
pub struct ReadSet {
    refs: Vec<String>,
    patterns: Vec<String>,
}

impl ReadSet {
    /// An empty read set — a gate that needs no state before running.
    pub fn new() -> ReadSet {
        ReadSet::default()
    }

    /// Declare a specific ref this gate needs resolved.
    pub fn reference(mut self, name: impl Into<String>) -> ReadSet {
        self.refs.push(name.into());
        self
    }

    /// Declare a ref-name prefix this gate needs listed and resolved.
    pub fn pattern(mut self, prefix: impl Into<String>) -> ReadSet {
        self.patterns.push(prefix.into());
        self
    }

    /// The declared ref names, in declaration order.
    pub fn refs(&self) -> &[String] {
        &self.refs
    }

    /// The declared prefixes, in declaration order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// The state a `StateGate::transform` is handed: every declared ref's
/// current value (or `None` if unset), and every declared pattern's
/// matching names and values.
#[derive(Debug, Clone, Default)]
pub struct ResolvedState {
    /// `ref(name)` resolutions.
    pub refs: HashMap<String, Option<Value>>,
    /// `pattern(prefix)` resolutions: prefix → (ref name → value).
    pub patterns: HashMap<String, HashMap<String, Value>>,
}

impl ResolvedState {
    /// The resolved value for a declared ref, if it existed.
    pub fn get_ref(&self, name: &str) -> Option<&Value> {
        self.refs.get(name).and_then(|v| v.as_ref())
    }

    /// The resolved name→value map for a declared pattern prefix.
    pub fn get_pattern(&self, prefix: &str) -> Option<&HashMap<String, Value>> {
        self.patterns.get(prefix)
    }
}
