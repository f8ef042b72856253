//! Error types for the routing core (§7).

/// Errors the router itself can raise (as opposed to errors a gate's own
/// `transform` raises, which are captured into `error` events — §4.E).
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Two gates were registered under the same signature.
    #[error("signature collision: {0}")]
    SignatureCollision(String),
}
