//! SQL front-end errors (§7 `ParseError`).

/// Errors raised while tokenizing or parsing SQL text.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// A character doesn't start any valid token.
    #[error("unexpected character: {0:?}")]
    UnexpectedChar(char),
    /// A quoted string or identifier was never closed.
    #[error("unterminated string or quoted identifier")]
    UnterminatedString,
    /// The statement's first keyword isn't one gatedb parses (§6.A).
    #[error("unknown statement keyword: {0}")]
    UnknownStatement(String),
    /// A token appeared where the grammar didn't expect one.
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    /// The token stream ended mid-statement.
    #[error("unexpected end of input, expected {0}")]
    UnexpectedEof(String),
    /// A type name, function name, or other closed-vocabulary word was
    /// not recognized in a position requiring one.
    #[error("unknown {what}: {name}")]
    UnknownName {
        /// What kind of name was expected (e.g. "function").
        what: &'static str,
        /// The offending name.
        name: String,
    },
}
