#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gatedb-types** – Shared primitive data structures for gatedb.
//!
//! This crate is dependency-light and sits at the bottom of the crate graph
//! so every other crate can depend on it without creating cycles (the same
//! role `toka-types` plays for Toka). It makes no assumptions about I/O,
//! hashing, or event routing — those live in `gatedb-store-core` and
//! `gatedb-bus` respectively.

mod schema;
mod value;

pub use schema::{Column, ColumnType, Row, Schema};
pub use value::{compare_values, format_real, Value};

/// Errors shared across the type layer (malformed literals, schema
/// mismatches discovered while building a `Value`/`Row`).
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// A column referenced by name does not exist in a schema.
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    /// A value could not be coerced to the column's declared type.
    #[error("cannot coerce {value} to {target}")]
    Coercion {
        /// The offending value, rendered for the message.
        value: String,
        /// The target type name.
        target: String,
    },
}
