//! Table schema, column, and row types (§3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A row is a mapping from column name to value (§3 "Row").
pub type Row = BTreeMap<String, Value>;

/// The closed set of column types gatedb understands (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Whole numbers, stored as `i64`.
    Integer,
    /// Floating point numbers.
    Real,
    /// Variable-length text.
    Text,
    /// `TRUE`/`FALSE`.
    Boolean,
    /// Opaque byte content, represented as base64-ish text for now (no
    /// binary literal syntax is in the SQL subset of §6.A).
    Blob,
    /// `YYYY-MM-DD` text.
    Date,
    /// `YYYY-MM-DD HH:MM:SS` text.
    Timestamp,
}

impl ColumnType {
    /// Parse a SQL type name, defaulting unknown names to `TEXT` (§6.B).
    pub fn parse(name: &str) -> ColumnType {
        match name.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" => ColumnType::Integer,
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" | "DECIMAL" => ColumnType::Real,
            "BOOLEAN" | "BOOL" => ColumnType::Boolean,
            "BLOB" | "BYTES" => ColumnType::Blob,
            "DATE" => ColumnType::Date,
            "TIMESTAMP" | "DATETIME" => ColumnType::Timestamp,
            _ => ColumnType::Text,
        }
    }

    /// The name this type serializes as, round-tripping through `parse`.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Blob => "blob",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
        }
    }
}

/// A single column definition (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub col_type: ColumnType,
    /// Whether `NULL` is permitted. Defaults to `true`.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Literal default value used when an insert omits this column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// The synthetic `id` column every table carries at ordinal 0.
    pub fn id_column() -> Column {
        Column {
            name: "id".to_string(),
            col_type: ColumnType::Integer,
            nullable: false,
            default: None,
        }
    }
}

/// A table schema (§3). Stored under `db/tables/<T>/schema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Table name.
    pub name: String,
    /// Ordered column list, including the synthetic `id` column at index 0.
    pub columns: Vec<Column>,
}

impl Schema {
    /// Build a schema from user-declared columns, prepending the synthetic
    /// `id` column the executor always adds (§3).
    pub fn new(name: impl Into<String>, user_columns: Vec<Column>) -> Schema {
        let mut columns = vec![Column::id_column()];
        columns.extend(user_columns);
        Schema { name: name.into(), columns }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Index of a column by name, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }
}
