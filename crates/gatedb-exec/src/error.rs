//! Errors raised while compiling or executing DDL/DML/queries (§7).

/// Errors specific to the DDL/DML gates and the SELECT executor. These
/// surface to a `StateGate::transform` caller as `anyhow::Error` (the
/// Runner turns any `Err` into an `error` event per §4.E) or to
/// `gatedb-engine` directly from the executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// `CREATE TABLE` without `IF NOT EXISTS` on an existing table.
    #[error("table already exists: {0}")]
    TableExists(String),
    /// Any gate that needs a table's schema and didn't find one.
    #[error("no such table: {0}")]
    TableNotFound(String),
    /// `INSERT`/`UPDATE` referencing a column the schema doesn't have.
    #[error("no such column: {table}.{column}")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// A `NOT NULL` column was left null by an insert/update.
    #[error("NOT NULL constraint failed: {table}.{column}")]
    NotNullViolation {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// A `UNIQUE` index rejected a duplicate value.
    #[error("UNIQUE constraint failed: {index} = {value}")]
    UniqueViolation {
        /// Index name.
        index: String,
        /// The colliding value's display form.
        value: String,
    },
    /// `CREATE INDEX` on a name already taken.
    #[error("index already exists: {0}")]
    IndexExists(String),
    /// `DROP INDEX` / `index_scan` on a name that isn't registered.
    #[error("no such index: {0}")]
    IndexNotFound(String),
    /// `CREATE VIEW` on a name already taken.
    #[error("view already exists: {0}")]
    ViewExists(String),
    /// `DROP VIEW` on a name that isn't registered.
    #[error("no such view: {0}")]
    ViewNotFound(String),
    /// `CREATE TRIGGER` on a name already taken.
    #[error("trigger already exists: {0}")]
    TriggerExists(String),
    /// `DROP TRIGGER` on a name that isn't registered.
    #[error("no such trigger: {0}")]
    TriggerNotFound(String),
    /// `ALTER TABLE ADD CONSTRAINT` on a name already taken.
    #[error("constraint already exists: {0}")]
    ConstraintExists(String),
    /// `ALTER TABLE DROP CONSTRAINT` on a name that isn't registered.
    #[error("no such constraint: {0}")]
    ConstraintNotFound(String),
    /// A recursive CTE ran past the iteration cap (§4.O).
    #[error("recursive CTE exceeded {0} iterations")]
    RecursionLimitExceeded(usize),
    /// Propagated schema/row (de)serialization failure.
    #[error(transparent)]
    Codec(#[from] serde_json::Error),
    /// Propagated from the Runner's read/mutate machinery.
    #[error(transparent)]
    Runner(#[from] gatedb_runner::RunnerError),
}
