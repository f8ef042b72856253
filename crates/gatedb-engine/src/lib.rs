#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gatedb-engine** – The ambient facade that wires the content store,
//! ref map, WAL, event router, runner, and SQL front end/executor into a
//! single `Engine` a caller can open and feed SQL text to.
//!
//! Grounded on `toka-runtime::{Runtime, RuntimeConfig, StorageConfig}`:
//! a configuration struct selects the storage backend, the facade's
//! constructor performs whatever startup recovery the storage layer needs
//! (there, replaying persisted events into the kernel's `WorldState`; here,
//! the WAL crash-recovery check of §4.D.4), and the facade exposes one
//! narrow entry point rather than the individual subsystems. `gatedb-cli`
//! is the only intended caller outside of tests.

use std::path::PathBuf;

use gatedb_bus::{Event, Log, LogVerbosity};
use gatedb_runner::{Runner, RunnerError};
use gatedb_sql::ParseError;
use gatedb_store_core::StoreError;
use gatedb_store_file::{FileRefs, FileStore, FileWal};
use gatedb_store_memory::{MemoryRefs, MemoryStore, MemoryWal};
use tracing::{debug, info};

/// Which content store / ref map / WAL backend an [`Engine`] uses.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Non-persistent, in-memory backends. State is lost when the
    /// `Engine` is dropped.
    Memory,
    /// Filesystem-backed backends rooted at `base` (§6.F layout).
    /// State persists across process restarts; `Engine::open` replays any
    /// WAL batch left mid-flight by a prior crash before returning.
    File {
        /// The base directory (`<base>/store`, `<base>/refs`,
        /// `<base>/wal`).
        base: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> StorageConfig {
        StorageConfig::Memory
    }
}

/// Configuration an [`Engine`] is opened with.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Storage backend selection.
    pub storage: StorageConfig,
    /// Structured gate-dispatch log verbosity (§4.E, §6.C). Distinct from
    /// the `tracing` diagnostics every crate also emits.
    pub log_verbosity: LogVerbosity,
}

/// Errors raised while opening an [`Engine`] or running a statement
/// outside the normal `error` event path (i.e. before there is a Runner
/// to emit into).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The requested base directory could not be prepared.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Failed during WAL recovery / gate registration on open.
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// A fully wired gatedb instance: storage backends, the depth-first
/// Runner, and every DDL/DML/index/catalog `StateGate` registered.
pub struct Engine {
    runner: Runner,
}

impl Engine {
    /// Open an engine with the given configuration. Performs the WAL
    /// crash-recovery check (§4.D.4) against the chosen backend before
    /// returning, then registers every gate `gatedb-exec` defines.
    pub fn open(config: EngineConfig) -> Result<Engine, EngineError> {
        info!(?config.storage, "opening gatedb engine");
        let log = Log::new(config.log_verbosity);
        let mut runner = match config.storage {
            StorageConfig::Memory => {
                Runner::open(Box::new(MemoryStore::new()), Box::new(MemoryRefs::new()), Box::new(MemoryWal::new()), log)?
            }
            StorageConfig::File { base } => {
                let store = FileStore::open(&base)?;
                let refs = FileRefs::open(&base)?;
                let wal = FileWal::open(&base)?;
                Runner::open(Box::new(store), Box::new(refs), Box::new(wal), log)?
            }
        };
        gatedb_exec::register(&mut runner)?;
        Ok(Engine { runner })
    }

    /// An in-memory engine with no gate-dispatch logging — the common
    /// case for tests and `-e`-style one-shot invocations.
    pub fn in_memory() -> Engine {
        Engine::open(EngineConfig::default()).expect("in-memory engine never fails to open")
    }

    /// Run one or more `;`-separated SQL statements against this engine
    /// and return every event they produced, in emission order (§6
    /// control-flow: "terminal events accumulate in the pending queue for
    /// the caller to drain"). Tokenizing and parsing happen as plain
    /// function calls rather than a round trip through a `sql` event and
    /// dispatcher gate — the same "steps as calls, not envelopes" choice
    /// `gatedb_exec::pipeline` makes for row transforms — since nothing
    /// else in the engine ever needs to claim raw SQL text as an event.
    /// A statement that fails to parse emits a single `error` event
    /// (source `"parser"`) and does not abort the remaining statements in
    /// `sql`.
    pub fn execute_sql(&mut self, sql: &str) -> Vec<Event> {
        for stmt_text in gatedb_sql::split_statements(sql) {
            debug!(statement = %stmt_text, "executing statement");
            match gatedb_sql::parse_statement(&stmt_text) {
                Ok(statement) => gatedb_exec::execute(&mut self.runner, statement),
                Err(err) => {
                    let _ = self.runner.emit(Event::error(parse_error_message(&err), "parser"));
                }
            }
        }
        self.runner.drain_pending()
    }

    /// Whether a `BEGIN` transaction is currently open (§4.H).
    pub fn in_transaction(&self) -> bool {
        self.runner.in_transaction()
    }

    /// Direct access to the underlying Runner, for callers (tests, the
    /// CLI's structured-log inspection) that need the lower-level
    /// surface rather than the statement-oriented `execute_sql`.
    pub fn runner(&mut self) -> &mut Runner {
        &mut self.runner
    }

    /// The structured gate-dispatch log shared by every gate registered
    /// on this engine (§6.C).
    pub fn log(&self) -> &Log {
        self.runner.log()
    }
}

fn parse_error_message(err: &ParseError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_insert_select_round_trip() {
        let mut engine = Engine::in_memory();
        let events = engine.execute_sql(
            "CREATE TABLE users (name TEXT); \
             INSERT INTO users (name) VALUES ('Alice'); \
             SELECT * FROM users;",
        );
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["table_created", "row_inserted", "query_result"]);
    }

    #[test]
    fn parse_error_does_not_abort_remaining_statements() {
        let mut engine = Engine::in_memory();
        let events = engine.execute_sql("CREATE TABLE t (x INTEGER); SELEKT bogus; SELECT 1;");
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["table_created", "error", "query_result"]);
    }

    #[test]
    fn file_backend_recovers_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut engine = Engine::open(EngineConfig {
                storage: StorageConfig::File { base: dir.path().to_path_buf() },
                log_verbosity: LogVerbosity::Off,
            })
            .unwrap();
            engine.execute_sql("CREATE TABLE t (x INTEGER); INSERT INTO t (x) VALUES (42);");
        }
        let mut engine = Engine::open(EngineConfig {
            storage: StorageConfig::File { base: dir.path().to_path_buf() },
            log_verbosity: LogVerbosity::Off,
        })
        .unwrap();
        let events = engine.execute_sql("SELECT * FROM t;");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "query_result");
    }

    #[test]
    fn transaction_rollback_reverts_drop_table() {
        let mut engine = Engine::in_memory();
        engine.execute_sql("CREATE TABLE t (x INTEGER); INSERT INTO t (x) VALUES (42);");
        engine.execute_sql("BEGIN; DROP TABLE t; ROLLBACK;");
        assert!(!engine.in_transaction());
        let events = engine.execute_sql("SELECT * FROM t;");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "query_result");
    }

    fn result_rows(events: &[Event]) -> Vec<gatedb_types::Row> {
        let last = events.last().expect("at least one event");
        assert_eq!(last.event_type, "query_result");
        match last.data.as_map().and_then(|m| m.get("rows")) {
            Some(gatedb_types::Value::Seq(rows)) => {
                rows.iter().map(|r| r.as_map().cloned().unwrap_or_default()).collect()
            }
            _ => Vec::new(),
        }
    }

    fn as_int(v: &gatedb_types::Value) -> Option<i64> {
        match v {
            gatedb_types::Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// §8 scenario 2: snapshot then rollback two inserts.
    #[test]
    fn runner_snapshot_restore_reverts_later_inserts() {
        let mut engine = Engine::in_memory();
        engine.execute_sql("CREATE TABLE users (name TEXT); INSERT INTO users (name) VALUES ('Alice');");
        let snap = engine.runner().snapshot().unwrap();
        engine.execute_sql("INSERT INTO users (name) VALUES ('Bob'); INSERT INTO users (name) VALUES ('Carol');");
        let rows = result_rows(&engine.execute_sql("SELECT * FROM users;"));
        assert_eq!(rows.len(), 3);

        engine.runner().restore(&snap).unwrap();
        let rows = result_rows(&engine.execute_sql("SELECT * FROM users ORDER BY id;"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name").and_then(|v| v.as_string()), Some("Alice".to_string()));
    }

    /// §8 scenario 3: multi-row INSERT with column defaults assigns
    /// sequential ids.
    #[test]
    fn multi_row_insert_with_defaults_assigns_sequential_ids() {
        let mut engine = Engine::in_memory();
        engine.execute_sql(
            "CREATE TABLE t (status TEXT DEFAULT 'active', value INTEGER); \
             INSERT INTO t (value) VALUES (1), (2);",
        );
        let rows = result_rows(&engine.execute_sql("SELECT * FROM t ORDER BY id;"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id").and_then(as_int), Some(1));
        assert_eq!(rows[0].get("status").and_then(|v| v.as_string()), Some("active".to_string()));
        assert_eq!(rows[0].get("value").and_then(as_int), Some(1));
        assert_eq!(rows[1].get("id").and_then(as_int), Some(2));
        assert_eq!(rows[1].get("value").and_then(as_int), Some(2));
    }

    /// §8 scenario 5: recursive CTE counting up to a bound.
    #[test]
    fn recursive_cte_counts_up_to_bound() {
        let mut engine = Engine::in_memory();
        let events = engine.execute_sql(
            "WITH RECURSIVE cnt(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM cnt WHERE x < 5) \
             SELECT x FROM cnt;",
        );
        let rows = result_rows(&events);
        let xs: Vec<i64> = rows.iter().filter_map(|r| r.get("x").and_then(as_int)).collect();
        assert_eq!(xs, vec![1, 2, 3, 4, 5]);
    }

    /// §8 P10: two tables, two inserts A then B — ids are per-table
    /// monotonic and independent of each other.
    #[test]
    fn two_tables_have_independent_monotonic_counters() {
        let mut engine = Engine::in_memory();
        engine.execute_sql(
            "CREATE TABLE a (v INTEGER); CREATE TABLE b (v INTEGER); \
             INSERT INTO a (v) VALUES (1); INSERT INTO b (v) VALUES (1); INSERT INTO a (v) VALUES (2);",
        );
        let a_rows = result_rows(&engine.execute_sql("SELECT * FROM a ORDER BY id;"));
        let b_rows = result_rows(&engine.execute_sql("SELECT * FROM b ORDER BY id;"));
        assert_eq!(a_rows.iter().filter_map(|r| r.get("id").and_then(as_int)).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(b_rows.iter().filter_map(|r| r.get("id").and_then(as_int)).collect::<Vec<_>>(), vec![1]);
    }

    /// Window function / join / aggregate pipeline end to end through SQL,
    /// beyond the unit-level coverage in `gatedb_exec::pipeline`.
    #[test]
    fn group_by_aggregate_end_to_end() {
        let mut engine = Engine::in_memory();
        engine.execute_sql(
            "CREATE TABLE orders (customer TEXT, amount INTEGER); \
             INSERT INTO orders (customer, amount) VALUES ('a', 10), ('a', 5), ('b', 7);",
        );
        let rows = result_rows(&engine.execute_sql(
            "SELECT customer, SUM(amount) AS total FROM orders GROUP BY customer ORDER BY customer;",
        ));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("customer").and_then(|v| v.as_string()), Some("a".to_string()));
        assert_eq!(rows[0].get("total").and_then(as_int), Some(15));
        assert_eq!(rows[1].get("customer").and_then(|v| v.as_string()), Some("b".to_string()));
        assert_eq!(rows[1].get("total").and_then(as_int), Some(7));
    }
}
