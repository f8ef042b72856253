#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! **gatedb-cli** – The external REPL/one-shot front end for gatedb
//! (§1 "out of scope (external collaborators): the REPL/CLI front end").
//!
//! Grounded on `toka-cli`'s split between a `clap`-derived `Cli` exposed
//! from the library (so integration tests can drive it without spawning a
//! subprocess) and a thin `main.rs` that parses `std::env::args` and
//! installs the `tracing-subscriber` layer. Unlike `toka-cli`, there is no
//! `#[tokio::main]` here: gatedb's execution model is single-threaded and
//! synchronous end to end (§5), so the CLI is plain, blocking `std::io`.
//!
//! The CLI contains no core logic of its own: every line it reads becomes
//! one `gatedb_engine::Engine::execute_sql` call, and every event that
//! call returns is rendered and printed. It does not interpret `query_plan`
//! or `*_execute` events itself — those never reach it, since the engine
//! only hands back the terminal events of §6.C.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use gatedb_bus::Event;
use gatedb_engine::{Engine, EngineConfig, StorageConfig};
use gatedb_types::{Row, Value};

/// `gatedb [--data <dir>] [-e "<sql>"] [--log-level LEVEL]` (§6.D).
#[derive(Parser, Debug)]
#[command(name = "gatedb", version, about = "gatedb — an event-routed relational database engine", author = "gatedb contributors")]
pub struct Args {
    /// Persist state under this directory via the file backend. Without
    /// it, state is in-memory and lost at exit.
    #[arg(long, value_name = "DIR")]
    pub data: Option<PathBuf>,

    /// Run a single statement (or `;`-separated sequence) and exit,
    /// instead of starting the REPL.
    #[arg(short = 'e', long = "execute", value_name = "SQL")]
    pub execute: Option<String>,

    /// `tracing` diagnostic verbosity: `error`, `warn`, `info`, `debug`,
    /// `trace`. Distinct from the engine's own structured gate-dispatch
    /// log (§6.C), which this CLI does not currently expose a flag for.
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    pub log_level: String,
}

/// Build an [`Engine`] for the storage selection `args` describes.
pub fn open_engine(args: &Args) -> anyhow::Result<Engine> {
    let storage = match &args.data {
        Some(dir) => StorageConfig::File { base: dir.clone() },
        None => StorageConfig::Memory,
    };
    Ok(Engine::open(EngineConfig { storage, ..EngineConfig::default() })?)
}

/// Run `args`: either a single `-e` statement or an interactive REPL that
/// reads semicolon-terminated statements from `input` until EOF, writing
/// rendered results to `output`.
pub fn run<R: BufRead, W: Write>(args: Args, mut input: R, mut output: W) -> anyhow::Result<()> {
    let mut engine = open_engine(&args)?;

    if let Some(sql) = &args.execute {
        for event in engine.execute_sql(sql) {
            writeln!(output, "{}", render_event(&event))?;
        }
        return Ok(());
    }

    writeln!(output, "gatedb — enter ';'-terminated statements, Ctrl-D to exit.")?;
    let mut buffer = String::new();
    loop {
        write!(output, "gatedb> ")?;
        output.flush()?;
        let mut line = String::new();
        let bytes_read = input.read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }
        buffer.push_str(&line);
        if !statement_ready(&buffer) {
            continue;
        }
        for event in engine.execute_sql(&buffer) {
            writeln!(output, "{}", render_event(&event))?;
        }
        buffer.clear();
    }
    Ok(())
}

/// Whether `buffer` looks like it ends a statement — a trailing `;` after
/// trimming whitespace. The real split/parse (which correctly ignores a
/// `;` inside a string literal) happens inside `Engine::execute_sql`; this
/// is just the REPL's cue to stop reading more lines.
fn statement_ready(buffer: &str) -> bool {
    buffer.trim_end().ends_with(';')
}

/// Render one result/error event as a human-readable line (or small
/// table, for `query_result`). This is presentation only — it never
/// inspects an event's meaning beyond §6.C's stable names.
pub fn render_event(event: &Event) -> String {
    match event.event_type.as_str() {
        "query_result" => render_query_result(&event.data),
        "error" => render_error(&event.data),
        _ => format!("{}: {}", event.event_type, event.data),
    }
}

fn render_error(data: &Value) -> String {
    let map = data.as_map();
    let message = map.and_then(|m| m.get("message")).map(|v| v.to_string()).unwrap_or_else(|| data.to_string());
    let source = map.and_then(|m| m.get("source")).map(|v| v.to_string());
    match source {
        Some(source) => format!("error: {message} (from {source})"),
        None => format!("error: {message}"),
    }
}

fn render_query_result(data: &Value) -> String {
    let rows: Vec<Row> = match data.as_map().and_then(|m| m.get("rows")) {
        Some(Value::Seq(items)) => items.iter().filter_map(|v| v.as_map().cloned()).collect(),
        _ => Vec::new(),
    };
    if rows.is_empty() {
        return "(0 rows)".to_string();
    }
    let mut columns: Vec<String> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    let mut lines = vec![columns.join(" | ")];
    for row in &rows {
        let cells: Vec<String> = columns.iter().map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_default()).collect();
        lines.push(cells.join(" | "));
    }
    lines.push(format!("({} row{})", rows.len(), if rows.len() == 1 { "" } else { "s" }));
    lines.join("\n")
}

/// stdin/stdout entry point `main.rs` calls after installing the tracing
/// subscriber.
pub fn main_with_args(args: Args) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    run(args, stdin.lock(), stdout.lock())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_sql(sql: &str) -> String {
        let args = Args { data: None, execute: Some(sql.to_string()), log_level: "warn".to_string() };
        let mut out = Vec::new();
        run(args, io::empty(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn create_insert_select_renders_a_table() {
        let output = run_sql("CREATE TABLE t (name TEXT); INSERT INTO t (name) VALUES ('Alice'); SELECT * FROM t;");
        assert!(output.contains("table_created"));
        assert!(output.contains("row_inserted"));
        assert!(output.contains("Alice"));
        assert!(output.contains("(1 row)"));
    }

    #[test]
    fn parse_error_renders_as_error_line() {
        let output = run_sql("SELEKT 1;");
        assert!(output.starts_with("error:"));
        assert!(output.contains("from parser"));
    }

    #[test]
    fn empty_result_set_renders_zero_rows() {
        let output = run_sql("CREATE TABLE t (x INTEGER); SELECT * FROM t;");
        assert!(output.contains("(0 rows)"));
    }
}
