#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **gatedb-exec** – The DDL/DML `StateGate`s and the `SELECT`/`EXPLAIN`
//! executor that turns a compiled [`gatedb_sql::Statement`] into Runner
//! reads, mutations, and `query_result`/error events.
//!
//! Every DDL/DML statement maps onto a `*_execute` event that a
//! `StateGate` below claims; `register(&mut runner)` wires all of them
//! into a fresh Runner in one call. `Select`, `Explain`, `CreateTableAs`,
//! and `InsertSelect` don't round-trip through the gate dispatch loop at
//! all — `executor::execute` runs their compiled `Plan` directly against
//! `Runner::read`, threading rows through `pipeline`'s transforms, and
//! hands the result back as an ordinary event via `Runner::emit` so it
//! still lands in the pending queue like everything else.

pub mod catalog;
pub mod codec;
pub mod ddl;
pub mod dml;
pub mod error;
pub mod executor;
pub mod index;
pub mod paths;
pub mod pipeline;
pub mod support;

pub use error::ExecError;
pub use executor::execute;

use std::rc::Rc;

use gatedb_runner::Runner;

/// Register every DDL/DML/index/catalog `StateGate` this crate defines
/// onto `runner`. Called once by `gatedb-engine::Engine::open`.
pub fn register(runner: &mut Runner) -> Result<(), gatedb_runner::RunnerError> {
    runner.register_state(Rc::new(ddl::CreateTableGate))?;
    runner.register_state(Rc::new(ddl::DropTableGate))?;
    runner.register_state(Rc::new(ddl::AddColumnGate))?;
    runner.register_state(Rc::new(ddl::DropColumnGate))?;
    runner.register_state(Rc::new(ddl::RenameTableGate))?;
    runner.register_state(Rc::new(ddl::TruncateGate))?;
    runner.register_state(Rc::new(dml::InsertGate))?;
    runner.register_state(Rc::new(dml::UpdateGate))?;
    runner.register_state(Rc::new(dml::DeleteGate))?;
    runner.register_state(Rc::new(index::CreateIndexGate))?;
    runner.register_state(Rc::new(index::DropIndexGate))?;
    runner.register_state(Rc::new(catalog::CreateViewGate))?;
    runner.register_state(Rc::new(catalog::DropViewGate))?;
    runner.register_state(Rc::new(catalog::CreateTriggerGate))?;
    runner.register_state(Rc::new(catalog::DropTriggerGate))?;
    runner.register_state(Rc::new(catalog::CreateConstraintGate))?;
    runner.register_state(Rc::new(catalog::DropConstraintGate))?;
    Ok(())
}
