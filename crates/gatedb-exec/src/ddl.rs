//! Table/DDL `StateGate`s (§4.K): `create_table_execute`,
//! `drop_table_execute`, `alter_table_add_column_execute`,
//! `alter_table_drop_column_execute`, `alter_table_rename_execute`,
//! `truncate_execute`.
//!
//! Grounded on `toka-runtime`'s world-state gates, which read a small
//! declared slice of storage, decide, and stage a `MutationBatch` rather
//! than touching the store directly — the same read/mutate split this
//! crate inherits from `gatedb-runner::StateGate`.

use gatedb_bus::Event;
use gatedb_runner::{MutationBatch, ReadSet, ResolvedState, StateGate};
use gatedb_types::{Column, Schema, Value};

use crate::codec;
use crate::error::ExecError;
use crate::paths;
use crate::support::{bool_field, opt_str_field, str_field};

fn load_schema(state: &ResolvedState, table: &str) -> Option<Schema> {
    state.get_ref(&paths::schema(table)).and_then(|v| codec::from_value(v).ok())
}

/// `CREATE TABLE <table> (<columns>)` / `CREATE TABLE IF NOT EXISTS ...`.
pub struct CreateTableGate;

impl StateGate for CreateTableGate {
    fn signature(&self) -> &str {
        "create_table_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        ReadSet::new().reference(paths::schema(&table))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let if_not_exists = bool_field(&event.data, "if_not_exists");
        let columns: Vec<Column> = codec::from_value(crate::support::raw_field(&event.data, "columns"))?;

        if load_schema(state, &table).is_some() {
            if if_not_exists {
                return Ok(MutationBatch::new().emit(Event::new(
                    "table_exists",
                    Value::map([("table".to_string(), Value::String(table))]),
                )));
            }
            return Err(ExecError::TableExists(table).into());
        }

        let schema = Schema::new(table.clone(), columns);
        let batch = MutationBatch::new()
            .put("schema", codec::to_value(&schema))
            .put("counter", Value::Int(0))
            .ref_set(paths::schema(&table), 0)?
            .ref_set(paths::counter(&table), 1)?
            .emit(Event::new("table_created", Value::map([("table".to_string(), Value::String(table))])));
        Ok(batch)
    }
}

/// `DROP TABLE [IF EXISTS] <table>`.
pub struct DropTableGate;

impl StateGate for DropTableGate {
    fn signature(&self) -> &str {
        "drop_table_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        ReadSet::new().reference(paths::schema(&table)).pattern(paths::table_prefix(&table))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let if_exists = bool_field(&event.data, "if_exists");

        if load_schema(state, &table).is_none() {
            if if_exists {
                return Ok(MutationBatch::new().emit(Event::new(
                    "table_dropped",
                    Value::map([("table".to_string(), Value::String(table))]),
                )));
            }
            return Err(ExecError::TableNotFound(table).into());
        }

        let mut batch = MutationBatch::new();
        if let Some(names) = state.get_pattern(&paths::table_prefix(&table)) {
            let mut names: Vec<&String> = names.keys().collect();
            names.sort();
            for name in names {
                batch = batch.ref_delete(name.clone());
            }
        }
        batch = batch.emit(Event::new("table_dropped", Value::map([("table".to_string(), Value::String(table))])));
        Ok(batch)
    }
}

/// `ALTER TABLE <table> ADD [COLUMN] <col>`.
pub struct AddColumnGate;

impl StateGate for AddColumnGate {
    fn signature(&self) -> &str {
        "alter_table_add_column_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        ReadSet::new().reference(paths::schema(&table)).pattern(paths::rows_prefix(&table))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let column: Column = codec::from_value(crate::support::raw_field(&event.data, "column"))?;

        let mut schema = load_schema(state, &table).ok_or_else(|| ExecError::TableNotFound(table.clone()))?;
        if schema.column(&column.name).is_some() {
            anyhow::bail!("column already exists: {}.{}", table, column.name);
        }
        schema.columns.push(column.clone());

        let mut batch = MutationBatch::new().put("schema", codec::to_value(&schema));
        batch = batch.ref_set(paths::schema(&table), 0)?;

        if let Some(rows) = state.get_pattern(&paths::rows_prefix(&table)) {
            let mut names: Vec<&String> = rows.keys().collect();
            names.sort();
            for name in names {
                let row = rows.get(name).expect("key came from this map");
                let mut updated = row.as_map().cloned().unwrap_or_default();
                updated.entry(column.name.clone()).or_insert_with(|| column.default.clone().unwrap_or(Value::Null));
                let idx = batch.put_count();
                batch = batch.put("row", Value::Map(updated)).ref_set(name.clone(), idx)?;
            }
        }

        batch = batch.emit(Event::new(
            "column_added",
            Value::map([("table".to_string(), Value::String(table)), ("column".to_string(), Value::String(column.name))]),
        ));
        Ok(batch)
    }
}

/// `ALTER TABLE <table> DROP COLUMN <col>`.
pub struct DropColumnGate;

impl StateGate for DropColumnGate {
    fn signature(&self) -> &str {
        "alter_table_drop_column_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        ReadSet::new().reference(paths::schema(&table)).pattern(paths::rows_prefix(&table))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let column = str_field(&event.data, "column")?;

        let mut schema = load_schema(state, &table).ok_or_else(|| ExecError::TableNotFound(table.clone()))?;
        if column.eq_ignore_ascii_case("id") {
            anyhow::bail!("cannot drop the id column");
        }
        let Some(idx) = schema.column_index(&column) else {
            anyhow::bail!("no such column: {}.{}", table, column);
        };
        schema.columns.remove(idx);

        let mut batch = MutationBatch::new().put("schema", codec::to_value(&schema)).ref_set(paths::schema(&table), 0)?;

        if let Some(rows) = state.get_pattern(&paths::rows_prefix(&table)) {
            let mut names: Vec<&String> = rows.keys().collect();
            names.sort();
            for name in names {
                let row = rows.get(name).expect("key came from this map");
                let mut updated = row.as_map().cloned().unwrap_or_default();
                updated.remove(&column);
                let put_idx = batch.put_count();
                batch = batch.put("row", Value::Map(updated)).ref_set(name.clone(), put_idx)?;
            }
        }

        batch = batch.emit(Event::new(
            "column_dropped",
            Value::map([("table".to_string(), Value::String(table)), ("column".to_string(), Value::String(column))]),
        ));
        Ok(batch)
    }
}

/// `ALTER TABLE <table> RENAME TO <new_name>`.
pub struct RenameTableGate;

impl StateGate for RenameTableGate {
    fn signature(&self) -> &str {
        "alter_table_rename_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        let new_name = opt_str_field(&event.data, "new_name").unwrap_or_default();
        ReadSet::new()
            .reference(paths::schema(&table))
            .reference(paths::schema(&new_name))
            .pattern(paths::table_prefix(&table))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let new_name = str_field(&event.data, "new_name")?;

        let mut schema = load_schema(state, &table).ok_or_else(|| ExecError::TableNotFound(table.clone()))?;
        if load_schema(state, &new_name).is_some() {
            anyhow::bail!("table already exists: {new_name}");
        }
        schema.name = new_name.clone();

        let old_prefix = paths::table_prefix(&table);
        let mut batch = MutationBatch::new();
        let mut names: Vec<String> = state
            .get_pattern(&old_prefix)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();

        for name in &names {
            if *name == paths::schema(&table) {
                continue;
            }
            let suffix = &name[old_prefix.len()..];
            let new_ref = format!("{}{}", paths::table_prefix(&new_name), suffix);
            let value = state.get_pattern(&old_prefix).and_then(|m| m.get(name)).cloned().unwrap_or(Value::Null);
            let idx = batch.put_count();
            batch = batch.put("carried", value).ref_set(new_ref, idx)?.ref_delete(name.clone());
        }

        let schema_put_idx = batch.put_count();
        batch = batch
            .put("schema", codec::to_value(&schema))
            .ref_set(paths::schema(&new_name), schema_put_idx)?
            .ref_delete(paths::schema(&table))
            .emit(Event::new(
                "table_renamed",
                Value::map([
                    ("table".to_string(), Value::String(table)),
                    ("new_name".to_string(), Value::String(new_name)),
                ]),
            ));
        Ok(batch)
    }
}

/// `TRUNCATE [TABLE] <table>`.
pub struct TruncateGate;

impl StateGate for TruncateGate {
    fn signature(&self) -> &str {
        "truncate_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        ReadSet::new().reference(paths::schema(&table)).pattern(paths::rows_prefix(&table))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        if load_schema(state, &table).is_none() {
            return Err(ExecError::TableNotFound(table).into());
        }

        let mut batch = MutationBatch::new();
        if let Some(rows) = state.get_pattern(&paths::rows_prefix(&table)) {
            let mut names: Vec<&String> = rows.keys().collect();
            names.sort();
            for name in names {
                batch = batch.ref_delete(name.clone());
            }
        }
        let put_idx = batch.put_count();
        batch = batch
            .put("counter", Value::Int(0))
            .ref_set(paths::counter(&table), put_idx)?
            .emit(Event::new("row_deleted", Value::map([("table".to_string(), Value::String(table)), ("ids".to_string(), Value::Seq(Vec::new()))])));
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatedb_types::ColumnType;
    use std::collections::HashMap;

    fn col(name: &str) -> Column {
        Column { name: name.to_string(), col_type: ColumnType::Text, nullable: true, default: None }
    }

    fn event(data: Value) -> Event {
        Event::new("create_table_execute", data)
    }

    #[test]
    fn create_table_on_fresh_state_stages_schema_and_counter() {
        let gate = CreateTableGate;
        let data = Value::map([
            ("table".to_string(), Value::String("users".to_string())),
            ("if_not_exists".to_string(), Value::Bool(false)),
            ("columns".to_string(), codec::to_value(&vec![col("name")])),
        ]);
        let ev = event(data);
        let state = ResolvedState { refs: HashMap::new(), patterns: HashMap::new() };
        let batch = gate.transform(&ev, &state).unwrap();
        assert_eq!(batch.puts().len(), 2);
        assert_eq!(batch.follow_ups()[0].event_type, "table_created");
    }

    #[test]
    fn create_table_existing_without_if_not_exists_errors() {
        let gate = CreateTableGate;
        let schema = Schema::new("users", vec![col("name")]);
        let mut refs = HashMap::new();
        refs.insert(paths::schema("users"), Some(codec::to_value(&schema)));
        let state = ResolvedState { refs, patterns: HashMap::new() };
        let data = Value::map([
            ("table".to_string(), Value::String("users".to_string())),
            ("if_not_exists".to_string(), Value::Bool(false)),
            ("columns".to_string(), Value::Seq(Vec::new())),
        ]);
        assert!(gate.transform(&event(data), &state).is_err());
    }

    #[test]
    fn create_table_existing_with_if_not_exists_emits_table_exists() {
        let gate = CreateTableGate;
        let schema = Schema::new("users", vec![col("name")]);
        let mut refs = HashMap::new();
        refs.insert(paths::schema("users"), Some(codec::to_value(&schema)));
        let state = ResolvedState { refs, patterns: HashMap::new() };
        let data = Value::map([
            ("table".to_string(), Value::String("users".to_string())),
            ("if_not_exists".to_string(), Value::Bool(true)),
            ("columns".to_string(), Value::Seq(Vec::new())),
        ]);
        let batch = gate.transform(&event(data), &state).unwrap();
        assert!(batch.puts().is_empty());
        assert_eq!(batch.follow_ups()[0].event_type, "table_exists");
    }

    #[test]
    fn drop_table_missing_without_if_exists_errors() {
        let gate = DropTableGate;
        let state = ResolvedState { refs: HashMap::new(), patterns: HashMap::new() };
        let data = Value::map([
            ("table".to_string(), Value::String("ghost".to_string())),
            ("if_exists".to_string(), Value::Bool(false)),
        ]);
        assert!(gate.transform(&Event::new("drop_table_execute", data), &state).is_err());
    }
}
