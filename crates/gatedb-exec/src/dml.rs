//! Row `StateGate`s (§4.K/§4.L boundary, §6.C `row_inserted`/`row_updated`/
//! `row_deleted`): `insert_execute`, `update_execute`, `delete_execute`.
//!
//! Values carried in event data are `Value`-encoded scalar expressions
//! (§4.I), evaluated here against an empty row for `INSERT` (no
//! correlated context) or the row being updated for `UPDATE` — the same
//! `gatedb_sql::eval` entry points the executor uses for `WHERE`/`SELECT`.
//! `RETURNING` projection is left to the engine, which still holds the
//! parsed `SelectItem` list; these gates just hand back the affected rows
//! in full so the engine can project them.

use std::collections::HashMap;

use gatedb_bus::Event;
use gatedb_runner::{MutationBatch, ReadSet, ResolvedState, StateGate};
use gatedb_sql::{eval_condition, eval_scalar};
use gatedb_types::{Row, Schema, Value};

use crate::codec;
use crate::error::ExecError;
use crate::index;
use crate::paths;
use crate::support::{raw_field, str_field};

fn load_schema(state: &ResolvedState, table: &str) -> Option<Schema> {
    state.get_ref(&paths::schema(table)).and_then(|v| codec::from_value(v).ok())
}

fn as_row(v: &Value) -> Row {
    v.as_map().cloned().unwrap_or_default()
}

fn row_id(v: &Value) -> Option<i64> {
    match v.as_map().and_then(|m| m.get("id")) {
        Some(Value::Int(i)) => Some(*i),
        _ => None,
    }
}

fn validate_not_null(schema: &Schema, table: &str, row: &Row) -> anyhow::Result<()> {
    for column in &schema.columns {
        if !column.nullable && row.get(&column.name).map(|v| v.is_null()).unwrap_or(true) {
            return Err(ExecError::NotNullViolation { table: table.to_string(), column: column.name.clone() }.into());
        }
    }
    Ok(())
}

/// `INSERT INTO <table> [(cols)] VALUES (...), ... [ON CONFLICT ...]`.
pub struct InsertGate;

impl StateGate for InsertGate {
    fn signature(&self) -> &str {
        "insert_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        ReadSet::new()
            .reference(paths::schema(&table))
            .reference(paths::counter(&table))
            .pattern(paths::rows_prefix(&table))
            .pattern(paths::indexes_prefix(&table))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let schema = load_schema(state, &table).ok_or_else(|| ExecError::TableNotFound(table.clone()))?;

        let columns: Vec<String> = match raw_field(&event.data, "columns") {
            Value::Seq(items) => items.iter().filter_map(|v| v.as_string()).collect(),
            _ => schema.columns.iter().skip(1).map(|c| c.name.clone()).collect(),
        };
        let Value::Seq(value_rows) = raw_field(&event.data, "rows") else {
            anyhow::bail!("insert_execute requires a rows array");
        };

        let mut counter = match state.get_ref(&paths::counter(&table)) {
            Some(Value::Int(n)) => *n,
            _ => 0,
        };

        let existing_rows: HashMap<String, Value> = state.get_pattern(&paths::rows_prefix(&table)).cloned().unwrap_or_default();
        let mut final_rows = existing_rows.clone();

        let on_conflict = raw_field(&event.data, "on_conflict");
        let conflict_column = on_conflict.as_map().and_then(|m| m.get("column")).and_then(|v| v.as_string());
        let conflict_action = on_conflict.as_map().and_then(|m| m.get("action")).and_then(|v| v.as_string());

        let mut batch = MutationBatch::new();
        let mut ids = Vec::new();
        let mut affected_rows = Vec::new();

        for value_row in value_rows {
            let Value::Seq(exprs) = value_row else { continue };
            let empty_row = Row::new();
            let mut row: Row = Row::new();
            for column in &schema.columns {
                if let Some(default) = &column.default {
                    row.insert(column.name.clone(), default.clone());
                }
            }
            for (name, expr) in columns.iter().zip(exprs.iter()) {
                if schema.column(name).is_none() {
                    return Err(ExecError::ColumnNotFound { table: table.clone(), column: name.clone() }.into());
                }
                row.insert(name.clone(), eval_scalar(expr, &empty_row, &[]));
            }

            let conflict = conflict_column.as_deref().and_then(|col| {
                let target = row.get(col)?;
                final_rows.values().find(|existing| {
                    existing.as_map().and_then(|m| m.get(col)).map(|v| v == target).unwrap_or(false)
                })
            });

            if let Some(existing) = conflict {
                if conflict_action.as_deref() == Some("do_nothing") {
                    continue;
                }
                let mut updated = as_row(existing);
                if let Value::Seq(changes) = raw_field(on_conflict, "changes") {
                    for change in changes {
                        let Some(m) = change.as_map() else { continue };
                        let (Some(Value::String(col)), Some(expr)) = (m.get("column"), m.get("expr")) else { continue };
                        updated.insert(col.clone(), eval_scalar(expr, &updated.clone(), &[]));
                    }
                }
                validate_not_null(&schema, &table, &updated)?;
                let id = row_id(existing).unwrap_or(0);
                let ref_name = paths::row(&table, id);
                let idx = batch.put_count();
                batch = batch.put("row", Value::Map(updated.clone())).ref_set(ref_name.clone(), idx)?;
                final_rows.insert(ref_name, Value::Map(updated.clone()));
                ids.push(id);
                affected_rows.push(Value::Map(updated));
                continue;
            }

            counter += 1;
            row.insert("id".to_string(), Value::Int(counter));
            validate_not_null(&schema, &table, &row)?;
            let ref_name = paths::row(&table, counter);
            let idx = batch.put_count();
            batch = batch.put("row", Value::Map(row.clone())).ref_set(ref_name.clone(), idx)?;
            final_rows.insert(ref_name, Value::Map(row.clone()));
            ids.push(counter);
            affected_rows.push(Value::Map(row));
        }

        let counter_idx = batch.put_count();
        batch = batch.put("counter", Value::Int(counter)).ref_set(paths::counter(&table), counter_idx)?;
        batch = index::rebuild_indexes(batch, state, &table, &final_rows)?;

        batch = batch.emit(Event::new(
            "row_inserted",
            Value::map([
                ("table".to_string(), Value::String(table)),
                ("ids".to_string(), Value::Seq(ids.into_iter().map(Value::Int).collect())),
                ("rows".to_string(), Value::Seq(affected_rows)),
            ]),
        ));
        Ok(batch)
    }
}

/// `UPDATE <table> SET ... [WHERE ...]`.
pub struct UpdateGate;

impl StateGate for UpdateGate {
    fn signature(&self) -> &str {
        "update_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        ReadSet::new()
            .reference(paths::schema(&table))
            .pattern(paths::rows_prefix(&table))
            .pattern(paths::indexes_prefix(&table))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let schema = load_schema(state, &table).ok_or_else(|| ExecError::TableNotFound(table.clone()))?;
        let Value::Seq(changes) = raw_field(&event.data, "changes") else {
            anyhow::bail!("update_execute requires a changes array");
        };
        let filter = match raw_field(&event.data, "filter") {
            Value::Null => None,
            v => Some(v.clone()),
        };

        let mut final_rows: HashMap<String, Value> = state.get_pattern(&paths::rows_prefix(&table)).cloned().unwrap_or_default();
        let mut ref_names: Vec<String> = final_rows.keys().cloned().collect();
        ref_names.sort();

        let mut batch = MutationBatch::new();
        let mut ids = Vec::new();
        let mut affected_rows = Vec::new();

        for ref_name in ref_names {
            let old = final_rows.get(&ref_name).cloned().unwrap_or(Value::Null);
            let old_row = as_row(&old);
            if !eval_condition(filter.as_ref(), &old_row, &[]) {
                continue;
            }
            let mut new_row = old_row.clone();
            for change in changes {
                let Some(m) = change.as_map() else { continue };
                let (Some(Value::String(col)), Some(expr)) = (m.get("column"), m.get("expr")) else { continue };
                if schema.column(col).is_none() {
                    return Err(ExecError::ColumnNotFound { table: table.clone(), column: col.clone() }.into());
                }
                new_row.insert(col.clone(), eval_scalar(expr, &old_row, &[]));
            }
            validate_not_null(&schema, &table, &new_row)?;

            let idx = batch.put_count();
            batch = batch.put("row", Value::Map(new_row.clone())).ref_set(ref_name.clone(), idx)?;
            final_rows.insert(ref_name.clone(), Value::Map(new_row.clone()));
            if let Some(id) = row_id(&Value::Map(new_row.clone())) {
                ids.push(id);
            }
            affected_rows.push(Value::Map(new_row));
        }

        batch = index::rebuild_indexes(batch, state, &table, &final_rows)?;
        batch = batch.emit(Event::new(
            "row_updated",
            Value::map([
                ("table".to_string(), Value::String(table)),
                ("ids".to_string(), Value::Seq(ids.into_iter().map(Value::Int).collect())),
                ("rows".to_string(), Value::Seq(affected_rows)),
            ]),
        ));
        Ok(batch)
    }
}

/// `DELETE FROM <table> [WHERE ...]`.
pub struct DeleteGate;

impl StateGate for DeleteGate {
    fn signature(&self) -> &str {
        "delete_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        ReadSet::new()
            .reference(paths::schema(&table))
            .pattern(paths::rows_prefix(&table))
            .pattern(paths::indexes_prefix(&table))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        if load_schema(state, &table).is_none() {
            return Err(ExecError::TableNotFound(table).into());
        }
        let filter = match raw_field(&event.data, "filter") {
            Value::Null => None,
            v => Some(v.clone()),
        };

        let mut final_rows: HashMap<String, Value> = state.get_pattern(&paths::rows_prefix(&table)).cloned().unwrap_or_default();
        let mut ref_names: Vec<String> = final_rows.keys().cloned().collect();
        ref_names.sort();

        let mut batch = MutationBatch::new();
        let mut ids = Vec::new();
        let mut affected_rows = Vec::new();

        for ref_name in ref_names {
            let old = final_rows.get(&ref_name).cloned().unwrap_or(Value::Null);
            let old_row = as_row(&old);
            if !eval_condition(filter.as_ref(), &old_row, &[]) {
                continue;
            }
            batch = batch.ref_delete(ref_name.clone());
            final_rows.remove(&ref_name);
            if let Some(id) = row_id(&old) {
                ids.push(id);
            }
            affected_rows.push(old);
        }

        batch = index::rebuild_indexes(batch, state, &table, &final_rows)?;
        batch = batch.emit(Event::new(
            "row_deleted",
            Value::map([
                ("table".to_string(), Value::String(table)),
                ("ids".to_string(), Value::Seq(ids.into_iter().map(Value::Int).collect())),
                ("rows".to_string(), Value::Seq(affected_rows)),
            ]),
        ));
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatedb_types::{Column, ColumnType};

    fn schema() -> Schema {
        Schema::new(
            "users",
            vec![
                Column { name: "name".to_string(), col_type: ColumnType::Text, nullable: false, default: None },
                Column { name: "age".to_string(), col_type: ColumnType::Integer, nullable: true, default: None },
            ],
        )
    }

    fn literal(v: Value) -> Value {
        Value::map([("literal".to_string(), v)])
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let gate = InsertGate;
        let mut refs = HashMap::new();
        refs.insert(paths::schema("users"), Some(codec::to_value(&schema())));
        refs.insert(paths::counter("users"), Some(Value::Int(0)));
        let state = ResolvedState { refs, patterns: HashMap::new() };

        let data = Value::map([
            ("table".to_string(), Value::String("users".to_string())),
            ("columns".to_string(), Value::Seq(vec![Value::String("name".to_string()), Value::String("age".to_string())])),
            (
                "rows".to_string(),
                Value::Seq(vec![Value::Seq(vec![literal(Value::String("Ada".to_string())), literal(Value::Int(30))])]),
            ),
        ]);
        let batch = gate.transform(&Event::new("insert_execute", data), &state).unwrap();
        let Event { event_type, data } = &batch.follow_ups()[0];
        assert_eq!(event_type, "row_inserted");
        assert_eq!(data.as_map().unwrap().get("ids"), Some(&Value::Seq(vec![Value::Int(1)])));
    }

    #[test]
    fn insert_rejects_missing_not_null_column() {
        let gate = InsertGate;
        let mut refs = HashMap::new();
        refs.insert(paths::schema("users"), Some(codec::to_value(&schema())));
        refs.insert(paths::counter("users"), Some(Value::Int(0)));
        let state = ResolvedState { refs, patterns: HashMap::new() };

        let data = Value::map([
            ("table".to_string(), Value::String("users".to_string())),
            ("columns".to_string(), Value::Seq(vec![Value::String("age".to_string())])),
            ("rows".to_string(), Value::Seq(vec![Value::Seq(vec![literal(Value::Int(5))])])),
        ]);
        assert!(gate.transform(&Event::new("insert_execute", data), &state).is_err());
    }
}
