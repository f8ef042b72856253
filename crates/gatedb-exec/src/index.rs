//! Index/meta `StateGate`s (§4.L): `index_create_execute`,
//! `index_drop_execute`, and `index_scan` — plus the entry-rebuild helper
//! DML gates call after a row changes shape.
//!
//! An index object is a single `Value::Map` stored at
//! [`paths::index`]: `{column, unique, entries: [{value, id}, ...]}`,
//! `entries` kept sorted by `(value, id)` (§4.J "index scan: binary range
//! over a sorted entries array").

use gatedb_bus::Event;
use gatedb_runner::{MutationBatch, ReadSet, ResolvedState, StateGate};
use gatedb_types::{compare_values, Value};
use std::collections::HashMap;

use crate::error::ExecError;
use crate::paths;
use crate::support::{bool_field, str_field};

/// Build a fresh, sorted entries array for `column` from a table's current
/// rows.
pub fn build_entries(rows: &HashMap<String, Value>, column: &str) -> Vec<Value> {
    let mut entries: Vec<(Value, i64)> = rows
        .values()
        .filter_map(|row| {
            let map = row.as_map()?;
            let id = match map.get("id") {
                Some(Value::Int(i)) => *i,
                _ => return None,
            };
            Some((map.get(column).cloned().unwrap_or(Value::Null), id))
        })
        .collect();
    entries.sort_by(|(va, ia), (vb, ib)| compare_values(va, vb).then(ia.cmp(ib)));
    entries
        .into_iter()
        .map(|(value, id)| Value::map([("value".to_string(), value), ("id".to_string(), Value::Int(id))]))
        .collect()
}

/// Wrap a definition + entries array into the object an index ref points
/// at.
pub fn index_object(column: &str, unique: bool, entries: Vec<Value>) -> Value {
    Value::map([
        ("column".to_string(), Value::String(column.to_string())),
        ("unique".to_string(), Value::Bool(unique)),
        ("entries".to_string(), Value::Seq(entries)),
    ])
}

/// Stage a rebuild of every index declared on `table` from `rows`,
/// rejecting the mutation if a `UNIQUE` index would collide.
pub fn rebuild_indexes(
    mut batch: MutationBatch,
    state: &ResolvedState,
    table: &str,
    rows: &HashMap<String, Value>,
) -> anyhow::Result<MutationBatch> {
    let Some(indexes) = state.get_pattern(&paths::indexes_prefix(table)) else {
        return Ok(batch);
    };
    let mut names: Vec<&String> = indexes.keys().collect();
    names.sort();
    for name in names {
        let Some(def) = indexes.get(name).and_then(|v| v.as_map()) else { continue };
        let Some(Value::String(column)) = def.get("column") else { continue };
        let unique = matches!(def.get("unique"), Some(Value::Bool(true)));
        let entries = build_entries(rows, column);
        if unique {
            let mut seen: Vec<&Value> = Vec::new();
            for entry in &entries {
                let Some(v) = entry.as_map().and_then(|m| m.get("value")) else { continue };
                if v.is_null() {
                    continue;
                }
                if seen.iter().any(|s| compare_values(s, v) == std::cmp::Ordering::Equal) {
                    return Err(ExecError::UniqueViolation { index: name.clone(), value: v.to_string() }.into());
                }
                seen.push(v);
            }
        }
        let idx = batch.put_count();
        batch = batch.put("index", index_object(column, unique, entries)).ref_set(name.clone(), idx)?;
    }
    Ok(batch)
}

/// `CREATE [UNIQUE] INDEX <name> ON <table> (<column>)`.
pub struct CreateIndexGate;

impl StateGate for CreateIndexGate {
    fn signature(&self) -> &str {
        "index_create_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        let name = str_field(&event.data, "name").unwrap_or_default();
        ReadSet::new().reference(paths::schema(&table)).reference(paths::index(&table, &name)).pattern(paths::rows_prefix(&table))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let name = str_field(&event.data, "name")?;
        let column = str_field(&event.data, "column")?;
        let unique = bool_field(&event.data, "unique");

        if state.get_ref(&paths::schema(&table)).is_none() {
            return Err(ExecError::TableNotFound(table).into());
        }
        if state.get_ref(&paths::index(&table, &name)).is_some() {
            return Err(ExecError::IndexExists(name).into());
        }

        let empty = HashMap::new();
        let rows = state.get_pattern(&paths::rows_prefix(&table)).unwrap_or(&empty);
        let entries = build_entries(rows, &column);
        if unique {
            let mut seen: Vec<&Value> = Vec::new();
            for entry in &entries {
                let Some(v) = entry.as_map().and_then(|m| m.get("value")) else { continue };
                if v.is_null() {
                    continue;
                }
                if seen.iter().any(|s| compare_values(s, v) == std::cmp::Ordering::Equal) {
                    return Err(ExecError::UniqueViolation { index: name.clone(), value: v.to_string() }.into());
                }
                seen.push(v);
            }
        }

        let batch = MutationBatch::new()
            .put("index", index_object(&column, unique, entries))
            .ref_set(paths::index(&table, &name), 0)?
            .emit(Event::new(
                "index_created",
                Value::map([("name".to_string(), Value::String(name)), ("table".to_string(), Value::String(table))]),
            ));
        Ok(batch)
    }
}

/// `DROP INDEX <name> ON <table>`.
pub struct DropIndexGate;

impl StateGate for DropIndexGate {
    fn signature(&self) -> &str {
        "index_drop_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        let name = str_field(&event.data, "name").unwrap_or_default();
        ReadSet::new().reference(paths::index(&table, &name))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let name = str_field(&event.data, "name")?;
        if state.get_ref(&paths::index(&table, &name)).is_none() {
            return Err(ExecError::IndexNotFound(name).into());
        }
        let batch = MutationBatch::new().ref_delete(paths::index(&table, &name)).emit(Event::new(
            "index_dropped",
            Value::map([("name".to_string(), Value::String(name)), ("table".to_string(), Value::String(table))]),
        ));
        Ok(batch)
    }
}

/// `index_scan {table, name, op, value, value2?}`: a binary range lookup
/// over a sorted index's entries, used by the executor as a plan-step
/// shortcut when a `WHERE` predicate matches an indexed column exactly
/// (§4.J).
pub fn scan(state: &ResolvedState, table: &str, name: &str, op: &str, value: &Value, value2: Option<&Value>) -> anyhow::Result<Vec<i64>> {
    let Some(obj) = state.get_ref(&paths::index(table, name)) else {
        return Err(ExecError::IndexNotFound(name.to_string()).into());
    };
    let Some(Value::Seq(entries)) = obj.as_map().and_then(|m| m.get("entries")) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for entry in entries {
        let Some(m) = entry.as_map() else { continue };
        let (Some(v), Some(Value::Int(id))) = (m.get("value"), m.get("id")) else { continue };
        let matches = match op {
            "=" => compare_values(v, value) == std::cmp::Ordering::Equal,
            "<" => compare_values(v, value) == std::cmp::Ordering::Less,
            "<=" => compare_values(v, value) != std::cmp::Ordering::Greater,
            ">" => compare_values(v, value) == std::cmp::Ordering::Greater,
            ">=" => compare_values(v, value) != std::cmp::Ordering::Less,
            "between" => {
                let hi = value2.unwrap_or(&Value::Null);
                compare_values(v, value) != std::cmp::Ordering::Less && compare_values(v, hi) != std::cmp::Ordering::Greater
            }
            _ => false,
        };
        if matches {
            out.push(*id);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_entries_sorts_by_value_then_id() {
        let mut rows = HashMap::new();
        rows.insert(
            "db/tables/t/rows/2".to_string(),
            Value::map([("id".to_string(), Value::Int(2)), ("age".to_string(), Value::Int(10))]),
        );
        rows.insert(
            "db/tables/t/rows/1".to_string(),
            Value::map([("id".to_string(), Value::Int(1)), ("age".to_string(), Value::Int(5))]),
        );
        let entries = build_entries(&rows, "age");
        assert_eq!(entries[0].as_map().unwrap().get("id"), Some(&Value::Int(1)));
        assert_eq!(entries[1].as_map().unwrap().get("id"), Some(&Value::Int(2)));
    }
}
