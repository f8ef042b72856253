//! Catalog-only `StateGate`s (§4.L, §9 Open Question b): views, triggers,
//! and table constraints are registered and can be dropped, but nothing
//! in the DML path consults them. Each entry stores its definition text
//! verbatim — the same treatment the parser already gives triggers and
//! constraints (`Statement::CreateTrigger`/`CreateConstraint` carry raw
//! text rather than a typed body), applied uniformly to views so this
//! module doesn't need a second way to persist a compiled `Plan`.

use gatedb_bus::Event;
use gatedb_runner::{MutationBatch, ReadSet, ResolvedState, StateGate};
use gatedb_types::Value;

use crate::error::ExecError;
use crate::paths;
use crate::support::{bool_field, str_field};

fn catalog_object(name: &str, definition: &str) -> Value {
    Value::map([
        ("name".to_string(), Value::String(name.to_string())),
        ("definition".to_string(), Value::String(definition.to_string())),
    ])
}

/// `CREATE VIEW <name> AS <select text>`.
pub struct CreateViewGate;

impl StateGate for CreateViewGate {
    fn signature(&self) -> &str {
        "view_create_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let name = str_field(&event.data, "name").unwrap_or_default();
        ReadSet::new().reference(paths::view(&name))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let name = str_field(&event.data, "name")?;
        let definition = str_field(&event.data, "definition")?;
        if state.get_ref(&paths::view(&name)).is_some() {
            return Err(ExecError::ViewExists(name).into());
        }
        let batch = MutationBatch::new()
            .put("view", catalog_object(&name, &definition))
            .ref_set(paths::view(&name), 0)?
            .emit(Event::new("view_created", Value::map([("name".to_string(), Value::String(name))])));
        Ok(batch)
    }
}

/// `DROP VIEW [IF EXISTS] <name>`.
pub struct DropViewGate;

impl StateGate for DropViewGate {
    fn signature(&self) -> &str {
        "view_drop_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let name = str_field(&event.data, "name").unwrap_or_default();
        ReadSet::new().reference(paths::view(&name))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let name = str_field(&event.data, "name")?;
        let if_exists = bool_field(&event.data, "if_exists");
        if state.get_ref(&paths::view(&name)).is_none() {
            if if_exists {
                return Ok(MutationBatch::new().emit(Event::new("view_dropped", Value::map([("name".to_string(), Value::String(name))]))));
            }
            return Err(ExecError::ViewNotFound(name).into());
        }
        let batch = MutationBatch::new()
            .ref_delete(paths::view(&name))
            .emit(Event::new("view_dropped", Value::map([("name".to_string(), Value::String(name))])));
        Ok(batch)
    }
}

/// `CREATE TRIGGER <name> ...` (raw definition text, unenforced).
pub struct CreateTriggerGate;

impl StateGate for CreateTriggerGate {
    fn signature(&self) -> &str {
        "trigger_create_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let name = str_field(&event.data, "name").unwrap_or_default();
        ReadSet::new().reference(paths::trigger(&name))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let name = str_field(&event.data, "name")?;
        let definition = str_field(&event.data, "definition")?;
        if state.get_ref(&paths::trigger(&name)).is_some() {
            return Err(ExecError::TriggerExists(name).into());
        }
        let batch = MutationBatch::new()
            .put("trigger", catalog_object(&name, &definition))
            .ref_set(paths::trigger(&name), 0)?
            .emit(Event::new("trigger_created", Value::map([("name".to_string(), Value::String(name))])));
        Ok(batch)
    }
}

/// `DROP TRIGGER <name>`.
pub struct DropTriggerGate;

impl StateGate for DropTriggerGate {
    fn signature(&self) -> &str {
        "trigger_drop_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let name = str_field(&event.data, "name").unwrap_or_default();
        ReadSet::new().reference(paths::trigger(&name))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let name = str_field(&event.data, "name")?;
        if state.get_ref(&paths::trigger(&name)).is_none() {
            return Err(ExecError::TriggerNotFound(name).into());
        }
        let batch = MutationBatch::new()
            .ref_delete(paths::trigger(&name))
            .emit(Event::new("trigger_dropped", Value::map([("name".to_string(), Value::String(name))])));
        Ok(batch)
    }
}

/// `ALTER TABLE <table> ADD CONSTRAINT <name> ...` (raw definition text,
/// unenforced).
pub struct CreateConstraintGate;

impl StateGate for CreateConstraintGate {
    fn signature(&self) -> &str {
        "constraint_create_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        let name = str_field(&event.data, "name").unwrap_or_default();
        ReadSet::new().reference(paths::schema(&table)).reference(paths::constraint(&table, &name))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let name = str_field(&event.data, "name")?;
        let definition = str_field(&event.data, "definition")?;
        if state.get_ref(&paths::schema(&table)).is_none() {
            return Err(ExecError::TableNotFound(table).into());
        }
        if state.get_ref(&paths::constraint(&table, &name)).is_some() {
            return Err(ExecError::ConstraintExists(name).into());
        }
        let batch = MutationBatch::new()
            .put("constraint", catalog_object(&name, &definition))
            .ref_set(paths::constraint(&table, &name), 0)?
            .emit(Event::new(
                "constraint_created",
                Value::map([("table".to_string(), Value::String(table)), ("name".to_string(), Value::String(name))]),
            ));
        Ok(batch)
    }
}

/// `ALTER TABLE <table> DROP CONSTRAINT <name>`.
pub struct DropConstraintGate;

impl StateGate for DropConstraintGate {
    fn signature(&self) -> &str {
        "constraint_drop_execute"
    }

    fn reads(&self, event: &Event) -> ReadSet {
        let table = str_field(&event.data, "table").unwrap_or_default();
        let name = str_field(&event.data, "name").unwrap_or_default();
        ReadSet::new().reference(paths::constraint(&table, &name))
    }

    fn transform(&self, event: &Event, state: &ResolvedState) -> anyhow::Result<MutationBatch> {
        let table = str_field(&event.data, "table")?;
        let name = str_field(&event.data, "name")?;
        if state.get_ref(&paths::constraint(&table, &name)).is_none() {
            return Err(ExecError::ConstraintNotFound(name).into());
        }
        let batch = MutationBatch::new()
            .ref_delete(paths::constraint(&table, &name))
            .emit(Event::new(
                "constraint_dropped",
                Value::map([("table".to_string(), Value::String(table)), ("name".to_string(), Value::String(name))]),
            ));
        Ok(batch)
    }
}
