//! Turns a parsed [`Statement`] into Runner reads and `*_execute` events,
//! and runs `SELECT`/`EXPLAIN`/`CREATE TABLE AS`/`INSERT ... SELECT` plans
//! directly against [`Runner::read`] without going through the gate
//! dispatch loop at all. Every path here ends in `runner.emit(...)`, so a
//! `query_result` or `error` event always lands in the pending queue the
//! same way a DDL/DML gate's output does.

use std::collections::HashMap;

use gatedb_bus::Event;
use gatedb_runner::{ReadSet, Runner};
use gatedb_sql::{eval_scalar, CteDef, JoinKind, OnConflict, Plan, PlanSource, SelectItem, Statement};
use gatedb_types::{Column, ColumnType, Row, Schema, Value};

use crate::codec;
use crate::error::ExecError;
use crate::paths;
use crate::pipeline;

const RECURSION_LIMIT: usize = 1000;

/// Run one parsed statement against `runner`. Errors never escape this
/// function — they're converted to an `error` event and emitted like
/// everything else.
pub fn execute(runner: &mut Runner, statement: Statement) {
    if let Err(err) = execute_inner(runner, statement) {
        let _ = runner.emit(Event::error(err.to_string(), "executor"));
    }
}

fn execute_inner(runner: &mut Runner, statement: Statement) -> anyhow::Result<()> {
    match statement {
        Statement::CreateTable { table, columns, if_not_exists } => {
            let data = Value::map([
                ("table".to_string(), Value::String(table)),
                ("if_not_exists".to_string(), Value::Bool(if_not_exists)),
                ("columns".to_string(), codec::to_value(&columns)),
            ]);
            runner.emit(Event::new("create_table_execute", data))?;
            Ok(())
        }
        Statement::DropTable { table, if_exists } => {
            let data = Value::map([
                ("table".to_string(), Value::String(table)),
                ("if_exists".to_string(), Value::Bool(if_exists)),
            ]);
            runner.emit(Event::new("drop_table_execute", data))?;
            Ok(())
        }
        Statement::Truncate { table } => {
            runner.emit(Event::new("truncate_execute", Value::map([("table".to_string(), Value::String(table))])))?;
            Ok(())
        }
        Statement::AddColumn { table, column } => {
            let data = Value::map([
                ("table".to_string(), Value::String(table)),
                ("column".to_string(), codec::to_value(&column)),
            ]);
            runner.emit(Event::new("alter_table_add_column_execute", data))?;
            Ok(())
        }
        Statement::DropColumn { table, column } => {
            let data = Value::map([
                ("table".to_string(), Value::String(table)),
                ("column".to_string(), Value::String(column)),
            ]);
            runner.emit(Event::new("alter_table_drop_column_execute", data))?;
            Ok(())
        }
        Statement::RenameTable { table, new_name } => {
            let data = Value::map([
                ("table".to_string(), Value::String(table)),
                ("new_name".to_string(), Value::String(new_name)),
            ]);
            runner.emit(Event::new("alter_table_rename_execute", data))?;
            Ok(())
        }
        Statement::CreateIndex { name, table, column, unique } => {
            let data = Value::map([
                ("name".to_string(), Value::String(name)),
                ("table".to_string(), Value::String(table)),
                ("column".to_string(), Value::String(column)),
                ("unique".to_string(), Value::Bool(unique)),
            ]);
            runner.emit(Event::new("index_create_execute", data))?;
            Ok(())
        }
        Statement::DropIndex { name, table } => {
            let data = Value::map([
                ("name".to_string(), Value::String(name)),
                ("table".to_string(), Value::String(table)),
            ]);
            runner.emit(Event::new("index_drop_execute", data))?;
            Ok(())
        }
        Statement::CreateView { name, plan } => {
            // Views are catalog-only (never re-executed), so the compiled
            // plan is rendered to text once here rather than carried as a
            // second typed-body representation alongside triggers/constraints.
            let definition = format!("{plan:?}");
            let data = Value::map([
                ("name".to_string(), Value::String(name)),
                ("definition".to_string(), Value::String(definition)),
            ]);
            runner.emit(Event::new("view_create_execute", data))?;
            Ok(())
        }
        Statement::DropView { name } => {
            runner.emit(Event::new("view_drop_execute", Value::map([("name".to_string(), Value::String(name))])))?;
            Ok(())
        }
        Statement::CreateTrigger { name, definition } => {
            let data = Value::map([
                ("name".to_string(), Value::String(name)),
                ("definition".to_string(), Value::String(definition)),
            ]);
            runner.emit(Event::new("trigger_create_execute", data))?;
            Ok(())
        }
        Statement::DropTrigger { name } => {
            runner.emit(Event::new("trigger_drop_execute", Value::map([("name".to_string(), Value::String(name))])))?;
            Ok(())
        }
        Statement::CreateConstraint { table, name, definition } => {
            let data = Value::map([
                ("table".to_string(), Value::String(table)),
                ("name".to_string(), Value::String(name)),
                ("definition".to_string(), Value::String(definition)),
            ]);
            runner.emit(Event::new("constraint_create_execute", data))?;
            Ok(())
        }
        Statement::DropConstraint { table, name } => {
            let data = Value::map([
                ("table".to_string(), Value::String(table)),
                ("name".to_string(), Value::String(name)),
            ]);
            runner.emit(Event::new("constraint_drop_execute", data))?;
            Ok(())
        }
        Statement::Begin => {
            runner.transaction_begin()?;
            runner.emit(Event::new("transaction_begun", Value::Null))?;
            Ok(())
        }
        Statement::Commit => {
            runner.transaction_commit()?;
            runner.emit(Event::new("transaction_committed", Value::Null))?;
            Ok(())
        }
        Statement::Rollback => {
            runner.transaction_rollback()?;
            runner.emit(Event::new("transaction_rolled_back", Value::Null))?;
            Ok(())
        }
        Statement::Insert { table, columns, rows, on_conflict, returning } => {
            exec_insert(runner, table, columns, rows, on_conflict, returning)
        }
        Statement::Update { table, changes, filter, returning } => exec_update(runner, table, changes, filter, returning),
        Statement::Delete { table, filter, returning } => exec_delete(runner, table, filter, returning),
        Statement::InsertSelect { table, columns, plan } => exec_insert_select(runner, table, columns, &plan),
        Statement::CreateTableAs { table, plan } => exec_create_table_as(runner, table, &plan),
        Statement::Select(plan) => {
            let rows = run_plan(runner, &plan, &HashMap::new())?;
            emit_query_result(runner, rows)
        }
        Statement::Explain(plan) => {
            let rows: Vec<Row> = explain_steps(&plan)
                .into_iter()
                .map(|op| Row::from([("operation".to_string(), Value::String(op))]))
                .collect();
            emit_query_result(runner, rows)
        }
    }
}

fn emit_query_result(runner: &mut Runner, rows: Vec<Row>) -> anyhow::Result<()> {
    let result_rows: Vec<Value> = rows.into_iter().map(Value::Map).collect();
    runner.emit(Event::new("query_result", Value::map([("rows".to_string(), Value::Seq(result_rows))])))?;
    Ok(())
}

fn literal(v: Value) -> Value {
    Value::map([("literal".to_string(), v)])
}

fn encode_changes(changes: Vec<(String, Value)>) -> Value {
    Value::Seq(
        changes
            .into_iter()
            .map(|(column, expr)| Value::map([("column".to_string(), Value::String(column)), ("expr".to_string(), expr)]))
            .collect(),
    )
}

fn encode_on_conflict(on_conflict: Option<OnConflict>) -> Value {
    match on_conflict {
        None => Value::Null,
        Some(OnConflict::DoNothing { column }) => Value::map([
            ("column".to_string(), Value::String(column)),
            ("action".to_string(), Value::String("do_nothing".to_string())),
        ]),
        Some(OnConflict::DoUpdate { column, changes }) => Value::map([
            ("column".to_string(), Value::String(column)),
            ("action".to_string(), Value::String("do_update".to_string())),
            ("changes".to_string(), encode_changes(changes)),
        ]),
    }
}

/// Emits `event`, then — only if `returning` names columns — drains the
/// pending queue, pulls out the `terminal_type` event that just resulted
/// from it, projects its `rows` field through `returning`, and replaces it
/// with a `query_result` before putting everything else back. Insert,
/// update and delete all carry the affected rows under the same `rows`
/// key, so one helper covers all three.
fn emit_dml_with_returning(runner: &mut Runner, event: Event, terminal_type: &str, returning: &[SelectItem]) -> anyhow::Result<()> {
    runner.emit(event)?;
    if returning.is_empty() {
        return Ok(());
    }
    let mut events = runner.drain_pending();
    if let Some(pos) = events.iter().position(|e| e.event_type == terminal_type) {
        let terminal = events.remove(pos);
        let affected: Vec<Row> = match terminal.data.as_map().and_then(|m| m.get("rows")) {
            Some(Value::Seq(items)) => items.iter().filter_map(|v| v.as_map().cloned()).collect(),
            _ => Vec::new(),
        };
        let projected = pipeline::project(&affected, returning, &[]);
        let result_rows: Vec<Value> = projected.into_iter().map(Value::Map).collect();
        events.push(Event::new("query_result", Value::map([("rows".to_string(), Value::Seq(result_rows))])));
    }
    for ev in events {
        runner.emit(ev)?;
    }
    Ok(())
}

fn exec_insert(
    runner: &mut Runner,
    table: String,
    columns: Option<Vec<String>>,
    rows: Vec<Vec<Value>>,
    on_conflict: Option<OnConflict>,
    returning: Vec<SelectItem>,
) -> anyhow::Result<()> {
    let data = Value::map([
        ("table".to_string(), Value::String(table)),
        (
            "columns".to_string(),
            columns.map(|c| Value::Seq(c.into_iter().map(Value::String).collect())).unwrap_or(Value::Null),
        ),
        ("rows".to_string(), Value::Seq(rows.into_iter().map(Value::Seq).collect())),
        ("on_conflict".to_string(), encode_on_conflict(on_conflict)),
    ]);
    emit_dml_with_returning(runner, Event::new("insert_execute", data), "row_inserted", &returning)
}

fn exec_update(
    runner: &mut Runner,
    table: String,
    changes: Vec<(String, Value)>,
    filter: Option<Value>,
    returning: Vec<SelectItem>,
) -> anyhow::Result<()> {
    let data = Value::map([
        ("table".to_string(), Value::String(table)),
        ("changes".to_string(), encode_changes(changes)),
        ("filter".to_string(), filter.unwrap_or(Value::Null)),
    ]);
    emit_dml_with_returning(runner, Event::new("update_execute", data), "row_updated", &returning)
}

fn exec_delete(runner: &mut Runner, table: String, filter: Option<Value>, returning: Vec<SelectItem>) -> anyhow::Result<()> {
    let data = Value::map([
        ("table".to_string(), Value::String(table)),
        ("filter".to_string(), filter.unwrap_or(Value::Null)),
    ]);
    emit_dml_with_returning(runner, Event::new("delete_execute", data), "row_deleted", &returning)
}

fn exec_insert_select(runner: &mut Runner, table: String, columns: Option<Vec<String>>, plan: &Plan) -> anyhow::Result<()> {
    let rows = run_plan(runner, plan, &HashMap::new())?;
    for row in rows {
        let cols: Vec<String> = columns.clone().unwrap_or_else(|| row.keys().cloned().collect());
        let exprs: Vec<Value> = cols.iter().map(|c| literal(row.get(c).cloned().unwrap_or(Value::Null))).collect();
        let data = Value::map([
            ("table".to_string(), Value::String(table.clone())),
            ("columns".to_string(), Value::Seq(cols.into_iter().map(Value::String).collect())),
            ("rows".to_string(), Value::Seq(vec![Value::Seq(exprs)])),
            ("on_conflict".to_string(), Value::Null),
        ]);
        runner.emit(Event::new("insert_execute", data))?;
    }
    Ok(())
}

fn exec_create_table_as(runner: &mut Runner, table: String, plan: &Plan) -> anyhow::Result<()> {
    let rows = run_plan(runner, plan, &HashMap::new())?;
    let columns = derive_columns(&rows, plan);
    let create_data = Value::map([
        ("table".to_string(), Value::String(table.clone())),
        ("if_not_exists".to_string(), Value::Bool(false)),
        ("columns".to_string(), codec::to_value(&columns)),
    ]);
    runner.emit(Event::new("create_table_execute", create_data))?;

    if rows.is_empty() {
        return Ok(());
    }
    let col_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    let value_rows: Vec<Value> = rows
        .into_iter()
        .map(|row| Value::Seq(col_names.iter().map(|c| literal(row.get(c).cloned().unwrap_or(Value::Null))).collect()))
        .collect();
    let insert_data = Value::map([
        ("table".to_string(), Value::String(table)),
        ("columns".to_string(), Value::Seq(col_names.into_iter().map(Value::String).collect())),
        ("rows".to_string(), Value::Seq(value_rows)),
        ("on_conflict".to_string(), Value::Null),
    ]);
    runner.emit(Event::new("insert_execute", insert_data))?;
    Ok(())
}

fn derive_columns(rows: &[Row], plan: &Plan) -> Vec<Column> {
    let names: Vec<String> = match rows.first() {
        Some(first) => first.keys().cloned().collect(),
        None => plan.select.iter().map(|item| item.alias.clone().unwrap_or_else(|| pipeline::default_label(&item.expr))).collect(),
    };
    names
        .into_iter()
        .map(|name| {
            let col_type = rows.first().and_then(|r| r.get(&name)).map(value_column_type).unwrap_or(ColumnType::Text);
            Column { name, col_type, nullable: true, default: None }
        })
        .collect()
}

fn value_column_type(v: &Value) -> ColumnType {
    match v {
        Value::Int(_) => ColumnType::Integer,
        Value::Real(_) => ColumnType::Real,
        Value::Bool(_) => ColumnType::Boolean,
        _ => ColumnType::Text,
    }
}

/// Runs a compiled plan end to end: materializes its CTEs, resolves the
/// source and joins into rows, then threads them through the same
/// `pipeline` transforms a `StateGate` would use for a read-only query.
fn run_plan(runner: &Runner, plan: &Plan, outer_ctes: &HashMap<String, Vec<Row>>) -> anyhow::Result<Vec<Row>> {
    let mut ctes = outer_ctes.clone();
    for cte in &plan.ctes {
        let rows = materialize_cte(runner, cte, &ctes)?;
        ctes.insert(cte.name.clone(), rows);
    }

    let subqueries = resolve_subqueries(runner, &plan.subqueries, &ctes)?;

    let mut rows = resolve_source(runner, &plan.source, &ctes)?;
    let mut left_label = source_label(&plan.source);
    let mut left_columns = source_columns(runner, &plan.source, &rows)?;

    for join in &plan.joins {
        let right_rows = resolve_source(runner, &join.right, &ctes)?;
        let right_label = source_label(&join.right);
        let right_columns = source_columns(runner, &join.right, &right_rows)?;
        rows = pipeline::join(
            rows,
            left_label.as_deref(),
            &left_columns,
            right_rows,
            right_label.as_deref(),
            &right_columns,
            join.kind,
            join.on.as_ref(),
            &subqueries,
        );
        left_label = None;
        left_columns = rows.first().map(|r| r.keys().cloned().collect()).unwrap_or_default();
    }

    rows = pipeline::filter(rows, plan.filter.as_ref(), &subqueries);
    rows = pipeline::window(rows, &plan.windows, &subqueries);

    if !plan.group_by.is_empty() || !plan.aggregates.is_empty() {
        rows = pipeline::aggregate(&rows, &plan.group_by, &plan.aggregates, &subqueries);
        rows = pipeline::filter(rows, plan.having.as_ref(), &subqueries);
    }

    rows = pipeline::project(&rows, &plan.select, &subqueries);

    if let Some(cols) = &plan.distinct {
        rows = pipeline::distinct(rows, Some(cols.as_slice()), &subqueries);
    }

    rows = pipeline::order_by(rows, &plan.order_by, &subqueries);
    rows = pipeline::limit(rows, plan.limit, plan.offset);

    if let Some((all, other)) = &plan.union {
        let mut other_rows = run_plan(runner, other, outer_ctes)?;
        rows.append(&mut other_rows);
        if !*all {
            rows = pipeline::distinct(rows, None, &subqueries);
        }
    }

    Ok(rows)
}

fn materialize_cte(runner: &Runner, cte: &CteDef, ctes: &HashMap<String, Vec<Row>>) -> anyhow::Result<Vec<Row>> {
    let anchor_rows = apply_cte_columns(run_plan(runner, &cte.anchor, ctes)?, &cte.columns);
    let Some(recursive_term) = &cte.recursive_term else {
        return Ok(anchor_rows);
    };

    let mut result = anchor_rows.clone();
    let mut working = anchor_rows;
    let mut iterations = 0usize;
    loop {
        if working.is_empty() {
            break;
        }
        iterations += 1;
        if iterations > RECURSION_LIMIT {
            return Err(ExecError::RecursionLimitExceeded(RECURSION_LIMIT).into());
        }
        let mut step_ctes = ctes.clone();
        step_ctes.insert(cte.name.clone(), working.clone());
        let next = apply_cte_columns(run_plan(runner, recursive_term, &step_ctes)?, &cte.columns);
        if next.is_empty() {
            break;
        }
        result.extend(next.clone());
        working = next;
    }
    Ok(result)
}

fn apply_cte_columns(rows: Vec<Row>, columns: &[String]) -> Vec<Row> {
    if columns.is_empty() {
        return rows;
    }
    rows.into_iter()
        .map(|row| columns.iter().cloned().zip(row.into_values()).collect())
        .collect()
}

fn resolve_subqueries(runner: &Runner, subqueries: &[Plan], ctes: &HashMap<String, Vec<Row>>) -> anyhow::Result<Vec<Vec<Value>>> {
    subqueries
        .iter()
        .map(|sq| {
            let rows = run_plan(runner, sq, ctes)?;
            Ok(rows.into_iter().map(|r| r.into_values().next().unwrap_or(Value::Null)).collect())
        })
        .collect()
}

fn resolve_source(runner: &Runner, source: &PlanSource, ctes: &HashMap<String, Vec<Row>>) -> anyhow::Result<Vec<Row>> {
    match source {
        PlanSource::None => Ok(vec![Row::new()]),
        PlanSource::Table { name, .. } => scan_table(runner, name),
        PlanSource::SubPlan { plan, .. } => run_plan(runner, plan, ctes),
        PlanSource::CteRef { name, .. } => Ok(ctes.get(name).cloned().unwrap_or_default()),
        PlanSource::Values { columns, rows } => Ok(rows
            .iter()
            .map(|exprs| {
                let empty = Row::new();
                columns.iter().cloned().zip(exprs.iter().map(|e| eval_scalar(e, &empty, &[]))).collect()
            })
            .collect()),
    }
}

fn source_label(source: &PlanSource) -> Option<String> {
    match source {
        PlanSource::Table { name, alias } => Some(alias.clone().unwrap_or_else(|| name.clone())),
        PlanSource::SubPlan { alias, .. } => Some(alias.clone()),
        PlanSource::CteRef { name, alias } => Some(alias.clone().unwrap_or_else(|| name.clone())),
        PlanSource::None | PlanSource::Values { .. } => None,
    }
}

fn source_columns(runner: &Runner, source: &PlanSource, rows: &[Row]) -> anyhow::Result<Vec<String>> {
    if let PlanSource::Table { name, .. } = source {
        if let Some(schema) = load_schema(runner, name)? {
            return Ok(schema.columns.iter().map(|c| c.name.clone()).collect());
        }
    }
    Ok(rows.first().map(|r| r.keys().cloned().collect()).unwrap_or_default())
}

fn load_schema(runner: &Runner, table: &str) -> anyhow::Result<Option<Schema>> {
    let state = runner.read(&ReadSet::new().reference(paths::schema(table)))?;
    match state.get_ref(&paths::schema(table)) {
        Some(v) => Ok(Some(codec::from_value(v)?)),
        None => Ok(None),
    }
}

fn scan_table(runner: &Runner, table: &str) -> anyhow::Result<Vec<Row>> {
    let read_set = ReadSet::new().reference(paths::schema(table)).pattern(paths::rows_prefix(table));
    let state = runner.read(&read_set)?;
    if state.get_ref(&paths::schema(table)).is_none() {
        return Err(ExecError::TableNotFound(table.to_string()).into());
    }
    let mut rows: Vec<Row> = state
        .get_pattern(&paths::rows_prefix(table))
        .map(|m| m.values().filter_map(|v| v.as_map().cloned()).collect())
        .unwrap_or_default();
    rows.sort_by_key(|r| match r.get("id") {
        Some(Value::Int(i)) => *i,
        _ => i64::MAX,
    });
    Ok(rows)
}

fn explain_steps(plan: &Plan) -> Vec<String> {
    let mut steps = Vec::new();
    for cte in &plan.ctes {
        steps.push(format!("cte {}", cte.name));
    }
    steps.push(source_step(&plan.source));
    for join in &plan.joins {
        steps.push(format!("{} join", join_kind_name(join.kind)));
    }
    if plan.filter.is_some() {
        steps.push("filter".to_string());
    }
    if !plan.group_by.is_empty() || !plan.aggregates.is_empty() {
        steps.push("aggregate".to_string());
    }
    if plan.having.is_some() {
        steps.push("having".to_string());
    }
    if !plan.windows.is_empty() {
        steps.push("window".to_string());
    }
    steps.push("project".to_string());
    if plan.distinct.is_some() {
        steps.push("distinct".to_string());
    }
    if !plan.order_by.is_empty() {
        steps.push("order_by".to_string());
    }
    if plan.limit.is_some() || plan.offset.is_some() {
        steps.push("limit".to_string());
    }
    if let Some((all, _)) = &plan.union {
        steps.push(if *all { "union_all".to_string() } else { "union".to_string() });
    }
    steps
}

fn source_step(source: &PlanSource) -> String {
    match source {
        PlanSource::None => "values".to_string(),
        PlanSource::Table { name, .. } => format!("table_scan {name}"),
        PlanSource::SubPlan { alias, .. } => format!("derived_table {alias}"),
        PlanSource::CteRef { name, .. } => format!("cte_ref {name}"),
        PlanSource::Values { .. } => "values".to_string(),
    }
}

fn join_kind_name(kind: JoinKind) -> &'static str {
    match kind {
        JoinKind::Inner => "inner",
        JoinKind::Left => "left",
        JoinKind::Right => "right",
        JoinKind::Full => "full",
        JoinKind::Cross => "cross",
    }
}
