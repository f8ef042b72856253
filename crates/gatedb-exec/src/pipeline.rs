//! Row pipeline transforms (§4.J): `filter`, `project`, `join`,
//! `order_by`, `limit`, `distinct`, `aggregate`, `window`.
//!
//! §4.J frames these as pure gates chained by the planner
//! (`table_scan → filter → project → ...`, each emitting a `*_result`
//! event that threads `rows` to the next step). A compiled [`Plan`] is
//! already a linear pipeline description, so the executor (`executor.rs`)
//! runs these as ordinary function calls over `Vec<Row>` rather than
//! round-tripping each intermediate row set through the event bus —
//! same transforms, without the per-step event envelope.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use gatedb_sql::{eval_condition, eval_scalar, AggregateCall, JoinKind, OrderKey, ResolvedSubqueries, SelectItem, WindowCall};
use gatedb_types::{compare_values, Row, Value};

/// `WHERE`/`HAVING`/join `ON` (§4.J "filter: keep rows where condition
/// evaluates true").
pub fn filter(rows: Vec<Row>, cond: Option<&Value>, subqueries: &ResolvedSubqueries) -> Vec<Row> {
    rows.into_iter().filter(|row| eval_condition(cond, row, subqueries)).collect()
}

fn qualify(row: &Row, label: &str) -> Vec<(String, Value)> {
    row.iter().map(|(k, v)| (format!("{label}.{k}"), v.clone())).collect()
}

fn merge_row(left: &Row, left_label: Option<&str>, right: &Row, right_label: Option<&str>) -> Row {
    let mut merged: Row = left.clone();
    for (k, v) in right {
        merged.insert(k.clone(), v.clone());
    }
    if let Some(label) = left_label {
        merged.extend(qualify(left, label));
    }
    if let Some(label) = right_label {
        merged.extend(qualify(right, label));
    }
    merged
}

/// Nested-loop join over two already-materialized row sets (§4.J). Column
/// name collisions between the two sides are resolved by the right side
/// winning the bare key; either side stays reachable through its
/// `label.column` qualified form.
#[allow(clippy::too_many_arguments)]
pub fn join(
    left: Vec<Row>,
    left_label: Option<&str>,
    left_columns: &[String],
    right: Vec<Row>,
    right_label: Option<&str>,
    right_columns: &[String],
    kind: JoinKind,
    on: Option<&Value>,
    subqueries: &ResolvedSubqueries,
) -> Vec<Row> {
    let null_right: Row = right_columns.iter().map(|c| (c.clone(), Value::Null)).collect();
    let null_left: Row = left_columns.iter().map(|c| (c.clone(), Value::Null)).collect();

    let mut out = Vec::new();
    let mut right_matched = vec![false; right.len()];

    for l in &left {
        let mut matched_any = false;
        for (ri, r) in right.iter().enumerate() {
            let merged = merge_row(l, left_label, r, right_label);
            let keep = match kind {
                JoinKind::Cross => true,
                _ => on.map(|c| eval_condition(Some(c), &merged, subqueries)).unwrap_or(true),
            };
            if keep {
                out.push(merged);
                matched_any = true;
                right_matched[ri] = true;
            }
        }
        if !matched_any && matches!(kind, JoinKind::Left | JoinKind::Full) {
            out.push(merge_row(l, left_label, &null_right, right_label));
        }
    }

    if matches!(kind, JoinKind::Right | JoinKind::Full) {
        for (ri, r) in right.iter().enumerate() {
            if !right_matched[ri] {
                out.push(merge_row(&null_left, left_label, r, right_label));
            }
        }
    }
    out
}

pub(crate) fn default_label(expr: &Value) -> String {
    match expr {
        Value::String(s) => s.rsplit('.').next().unwrap_or(s).to_string(),
        Value::Map(m) => match m.get("fn") {
            Some(Value::String(name)) => name.to_lowercase(),
            _ => "expr".to_string(),
        },
        _ => "expr".to_string(),
    }
}

/// Project a `SELECT` list (§4.J), expanding `*`/`t.*` against the row as
/// it stands (post-join, post-aggregate).
pub fn project(rows: &[Row], items: &[SelectItem], subqueries: &ResolvedSubqueries) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let mut out = Row::new();
            for item in items {
                if let Value::String(s) = &item.expr {
                    if s == "*" {
                        for (k, v) in row {
                            if !k.contains('.') {
                                out.insert(k.clone(), v.clone());
                            }
                        }
                        continue;
                    }
                    if let Some(prefix) = s.strip_suffix(".*") {
                        let qualifier = format!("{prefix}.");
                        for (k, v) in row {
                            if let Some(rest) = k.strip_prefix(&qualifier) {
                                out.insert(rest.to_string(), v.clone());
                            }
                        }
                        continue;
                    }
                }
                let value = eval_scalar(&item.expr, row, subqueries);
                let name = item.alias.clone().unwrap_or_else(|| default_label(&item.expr));
                out.insert(name, value);
            }
            out
        })
        .collect()
}

/// `ORDER BY` (§4.J): stable multi-key sort, nulls placed first/last per
/// key (defaulting to nulls-last ascending, nulls-first descending, the
/// common SQL convention) unless an explicit `NULLS FIRST/LAST` override
/// is given.
pub fn order_by(mut rows: Vec<Row>, keys: &[OrderKey], subqueries: &ResolvedSubqueries) -> Vec<Row> {
    rows.sort_by(|a, b| {
        for key in keys {
            let va = eval_scalar(&key.expr, a, subqueries);
            let vb = eval_scalar(&key.expr, b, subqueries);
            let nulls_first = key.nulls_first.unwrap_or(key.desc);
            let ord = match (va.is_null(), vb.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => if nulls_first { Ordering::Less } else { Ordering::Greater },
                (false, true) => if nulls_first { Ordering::Greater } else { Ordering::Less },
                (false, false) => {
                    let ord = compare_values(&va, &vb);
                    if key.desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    rows
}

/// `LIMIT`/`OFFSET` (§4.J).
pub fn limit(rows: Vec<Row>, limit: Option<i64>, offset: Option<i64>) -> Vec<Row> {
    let offset = offset.unwrap_or(0).max(0) as usize;
    let rows: Vec<Row> = rows.into_iter().skip(offset).collect();
    match limit {
        Some(n) if n >= 0 => rows.into_iter().take(n as usize).collect(),
        _ => rows,
    }
}

/// `DISTINCT` / `DISTINCT ON (...)` (§4.J): `None` columns means a
/// full-row distinct.
pub fn distinct(rows: Vec<Row>, columns: Option<&[Value]>, subqueries: &ResolvedSubqueries) -> Vec<Row> {
    let mut seen: Vec<Vec<Value>> = Vec::new();
    let mut out = Vec::new();
    for row in rows {
        let key: Vec<Value> = match columns {
            Some(cols) if !cols.is_empty() => cols.iter().map(|c| eval_scalar(c, &row, subqueries)).collect(),
            _ => row.values().cloned().collect(),
        };
        if !seen.contains(&key) {
            seen.push(key);
            out.push(row);
        }
    }
    out
}

fn numeric_sum(values: &[Value]) -> Option<(f64, bool)> {
    let mut sum = 0.0;
    let mut all_int = true;
    let mut any = false;
    for v in values {
        if v.is_null() {
            continue;
        }
        any = true;
        if !matches!(v, Value::Int(_)) {
            all_int = false;
        }
        sum += v.as_f64()?;
    }
    if !any {
        return None;
    }
    Some((sum, all_int))
}

fn aggregate_value(call: &AggregateCall, values: Vec<Value>) -> Value {
    let values = if call.distinct {
        let mut seen = Vec::new();
        values.into_iter().filter(|v| {
            if seen.contains(v) {
                false
            } else {
                seen.push(v.clone());
                true
            }
        }).collect()
    } else {
        values
    };

    match call.func.as_str() {
        "COUNT" => {
            if call.arg.is_none() {
                Value::Int(values.len() as i64)
            } else {
                Value::Int(values.iter().filter(|v| !v.is_null()).count() as i64)
            }
        }
        "SUM" => match numeric_sum(&values) {
            Some((s, true)) => Value::Int(s as i64),
            Some((s, false)) => Value::Real(s),
            None => Value::Null,
        },
        "AVG" => {
            let non_null: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
            if non_null.is_empty() {
                return Value::Null;
            }
            let sum: f64 = non_null.iter().filter_map(|v| v.as_f64()).sum();
            Value::Real(sum / non_null.len() as f64)
        }
        "MIN" => values.into_iter().filter(|v| !v.is_null()).min_by(compare_values).unwrap_or(Value::Null),
        "MAX" => values.into_iter().filter(|v| !v.is_null()).max_by(compare_values).unwrap_or(Value::Null),
        "GROUP_CONCAT" => {
            let sep = call.separator.clone().unwrap_or_else(|| ",".to_string());
            let parts: Vec<String> = values.iter().filter(|v| !v.is_null()).filter_map(|v| v.as_string()).collect();
            Value::String(parts.join(&sep))
        }
        _ => Value::Null,
    }
}

/// `GROUP BY` + aggregate calls (§4.J), folding `HAVING` in as a
/// post-aggregate filter is the caller's job (run `filter` again on the
/// returned rows).
pub fn aggregate(rows: &[Row], group_by: &[Value], aggregates: &[AggregateCall], subqueries: &ResolvedSubqueries) -> Vec<Row> {
    let mut groups: Vec<(Vec<Value>, Vec<Row>)> = Vec::new();
    for row in rows {
        let key: Vec<Value> = group_by.iter().map(|g| eval_scalar(g, row, subqueries)).collect();
        if let Some((_, bucket)) = groups.iter_mut().find(|(k, _)| *k == key) {
            bucket.push(row.clone());
        } else {
            groups.push((key, vec![row.clone()]));
        }
    }
    if groups.is_empty() && group_by.is_empty() {
        groups.push((Vec::new(), rows.to_vec()));
    }

    groups
        .into_iter()
        .map(|(key, bucket)| {
            let mut out = Row::new();
            for (g, value) in group_by.iter().zip(key.iter()) {
                out.insert(default_label(g), value.clone());
            }
            for call in aggregates {
                let values: Vec<Value> = bucket.iter().map(|r| call.arg.as_ref().map(|a| eval_scalar(a, r, subqueries)).unwrap_or(Value::Null)).collect();
                out.insert(call.alias.clone(), aggregate_value(call, values));
            }
            // Carry the first bucket row's columns through too, so a
            // `GROUP BY` query can still reference non-aggregated,
            // functionally-dependent columns from the select list.
            if let Some(first) = bucket.first() {
                for (k, v) in first {
                    out.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
            out
        })
        .collect()
}

fn order_value(row: &Row, order_by: &[OrderKey], subqueries: &ResolvedSubqueries) -> Vec<Value> {
    order_by.iter().map(|k| eval_scalar(&k.expr, row, subqueries)).collect()
}

fn compare_order(a: &[Value], b: &[Value], order_by: &[OrderKey]) -> Ordering {
    for (i, key) in order_by.iter().enumerate() {
        let ord = compare_values(&a[i], &b[i]);
        let ord = if key.desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Window function calls (§4.J): partitions by `PARTITION BY`, orders
/// each partition by `ORDER BY`, and writes the computed value into
/// `call.alias` on every row of the partition.
pub fn window(rows: Vec<Row>, windows: &[WindowCall], subqueries: &ResolvedSubqueries) -> Vec<Row> {
    if windows.is_empty() {
        return rows;
    }
    let mut rows = rows;
    for call in windows {
        let mut partitions: BTreeMap<Vec<Value>, Vec<usize>> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            let key: Vec<Value> = call.partition_by.iter().map(|p| eval_scalar(p, row, subqueries)).collect();
            partitions.entry(key).or_default().push(i);
        }
        for (_key, mut idxs) in partitions {
            idxs.sort_by(|&ia, &ib| compare_order(&order_value(&rows[ia], &call.order_by, subqueries), &order_value(&rows[ib], &call.order_by, subqueries), &call.order_by));

            match call.func.as_str() {
                "ROW_NUMBER" => {
                    for (rank, &idx) in idxs.iter().enumerate() {
                        rows[idx].insert(call.alias.clone(), Value::Int(rank as i64 + 1));
                    }
                }
                "RANK" | "DENSE_RANK" => {
                    let mut rank = 0i64;
                    let mut dense = 0i64;
                    let mut prev: Option<Vec<Value>> = None;
                    for (pos, &idx) in idxs.iter().enumerate() {
                        let key = order_value(&rows[idx], &call.order_by, subqueries);
                        let tie = prev.as_ref().map(|p| *p == key).unwrap_or(false);
                        if !tie {
                            rank = pos as i64 + 1;
                            dense += 1;
                        }
                        prev = Some(key);
                        let value = if call.func == "RANK" { rank } else { dense };
                        rows[idx].insert(call.alias.clone(), Value::Int(value));
                    }
                }
                func => {
                    let values: Vec<Value> = idxs
                        .iter()
                        .map(|&idx| call.arg.as_ref().map(|a| eval_scalar(a, &rows[idx], subqueries)).unwrap_or(Value::Null))
                        .collect();
                    let pseudo = AggregateCall { func: func.to_string(), arg: call.arg.clone(), distinct: false, separator: None, alias: call.alias.clone() };
                    let value = aggregate_value(&pseudo, values);
                    for &idx in &idxs {
                        rows[idx].insert(call.alias.clone(), value.clone());
                    }
                }
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatedb_types::Value;

    fn row(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Row {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn limit_and_offset_slice_rows() {
        let rows = vec![row([("id", Value::Int(1))]), row([("id", Value::Int(2))]), row([("id", Value::Int(3))])];
        let out = limit(rows, Some(1), Some(1));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("id"), Some(&Value::Int(2)));
    }

    #[test]
    fn aggregate_sum_and_count_over_whole_table() {
        let rows = vec![row([("amount", Value::Int(10))]), row([("amount", Value::Int(5))])];
        let call = AggregateCall { func: "SUM".to_string(), arg: Some(Value::String("amount".to_string())), distinct: false, separator: None, alias: "total".to_string() };
        let out = aggregate(&rows, &[], &[call], &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("total"), Some(&Value::Int(15)));
    }

    #[test]
    fn left_join_pads_unmatched_left_rows_with_nulls() {
        let left = vec![row([("id", Value::Int(1))])];
        let right: Vec<Row> = vec![];
        let out = join(left, Some("a"), &["id".to_string()], right, Some("b"), &["id".to_string(), "a_id".to_string()], JoinKind::Left, None, &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("a_id"), Some(&Value::Null));
    }

    #[test]
    fn row_number_assigns_sequential_ranks_per_partition() {
        let rows = vec![row([("grp", Value::Int(1)), ("v", Value::Int(10))]), row([("grp", Value::Int(1)), ("v", Value::Int(5))])];
        let call = WindowCall {
            func: "ROW_NUMBER".to_string(),
            arg: None,
            partition_by: vec![Value::String("grp".to_string())],
            order_by: vec![OrderKey { expr: Value::String("v".to_string()), desc: false, nulls_first: None }],
            alias: "rn".to_string(),
        };
        let out = window(rows, &[call], &[]);
        let by_v5 = out.iter().find(|r| r.get("v") == Some(&Value::Int(5))).unwrap();
        assert_eq!(by_v5.get("rn"), Some(&Value::Int(1)));
    }
}
