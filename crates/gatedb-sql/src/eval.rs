//! The expression evaluator (§4.I): conditions and scalar expressions
//! represented as `Value` trees, interpreted against a row context.
//!
//! Subqueries are resolved out of line: `resolved_subqueries[i]` holds the
//! already-executed, single-column values for the `i`th entry of the
//! owning `Plan`'s `subqueries` list (§9d, non-correlated execution is
//! sufficient, so the executor runs each subquery exactly once — taking
//! its first projected column, in select-list order, since a `Row`'s
//! `BTreeMap` storage doesn't preserve that order itself — before
//! evaluating any row, and hands the values down here rather than
//! re-running the subquery per row).

use gatedb_types::{compare_values, Row, Value};

use crate::error::ParseError;

/// The first-column values of each of the owning plan's non-correlated
/// subqueries, indexed the same way the parser assigned
/// `{"__subquery__": idx}` / `{"exists": idx}` / `{"in_subquery": idx}`
/// markers. An empty inner `Vec` means that subquery produced no rows.
pub type ResolvedSubqueries = [Vec<Value>];

/// Evaluate a `Condition` tree against a row. `None`/`Value::Null` is
/// vacuously true (§4.I "`null` or missing condition → true").
pub fn eval_condition(cond: Option<&Value>, row: &Row, subqueries: &ResolvedSubqueries) -> bool {
    let Some(cond) = cond else { return true };
    eval_condition_value(cond, row, subqueries)
}

fn eval_condition_value(cond: &Value, row: &Row, subqueries: &ResolvedSubqueries) -> bool {
    if cond.is_null() {
        return true;
    }
    let Value::Map(m) = cond else { return true };

    if let Some(Value::Seq(conds)) = m.get("and") {
        return conds.iter().all(|c| eval_condition_value(c, row, subqueries));
    }
    if let Some(Value::Seq(conds)) = m.get("or") {
        return conds.iter().any(|c| eval_condition_value(c, row, subqueries));
    }
    if let Some(inner) = m.get("not") {
        return !eval_condition_value(inner, row, subqueries);
    }
    if let Some(Value::Int(idx)) = m.get("exists") {
        return subqueries.get(*idx as usize).is_some_and(|r| !r.is_empty());
    }
    if let Some(Value::Int(idx)) = m.get("not_exists") {
        return subqueries.get(*idx as usize).map(|r| r.is_empty()).unwrap_or(true);
    }

    let Some(expr) = m.get("column") else { return true };
    let Some(Value::String(op)) = m.get("op") else { return true };
    let left = eval_scalar(expr, row, subqueries);

    match op.as_str() {
        "is_null" => left.is_null(),
        "is_not_null" => !left.is_null(),
        "in" | "not_in" => {
            let items = resolve_membership_list(m, row, subqueries);
            let hit = items.iter().any(|v| values_equal(&left, v));
            if op == "in" {
                hit
            } else {
                !left.is_null() && !hit
            }
        }
        "between" | "not_between" => {
            if left.is_null() {
                return false;
            }
            let lo = m.get("value").map(|v| eval_scalar(v, row, subqueries)).unwrap_or(Value::Null);
            let hi = m.get("value2").map(|v| eval_scalar(v, row, subqueries)).unwrap_or(Value::Null);
            if lo.is_null() || hi.is_null() {
                return false;
            }
            let within = compare_coerced(&left, &lo) != std::cmp::Ordering::Less
                && compare_coerced(&left, &hi) != std::cmp::Ordering::Greater;
            if op == "between" {
                within
            } else {
                !within
            }
        }
        "like" | "ilike" => {
            let Some(Value::String(pattern)) = m.get("value").map(|v| eval_scalar(v, row, subqueries)) else {
                return false;
            };
            let Some(text) = left.as_string() else { return false };
            like_match(&text, &pattern, op == "ilike")
        }
        _ => {
            if left.is_null() {
                return false;
            }
            let right = m.get("value").map(|v| eval_scalar(v, row, subqueries)).unwrap_or(Value::Null);
            if right.is_null() {
                return false;
            }
            let ord = compare_coerced(&left, &right);
            match op.as_str() {
                "=" => ord == std::cmp::Ordering::Equal,
                "!=" | "<>" => ord != std::cmp::Ordering::Equal,
                "<" => ord == std::cmp::Ordering::Less,
                ">" => ord == std::cmp::Ordering::Greater,
                "<=" => ord != std::cmp::Ordering::Greater,
                ">=" => ord != std::cmp::Ordering::Less,
                _ => false,
            }
        }
    }
}

fn resolve_membership_list(m: &std::collections::BTreeMap<String, Value>, row: &Row, subqueries: &ResolvedSubqueries) -> Vec<Value> {
    if let Some(Value::Int(idx)) = m.get("in_subquery") {
        return subqueries.get(*idx as usize).cloned().unwrap_or_default();
    }
    match m.get("value") {
        Some(v) => match eval_scalar(v, row, subqueries) {
            Value::Seq(items) => items,
            other => vec![other],
        },
        None => Vec::new(),
    }
}

/// Best-effort numeric/string coercion for comparisons (§4.I "Type
/// coercion: numeric ↔ string attempted best-effort").
fn compare_coerced(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::String(_), Value::Int(_) | Value::Real(_)) | (Value::Int(_) | Value::Real(_), Value::String(_)) => {
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                _ => compare_values(a, b),
            }
        }
        _ => compare_values(a, b),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_coerced(a, b) == std::cmp::Ordering::Equal
}

fn like_match(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.to_string())
    };
    like_match_chars(&text.chars().collect::<Vec<_>>(), &pattern.chars().collect::<Vec<_>>())
}

fn like_match_chars(text: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => {
            like_match_chars(text, &pattern[1..])
                || (!text.is_empty() && like_match_chars(&text[1..], pattern))
        }
        Some('_') => !text.is_empty() && like_match_chars(&text[1..], &pattern[1..]),
        Some(c) => !text.is_empty() && text[0] == *c && like_match_chars(&text[1..], &pattern[1..]),
    }
}

/// Evaluate a scalar expression (§4.I) against a row.
pub fn eval_scalar(expr: &Value, row: &Row, subqueries: &ResolvedSubqueries) -> Value {
    match expr {
        Value::String(col) => lookup_column(row, col),
        Value::Int(_) | Value::Real(_) | Value::Bool(_) | Value::Null => expr.clone(),
        Value::Seq(items) => Value::Seq(items.iter().map(|v| eval_scalar(v, row, subqueries)).collect()),
        Value::Map(m) => {
            if let Some(v) = m.get("literal") {
                return v.clone();
            }
            if let Some(Value::Int(idx)) = m.get("__subquery__") {
                return subqueries.get(*idx as usize).and_then(|vals| vals.first()).cloned().unwrap_or(Value::Null);
            }
            if let (Some(op), Some(left), Some(right)) = (m.get("op"), m.get("left"), m.get("right")) {
                let Value::String(op) = op else { return Value::Null };
                return eval_binary_op(op, &eval_scalar(left, row, subqueries), &eval_scalar(right, row, subqueries));
            }
            if let Some(Value::String(name)) = m.get("fn") {
                let args: Vec<Value> = match m.get("args") {
                    Some(Value::Seq(items)) => items.iter().map(|a| eval_scalar(a, row, subqueries)).collect(),
                    _ => Vec::new(),
                };
                return crate::functions::call(name, &args).unwrap_or(Value::Null);
            }
            if let Some(Value::Seq(branches)) = m.get("case") {
                for branch in branches {
                    let Value::Map(b) = branch else { continue };
                    let when = b.get("when");
                    let matched = when.map(|w| eval_condition_value(w, row, subqueries)).unwrap_or(false);
                    if matched {
                        return b.get("then").map(|t| eval_scalar(t, row, subqueries)).unwrap_or(Value::Null);
                    }
                }
                return m.get("else").map(|e| eval_scalar(e, row, subqueries)).unwrap_or(Value::Null);
            }
            if let Some(Value::Seq(items)) = m.get("coalesce") {
                for item in items {
                    let v = eval_scalar(item, row, subqueries);
                    if !v.is_null() {
                        return v;
                    }
                }
                return Value::Null;
            }
            Value::Null
        }
    }
}

fn lookup_column(row: &Row, name: &str) -> Value {
    if let Some(v) = row.get(name) {
        return v.clone();
    }
    // Qualified `t.col`: fall back to the unqualified name.
    if let Some(dot) = name.rfind('.') {
        if let Some(v) = row.get(&name[dot + 1..]) {
            return v.clone();
        }
    }
    Value::Null
}

fn eval_binary_op(op: &str, left: &Value, right: &Value) -> Value {
    if op == "||" {
        return match (left.as_string(), right.as_string()) {
            (Some(a), Some(b)) => Value::String(a + &b),
            _ => Value::Null,
        };
    }
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else { return Value::Null };
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => {
            if b == 0.0 {
                return Value::Null;
            }
            a / b
        }
        "%" => {
            if b == 0.0 {
                return Value::Null;
            }
            a % b
        }
        _ => return Value::Null,
    };
    if matches!(left, Value::Int(_)) && matches!(right, Value::Int(_)) && result.fract() == 0.0 && op != "/" {
        Value::Int(result as i64)
    } else if op == "/" && matches!(left, Value::Int(_)) && matches!(right, Value::Int(_)) {
        // Integer division mirrors SQL's truncating division when both
        // operands are integers and divide evenly; otherwise falls
        // through to real.
        if result.fract() == 0.0 {
            Value::Int(result as i64)
        } else {
            Value::Real(result)
        }
    } else {
        Value::Real(result)
    }
}

/// Validate that a function name exists in the built-in catalog (§6.E),
/// used by the parser to reject typos early.
pub fn is_known_function(name: &str) -> bool {
    crate::functions::is_known(name)
}

/// Surface a parse-time error for an unknown function name.
pub fn require_known_function(name: &str) -> Result<(), ParseError> {
    if is_known_function(name) {
        Ok(())
    } else {
        Err(ParseError::UnknownName { what: "function", name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatedb_types::Value;

    fn row(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Row {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn null_condition_is_vacuously_true() {
        assert!(eval_condition(None, &Row::new(), &[]));
        assert!(eval_condition(Some(&Value::Null), &Row::new(), &[]));
    }

    #[test]
    fn comparison_with_null_operand_is_false() {
        let r = row([("age", Value::Null)]);
        let cond = Value::map([
            ("column".into(), Value::String("age".into())),
            ("op".into(), Value::String("=".into())),
            ("value".into(), Value::map([("literal".into(), Value::Int(5))])),
        ]);
        assert!(!eval_condition(Some(&cond), &r, &[]));
    }

    #[test]
    fn like_supports_percent_and_underscore() {
        assert!(like_match("hello", "h%o", false));
        assert!(like_match("hello", "h_llo", false));
        assert!(!like_match("hello", "h_o", false));
        assert!(like_match("HELLO", "hello", true));
    }

    #[test]
    fn and_or_not_compose() {
        let r = row([("x", Value::Int(5))]);
        let gt = |n: i64| {
            Value::map([
                ("column".into(), Value::String("x".into())),
                ("op".into(), Value::String(">".into())),
                ("value".into(), Value::map([("literal".into(), Value::Int(n))])),
            ])
        };
        let cond = Value::map([("and".into(), Value::Seq(vec![gt(1), gt(4)]))]);
        assert!(eval_condition(Some(&cond), &r, &[]));
        let cond = Value::map([("not".into(), gt(10))]);
        assert!(eval_condition(Some(&cond), &r, &[]));
    }

    #[test]
    fn division_by_zero_is_null() {
        let r = Row::new();
        let expr = Value::map([
            ("op".into(), Value::String("/".into())),
            ("left".into(), Value::map([("literal".into(), Value::Int(1))])),
            ("right".into(), Value::map([("literal".into(), Value::Int(0))])),
        ]);
        assert_eq!(eval_scalar(&expr, &r, &[]), Value::Null);
    }

    #[test]
    fn coalesce_returns_first_non_null() {
        let r = Row::new();
        let expr = Value::map([(
            "coalesce".into(),
            Value::Seq(vec![Value::Null, Value::map([("literal".into(), Value::Int(3))])]),
        )]);
        assert_eq!(eval_scalar(&expr, &r, &[]), Value::Int(3));
    }

    #[test]
    fn qualified_column_falls_back_to_bare_name() {
        let r = row([("name", Value::String("Alice".into()))]);
        assert_eq!(eval_scalar(&Value::String("t.name".into()), &r, &[]), Value::String("Alice".into()));
    }
}
