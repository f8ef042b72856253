//! Expression grammar (condition + scalar) and the `SELECT` family
//! (§4.I, §6.A query grammar).

use gatedb_types::Value;

use super::Parser;
use crate::ast::{AggregateCall, CteDef, JoinClause, JoinKind, OrderKey, Plan, PlanSource, SelectItem, WindowCall};
use crate::error::ParseError;
use crate::eval::require_known_function;
use crate::lexer::TokenKind;

const AGGREGATE_NAMES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX", "GROUP_CONCAT"];
const WINDOW_ONLY_NAMES: &[&str] = &["ROW_NUMBER", "RANK", "DENSE_RANK"];

/// Accumulates the out-of-line structures a single statement's
/// expressions produce: non-correlated subqueries, aggregate calls, and
/// window calls, each referenced from inside a `Value` tree by the index
/// it was pushed at.
#[derive(Default)]
pub(crate) struct ExprCtx {
    pub(crate) subqueries: Vec<Plan>,
    pub(crate) aggregates: Vec<AggregateCall>,
    pub(crate) windows: Vec<WindowCall>,
}

/// Parse a boolean condition (§4.I "Condition").
pub(crate) fn parse_condition(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    parse_or(p, ctx)
}

fn parse_or(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    let mut left = parse_and(p, ctx)?;
    while p.eat_keyword("OR") {
        let right = parse_and(p, ctx)?;
        left = Value::map([("or".into(), Value::Seq(vec![left, right]))]);
    }
    Ok(left)
}

fn parse_and(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    let mut left = parse_not(p, ctx)?;
    while p.eat_keyword("AND") {
        let right = parse_not(p, ctx)?;
        left = Value::map([("and".into(), Value::Seq(vec![left, right]))]);
    }
    Ok(left)
}

fn parse_not(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    if p.eat_keyword("NOT") {
        let inner = parse_not(p, ctx)?;
        return Ok(Value::map([("not".into(), inner)]));
    }
    parse_cond_primary(p, ctx)
}

fn parse_cond_primary(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    if p.eat_symbol("(") {
        let inner = parse_or(p, ctx)?;
        p.expect_symbol(")")?;
        return Ok(inner);
    }
    if p.eat_keyword("EXISTS") {
        p.expect_symbol("(")?;
        let plan = parse_select(p)?;
        p.expect_symbol(")")?;
        let idx = ctx.subqueries.len() as i64;
        ctx.subqueries.push(plan);
        return Ok(Value::map([("exists".into(), Value::Int(idx))]));
    }

    let left = parse_scalar(p, ctx)?;

    let negate = p.eat_keyword("NOT");

    if p.eat_keyword("IS") {
        let is_not = p.eat_keyword("NOT");
        p.expect_keyword("NULL")?;
        let op = if is_not { "is_not_null" } else { "is_null" };
        return Ok(comparison(left, op, None));
    }
    if p.eat_keyword("IN") {
        p.expect_symbol("(")?;
        let value = if p.peek().map(|t| t.kind == TokenKind::Keyword && (t.text == "SELECT" || t.text == "WITH")).unwrap_or(false) {
            let plan = parse_select(p)?;
            let idx = ctx.subqueries.len() as i64;
            ctx.subqueries.push(plan);
            Value::map([("in_subquery".into(), Value::Int(idx))])
        } else {
            let mut items = Vec::new();
            loop {
                items.push(parse_scalar(p, ctx)?);
                if p.eat_symbol(",") {
                    continue;
                }
                break;
            }
            Value::Seq(items)
        };
        p.expect_symbol(")")?;
        let op = if negate { "not_in" } else { "in" };
        return Ok(comparison(left, op, Some(value)));
    }
    if p.eat_keyword("BETWEEN") {
        let lo = parse_scalar(p, ctx)?;
        p.expect_keyword("AND")?;
        let hi = parse_scalar(p, ctx)?;
        let op = if negate { "not_between" } else { "between" };
        let mut m = std::collections::BTreeMap::new();
        m.insert("column".to_string(), left);
        m.insert("op".to_string(), Value::String(op.to_string()));
        m.insert("value".to_string(), lo);
        m.insert("value2".to_string(), hi);
        return Ok(Value::Map(m));
    }
    if p.is_keyword("LIKE") || p.is_keyword("ILIKE") {
        let ci = p.eat_keyword("ILIKE");
        if !ci {
            p.expect_keyword("LIKE")?;
        }
        let pattern = parse_scalar(p, ctx)?;
        let op = if ci { "ilike" } else { "like" };
        return Ok(comparison(left, op, Some(pattern)));
    }
    if negate {
        return Err(ParseError::UnexpectedToken("expected IN/BETWEEN/LIKE after NOT".to_string()));
    }

    for op in ["<>", "!=", ">=", "<=", "=", "<", ">"] {
        if p.is_operator(op) {
            p.advance();
            let right = parse_scalar(p, ctx)?;
            return Ok(comparison(left, op, Some(right)));
        }
    }

    // A bare value used as a condition (e.g. a boolean column) is true
    // when it isn't `false`/null.
    Ok(comparison(left, "!=", Some(Value::map([("literal".into(), Value::Bool(false))]))))
}

fn comparison(left: Value, op: &str, value: Option<Value>) -> Value {
    let mut m = std::collections::BTreeMap::new();
    m.insert("column".to_string(), left);
    m.insert("op".to_string(), Value::String(op.to_string()));
    if let Some(v) = value {
        m.insert("value".to_string(), v);
    }
    Value::Map(m)
}

/// Parse a scalar expression (§4.I "Scalar expression").
pub(crate) fn parse_scalar(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    parse_concat(p, ctx)
}

fn parse_concat(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    let mut left = parse_add(p, ctx)?;
    while p.eat_operator("||") {
        let right = parse_add(p, ctx)?;
        left = binop("||", left, right);
    }
    Ok(left)
}

fn parse_add(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    let mut left = parse_mul(p, ctx)?;
    loop {
        let op = if p.is_operator("+") {
            "+"
        } else if p.is_operator("-") {
            "-"
        } else {
            break;
        };
        p.advance();
        let right = parse_mul(p, ctx)?;
        left = binop(op, left, right);
    }
    Ok(left)
}

fn parse_mul(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    let mut left = parse_unary(p, ctx)?;
    loop {
        let op = if p.is_operator("*") {
            "*"
        } else if p.is_operator("/") {
            "/"
        } else if p.is_operator("%") {
            "%"
        } else {
            break;
        };
        p.advance();
        let right = parse_unary(p, ctx)?;
        left = binop(op, left, right);
    }
    Ok(left)
}

fn parse_unary(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    if p.eat_operator("-") {
        let inner = parse_unary(p, ctx)?;
        return Ok(binop("-", Value::map([("literal".into(), Value::Int(0))]), inner));
    }
    parse_primary(p, ctx)
}

fn binop(op: &str, left: Value, right: Value) -> Value {
    Value::map([("op".into(), Value::String(op.to_string())), ("left".into(), left), ("right".into(), right)])
}

fn parse_primary(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    let Some(tok) = p.peek().cloned() else { return Err(p.eof_err("an expression")) };

    match tok.kind {
        TokenKind::Number => {
            p.advance();
            let v = if tok.text.contains('.') {
                Value::Real(tok.text.parse().unwrap_or(0.0))
            } else {
                tok.text.parse::<i64>().map(Value::Int).unwrap_or_else(|_| Value::Real(tok.text.parse().unwrap_or(0.0)))
            };
            Ok(Value::map([("literal".into(), v)]))
        }
        TokenKind::String => {
            p.advance();
            Ok(Value::map([("literal".into(), Value::String(tok.text.clone()))]))
        }
        TokenKind::Boolean => {
            p.advance();
            Ok(Value::map([("literal".into(), Value::Bool(tok.text == "true"))]))
        }
        TokenKind::Null => {
            p.advance();
            Ok(Value::Null)
        }
        TokenKind::Symbol if tok.text == "(" => {
            p.advance();
            if p.peek().map(|t| t.kind == TokenKind::Keyword && (t.text == "SELECT" || t.text == "WITH")).unwrap_or(false) {
                let plan = parse_select(p)?;
                p.expect_symbol(")")?;
                let idx = ctx.subqueries.len() as i64;
                ctx.subqueries.push(plan);
                return Ok(Value::map([("__subquery__".into(), Value::Int(idx))]));
            }
            let inner = parse_scalar(p, ctx)?;
            p.expect_symbol(")")?;
            Ok(inner)
        }
        TokenKind::Keyword if tok.text == "CASE" => parse_case(p, ctx),
        TokenKind::Keyword if tok.text == "CAST" => parse_cast(p, ctx),
        TokenKind::Keyword if AGGREGATE_NAMES.contains(&tok.text.as_str()) => parse_call(p, ctx, &tok.text),
        TokenKind::Keyword if WINDOW_ONLY_NAMES.contains(&tok.text.as_str()) => parse_call(p, ctx, &tok.text),
        TokenKind::Keyword if tok.text == "IIF" => parse_call(p, ctx, &tok.text),
        TokenKind::Identifier => {
            p.advance();
            if p.is_symbol("(") {
                return parse_call(p, ctx, &tok.text);
            }
            let mut name = tok.text.clone();
            while p.eat_symbol(".") {
                let next = p.expect_identifier()?;
                name = format!("{name}.{next}");
            }
            Ok(Value::String(name))
        }
        _ => Err(ParseError::UnexpectedToken(format!("unexpected token in expression: {}", tok.text))),
    }
}

fn parse_case(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    p.expect_keyword("CASE")?;
    let operand = if p.is_keyword("WHEN") { None } else { Some(parse_scalar(p, ctx)?) };
    let mut branches = Vec::new();
    while p.eat_keyword("WHEN") {
        let when_val = parse_scalar_or_condition(p, ctx, &operand)?;
        p.expect_keyword("THEN")?;
        let then_expr = parse_scalar(p, ctx)?;
        branches.push(Value::map([("when".into(), when_val), ("then".into(), then_expr)]));
    }
    let else_expr = if p.eat_keyword("ELSE") { parse_scalar(p, ctx)? } else { Value::Null };
    p.expect_keyword("END")?;
    Ok(Value::map([("case".into(), Value::Seq(branches)), ("else".into(), else_expr)]))
}

fn parse_scalar_or_condition(p: &mut Parser<'_>, ctx: &mut ExprCtx, operand: &Option<Value>) -> Result<Value, ParseError> {
    match operand {
        Some(lhs) => {
            let rhs = parse_scalar(p, ctx)?;
            Ok(comparison(lhs.clone(), "=", Some(rhs)))
        }
        None => parse_condition(p, ctx),
    }
}

fn parse_cast(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Value, ParseError> {
    p.expect_keyword("CAST")?;
    p.expect_symbol("(")?;
    let expr = parse_scalar(p, ctx)?;
    p.expect_keyword("AS")?;
    let type_name = p.expect_identifier()?;
    p.expect_symbol(")")?;
    Ok(Value::map([
        ("fn".into(), Value::String("CAST".to_string())),
        ("args".into(), Value::Seq(vec![expr, Value::map([("literal".into(), Value::String(type_name.to_uppercase()))])])),
    ]))
}

fn parse_call(p: &mut Parser<'_>, ctx: &mut ExprCtx, name: &str) -> Result<Value, ParseError> {
    let name = name.to_ascii_uppercase();
    p.advance(); // the function/keyword token itself
    p.expect_symbol("(")?;

    let distinct = p.eat_keyword("DISTINCT");
    let star = p.eat_symbol("*");
    let mut args = Vec::new();
    if !star && !p.is_symbol(")") {
        loop {
            args.push(parse_scalar(p, ctx)?);
            if p.eat_symbol(",") {
                continue;
            }
            break;
        }
    }
    let mut separator = None;
    if name == "GROUP_CONCAT" && p.eat_keyword("SEPARATOR") {
        if let Some(tok) = p.peek().cloned() {
            if tok.kind == TokenKind::String {
                p.advance();
                separator = Some(tok.text);
            }
        }
    }
    p.expect_symbol(")")?;

    if p.eat_keyword("OVER") {
        p.expect_symbol("(")?;
        let mut partition_by = Vec::new();
        if p.eat_keyword("PARTITION") {
            p.expect_keyword("BY")?;
            loop {
                partition_by.push(parse_scalar(p, ctx)?);
                if p.eat_symbol(",") {
                    continue;
                }
                break;
            }
        }
        let order_by = if p.eat_keyword("ORDER") {
            p.expect_keyword("BY")?;
            parse_order_keys(p, ctx)?
        } else {
            Vec::new()
        };
        p.expect_symbol(")")?;
        let alias = format!("__win{}", ctx.windows.len());
        ctx.windows.push(WindowCall { func: name, arg: args.into_iter().next(), partition_by, order_by, alias: alias.clone() });
        return Ok(Value::String(alias));
    }

    if WINDOW_ONLY_NAMES.contains(&name.as_str()) {
        return Err(ParseError::UnexpectedToken(format!("{name} requires an OVER clause")));
    }

    if AGGREGATE_NAMES.contains(&name.as_str()) {
        let alias = format!("__agg{}", ctx.aggregates.len());
        let arg = if star { None } else { args.into_iter().next() };
        ctx.aggregates.push(AggregateCall { func: name, arg, distinct, separator, alias: alias.clone() });
        return Ok(Value::String(alias));
    }

    require_known_function(&name)?;
    Ok(Value::map([("fn".into(), Value::String(name)), ("args".into(), Value::Seq(args))]))
}

fn parse_order_keys(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Vec<OrderKey>, ParseError> {
    let mut keys = Vec::new();
    loop {
        let expr = parse_scalar(p, ctx)?;
        let desc = if p.eat_keyword("DESC") {
            true
        } else {
            p.eat_keyword("ASC");
            false
        };
        let nulls_first = if p.eat_keyword("NULLS") {
            if p.eat_keyword("FIRST") {
                Some(true)
            } else {
                p.expect_keyword("LAST")?;
                Some(false)
            }
        } else {
            None
        };
        keys.push(OrderKey { expr, desc, nulls_first });
        if p.eat_symbol(",") {
            continue;
        }
        break;
    }
    Ok(keys)
}

/// Parse one `SELECT` (or `WITH ... SELECT`) statement into a [`Plan`],
/// stopping before a trailing `;` or end of input. Does not itself
/// consume a top-level `UNION` continuation beyond what `parse_select`
/// recurses into.
pub fn parse_select(p: &mut Parser<'_>) -> Result<Plan, ParseError> {
    let mut plan = Plan::default();
    let mut ctx = ExprCtx::default();

    if p.eat_keyword("WITH") {
        p.eat_keyword("RECURSIVE");
        loop {
            let name = p.expect_identifier()?;
            let columns = if p.is_symbol("(") { p.parse_column_list()? } else { Vec::new() };
            p.expect_keyword("AS")?;
            p.expect_symbol("(")?;
            let first = parse_select(p)?;
            let (anchor, recursive_term) = if p.eat_keyword("UNION") {
                p.eat_keyword("ALL");
                let mut second = parse_select(p)?;
                rewrite_self_references(&mut second, &name);
                (first, Some(Box::new(second)))
            } else {
                (first, None)
            };
            p.expect_symbol(")")?;
            plan.ctes.push(CteDef { name, columns, anchor: Box::new(anchor), recursive_term });
            if p.eat_symbol(",") {
                continue;
            }
            break;
        }
    }

    p.expect_keyword("SELECT")?;
    let distinct = if p.eat_keyword("DISTINCT") {
        if p.is_symbol("(") {
            Some(parse_expr_list_parenthesized(p, &mut ctx)?)
        } else {
            Some(Vec::new())
        }
    } else {
        None
    };

    let select = parse_select_items(p, &mut ctx)?;

    let cte_names: Vec<String> = plan.ctes.iter().map(|c| c.name.clone()).collect();

    let source = if p.eat_keyword("FROM") {
        parse_table_ref(p, &cte_names)?
    } else {
        PlanSource::None
    };

    let mut joins = Vec::new();
    loop {
        let kind = if p.eat_keyword("JOIN") {
            JoinKind::Inner
        } else if p.eat_keyword("INNER") {
            p.expect_keyword("JOIN")?;
            JoinKind::Inner
        } else if p.eat_keyword("LEFT") {
            p.eat_keyword("OUTER");
            p.expect_keyword("JOIN")?;
            JoinKind::Left
        } else if p.eat_keyword("RIGHT") {
            p.eat_keyword("OUTER");
            p.expect_keyword("JOIN")?;
            JoinKind::Right
        } else if p.eat_keyword("FULL") {
            p.eat_keyword("OUTER");
            p.expect_keyword("JOIN")?;
            JoinKind::Full
        } else if p.eat_keyword("CROSS") {
            p.expect_keyword("JOIN")?;
            JoinKind::Cross
        } else {
            break;
        };
        let right = parse_table_ref(p, &cte_names)?;
        let on = if kind != JoinKind::Cross {
            p.expect_keyword("ON")?;
            Some(parse_condition(p, &mut ctx)?)
        } else {
            None
        };
        joins.push(JoinClause { kind, right, on });
    }

    let filter = if p.eat_keyword("WHERE") { Some(parse_condition(p, &mut ctx)?) } else { None };

    let group_by = if p.eat_keyword("GROUP") {
        p.expect_keyword("BY")?;
        parse_expr_list(p, &mut ctx)?
    } else {
        Vec::new()
    };

    let having = if p.eat_keyword("HAVING") { Some(parse_condition(p, &mut ctx)?) } else { None };

    let order_by = if p.eat_keyword("ORDER") {
        p.expect_keyword("BY")?;
        parse_order_keys(p, &mut ctx)?
    } else {
        Vec::new()
    };

    let limit = if p.eat_keyword("LIMIT") { Some(parse_int_literal(p)?) } else { None };
    let offset = if p.eat_keyword("OFFSET") { Some(parse_int_literal(p)?) } else { None };

    let union = if p.eat_keyword("UNION") {
        let all = p.eat_keyword("ALL");
        let other = parse_select(p)?;
        Some((all, Box::new(other)))
    } else {
        None
    };

    plan.source = source;
    plan.joins = joins;
    plan.filter = filter;
    plan.group_by = group_by;
    plan.aggregates = ctx.aggregates;
    plan.having = having;
    plan.windows = ctx.windows;
    plan.select = select;
    plan.distinct = distinct;
    plan.order_by = order_by;
    plan.limit = limit;
    plan.offset = offset;
    plan.union = union;
    plan.subqueries = ctx.subqueries;
    Ok(plan)
}

fn parse_int_literal(p: &mut Parser<'_>) -> Result<i64, ParseError> {
    match p.peek().cloned() {
        Some(t) if t.kind == TokenKind::Number => {
            p.advance();
            t.text.parse::<i64>().map_err(|_| ParseError::UnexpectedToken(format!("expected integer, found {}", t.text)))
        }
        Some(t) => Err(ParseError::UnexpectedToken(format!("expected integer, found {}", t.text))),
        None => Err(p.eof_err("an integer")),
    }
}

fn parse_expr_list(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Vec<Value>, ParseError> {
    let mut items = Vec::new();
    loop {
        items.push(parse_scalar(p, ctx)?);
        if p.eat_symbol(",") {
            continue;
        }
        break;
    }
    Ok(items)
}

fn parse_expr_list_parenthesized(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Vec<Value>, ParseError> {
    p.expect_symbol("(")?;
    let items = parse_expr_list(p, ctx)?;
    p.expect_symbol(")")?;
    Ok(items)
}

pub(crate) fn parse_select_items(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Vec<SelectItem>, ParseError> {
    let mut items = Vec::new();
    loop {
        if p.eat_symbol("*") {
            items.push(SelectItem { expr: Value::String("*".to_string()), alias: None });
        } else if p.peek().map(|t| t.kind == TokenKind::Identifier).unwrap_or(false)
            && p.peek_n(1).map(|t| t.text == ".").unwrap_or(false)
            && p.peek_n(2).map(|t| t.text == "*").unwrap_or(false)
        {
            let table = p.advance().unwrap().text;
            p.advance();
            p.advance();
            items.push(SelectItem { expr: Value::String(format!("{table}.*")), alias: None });
        } else {
            let expr = parse_scalar(p, ctx)?;
            let alias = p.parse_optional_alias();
            items.push(SelectItem { expr, alias });
        }
        if p.eat_symbol(",") {
            continue;
        }
        break;
    }
    Ok(items)
}

/// A recursive CTE's term parses with no knowledge of the enclosing
/// `WITH` name (it's a self-contained `parse_select` call), so a
/// self-reference like `FROM name` comes back as `PlanSource::Table`
/// rather than `PlanSource::CteRef`. Patch that up after the fact.
fn rewrite_self_references(plan: &mut Plan, cte_name: &str) {
    fn rewrite(source: &mut PlanSource, cte_name: &str) {
        match source {
            PlanSource::Table { name, alias } if name.eq_ignore_ascii_case(cte_name) => {
                *source = PlanSource::CteRef { name: std::mem::take(name), alias: alias.take() };
            }
            _ => {}
        }
    }
    rewrite(&mut plan.source, cte_name);
    for join in &mut plan.joins {
        rewrite(&mut join.right, cte_name);
    }
}

fn parse_table_ref(p: &mut Parser<'_>, cte_names: &[String]) -> Result<PlanSource, ParseError> {
    if p.eat_symbol("(") {
        let plan = parse_select(p)?;
        p.expect_symbol(")")?;
        let alias = p.parse_optional_alias().ok_or_else(|| ParseError::UnexpectedToken("derived table requires an alias".to_string()))?;
        return Ok(PlanSource::SubPlan { plan: Box::new(plan), alias });
    }
    let name = p.expect_identifier()?;
    let alias = p.parse_optional_alias();
    if cte_names.iter().any(|c| c.eq_ignore_ascii_case(&name)) {
        return Ok(PlanSource::CteRef { name, alias });
    }
    Ok(PlanSource::Table { name, alias })
}
