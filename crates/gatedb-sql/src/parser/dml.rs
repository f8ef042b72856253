//! `INSERT`/`UPDATE`/`DELETE` statement parsing (§6.A DML).

use gatedb_types::Value;

use super::select::{parse_condition, parse_scalar, parse_select, parse_select_items, ExprCtx};
use super::Parser;
use crate::ast::{OnConflict, SelectItem, Statement};
use crate::error::ParseError;

pub(crate) fn parse_insert(p: &mut Parser<'_>) -> Result<Statement, ParseError> {
    p.expect_keyword("INSERT")?;
    p.expect_keyword("INTO")?;
    let table = p.expect_identifier()?;
    let columns = if p.is_symbol("(") { Some(p.parse_column_list()?) } else { None };

    if p.eat_keyword("DEFAULT") {
        p.expect_keyword("VALUES")?;
        return Ok(Statement::Insert { table, columns, rows: vec![Vec::new()], on_conflict: None, returning: Vec::new() });
    }

    if p.is_keyword("SELECT") || p.is_keyword("WITH") {
        let plan = parse_select(p)?;
        return Ok(Statement::InsertSelect { table, columns, plan: Box::new(plan) });
    }

    p.expect_keyword("VALUES")?;
    let mut ctx = ExprCtx::default();
    let mut rows = Vec::new();
    loop {
        p.expect_symbol("(")?;
        let mut row = Vec::new();
        if !p.is_symbol(")") {
            loop {
                row.push(parse_scalar(p, &mut ctx)?);
                if p.eat_symbol(",") {
                    continue;
                }
                break;
            }
        }
        p.expect_symbol(")")?;
        rows.push(row);
        if p.eat_symbol(",") {
            continue;
        }
        break;
    }

    let on_conflict = if p.eat_keyword("ON") {
        p.expect_keyword("CONFLICT")?;
        p.expect_symbol("(")?;
        let column = p.expect_identifier()?;
        p.expect_symbol(")")?;
        p.expect_keyword("DO")?;
        if p.eat_keyword("NOTHING") {
            Some(OnConflict::DoNothing { column })
        } else {
            p.expect_keyword("UPDATE")?;
            p.expect_keyword("SET")?;
            let changes = parse_set_list(p, &mut ctx)?;
            Some(OnConflict::DoUpdate { column, changes })
        }
    } else {
        None
    };

    let returning = parse_returning(p, &mut ctx)?;
    reject_subqueries(&ctx, "INSERT")?;
    Ok(Statement::Insert { table, columns, rows, on_conflict, returning })
}

pub(crate) fn parse_update(p: &mut Parser<'_>) -> Result<Statement, ParseError> {
    p.expect_keyword("UPDATE")?;
    let table = p.expect_identifier()?;
    p.expect_keyword("SET")?;
    let mut ctx = ExprCtx::default();
    let changes = parse_set_list(p, &mut ctx)?;

    // `UPDATE ... FROM t2` (joined updates) is outside this SQL subset
    // (§6.A lists it as optional but the executor has no join-aware
    // update path); reject it explicitly rather than silently ignoring.
    if p.is_keyword("FROM") {
        return Err(ParseError::UnexpectedToken("UPDATE ... FROM is not supported".to_string()));
    }

    let filter = if p.eat_keyword("WHERE") { Some(parse_condition(p, &mut ctx)?) } else { None };
    let returning = parse_returning(p, &mut ctx)?;
    reject_subqueries(&ctx, "UPDATE")?;
    Ok(Statement::Update { table, changes, filter, returning })
}

pub(crate) fn parse_delete(p: &mut Parser<'_>) -> Result<Statement, ParseError> {
    p.expect_keyword("DELETE")?;
    p.expect_keyword("FROM")?;
    let table = p.expect_identifier()?;
    let mut ctx = ExprCtx::default();
    let filter = if p.eat_keyword("WHERE") { Some(parse_condition(p, &mut ctx)?) } else { None };
    let returning = parse_returning(p, &mut ctx)?;
    reject_subqueries(&ctx, "DELETE")?;
    Ok(Statement::Delete { table, filter, returning })
}

fn parse_set_list(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Vec<(String, Value)>, ParseError> {
    let mut changes = Vec::new();
    loop {
        let column = p.expect_identifier()?;
        p.expect_operator("=")?;
        let expr = parse_scalar(p, ctx)?;
        changes.push((column, expr));
        if p.eat_symbol(",") {
            continue;
        }
        break;
    }
    Ok(changes)
}

fn parse_returning(p: &mut Parser<'_>, ctx: &mut ExprCtx) -> Result<Vec<SelectItem>, ParseError> {
    if p.eat_keyword("RETURNING") {
        if p.eat_symbol("*") {
            return Ok(vec![SelectItem { expr: Value::String("*".to_string()), alias: None }]);
        }
        return parse_select_items(p, ctx);
    }
    Ok(Vec::new())
}

/// DML statements (§4.K) don't have a place to stash out-of-line
/// subqueries the way a `Plan` does, so a subquery appearing in an
/// UPDATE/DELETE's `WHERE`/`SET`/`RETURNING` isn't representable yet.
fn reject_subqueries(ctx: &ExprCtx, where_: &str) -> Result<(), ParseError> {
    if ctx.subqueries.is_empty() {
        Ok(())
    } else {
        Err(ParseError::UnexpectedToken(format!("subqueries are not supported in {where_}")))
    }
}
