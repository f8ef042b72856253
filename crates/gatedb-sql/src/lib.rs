//! SQL front end: tokenizer, recursive-descent parser suite, a
//! `Value`-encoded expression evaluator, and the compiled `Plan`/
//! `Statement` AST the executor runs (§4.I, §4.M–§4.O).

pub mod ast;
pub mod error;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::{
    AggregateCall, CteDef, JoinClause, JoinKind, OnConflict, Plan, PlanSource, SelectItem, Statement, WindowCall,
};
pub use error::ParseError;
pub use eval::{eval_condition, eval_scalar, ResolvedSubqueries};
pub use lexer::{tokenize, Token, TokenKind};

/// Tokenize and parse one SQL statement (without its trailing `;`) into a
/// [`Statement`].
pub fn parse_statement(sql: &str) -> Result<Statement, ParseError> {
    let tokens = lexer::tokenize(sql)?;
    let mut p = parser::Parser::new(&tokens);
    let stmt = parser::parse_statement(&mut p)?;
    p.expect_end()?;
    Ok(stmt)
}

/// Split a script into individual statement texts on top-level `;`
/// boundaries (semicolons inside string/quoted-identifier literals don't
/// split). Empty statements (blank lines, trailing `;`) are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string: Option<char> = None;
    let mut chars = script.chars().peekable();
    while let Some(c) = chars.next() {
        match in_string {
            Some(q) => {
                current.push(c);
                if c == q {
                    if q == '\'' && chars.peek() == Some(&'\'') {
                        current.push(chars.next().unwrap());
                    } else {
                        in_string = None;
                    }
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    in_string = Some(c);
                    current.push(c);
                }
                ';' => {
                    if !current.trim().is_empty() {
                        statements.push(current.trim().to_string());
                    }
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_statements_ignores_semicolons_in_strings() {
        let stmts = split_statements("select ';' from t; select 2;");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "select ';' from t");
    }

    #[test]
    fn split_statements_drops_trailing_blank() {
        let stmts = split_statements("select 1;   \n  ");
        assert_eq!(stmts, vec!["select 1".to_string()]);
    }
}
