//! Recursive-descent parser suite (§4.N). One function per statement
//! family, all sharing the token cursor and expression grammar defined
//! here.
//!
//! Grounded on `quarylabs-sqruff`'s recursive-descent parser module
//! split (a shared cursor type, one file per statement family), adapted
//! from a pluggable-dialect CST builder down to gatedb's single fixed
//! grammar producing the typed `Statement`/`Plan` AST directly.

mod ddl;
mod dml;
mod select;

use gatedb_types::{Column, ColumnType, Value};

use crate::ast::Statement;
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

/// A cursor over a token slice with lookahead and the shared expression
/// grammar used by every statement parser.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Parser<'a> {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eof_err(&self, what: &str) -> ParseError {
        ParseError::UnexpectedEof(what.to_string())
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::Keyword && t.text.eq_ignore_ascii_case(kw))
    }

    fn is_keyword_n(&self, n: usize, kw: &str) -> bool {
        matches!(self.peek_n(n), Some(t) if t.kind == TokenKind::Keyword && t.text.eq_ignore_ascii_case(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_keyword(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            match self.peek() {
                Some(t) => Err(ParseError::UnexpectedToken(format!("expected {kw}, found {}", t.text))),
                None => Err(self.eof_err(kw)),
            }
        }
    }

    fn is_symbol(&self, s: &str) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::Symbol && t.text == s)
    }

    fn eat_symbol(&mut self, s: &str) -> bool {
        if self.is_symbol(s) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_symbol(&mut self, s: &str) -> Result<(), ParseError> {
        if self.eat_symbol(s) {
            Ok(())
        } else {
            match self.peek() {
                Some(t) => Err(ParseError::UnexpectedToken(format!("expected '{s}', found {}", t.text))),
                None => Err(self.eof_err(s)),
            }
        }
    }

    fn is_operator(&self, s: &str) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::Operator && t.text == s)
    }

    fn eat_operator(&mut self, s: &str) -> bool {
        if self.is_operator(s) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_operator(&mut self, s: &str) -> Result<(), ParseError> {
        if self.eat_operator(s) {
            Ok(())
        } else {
            match self.peek() {
                Some(t) => Err(ParseError::UnexpectedToken(format!("expected '{s}', found {}", t.text))),
                None => Err(self.eof_err(s)),
            }
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => {
                let text = t.text.clone();
                self.pos += 1;
                Ok(text)
            }
            Some(t) => Err(ParseError::UnexpectedToken(format!("expected identifier, found {}", t.text))),
            None => Err(self.eof_err("identifier")),
        }
    }

    /// Consume the end of the token stream; a non-empty remainder means
    /// the grammar didn't account for trailing input.
    pub fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(ParseError::UnexpectedToken(format!("unexpected trailing token: {}", t.text))),
        }
    }

    /// Parse `IDENTIFIER TYPE [NOT NULL] [DEFAULT literal]`.
    pub(crate) fn parse_column_def(&mut self) -> Result<Column, ParseError> {
        let name = self.expect_identifier()?;
        let type_name = self.expect_identifier()?;
        let col_type = ColumnType::parse(&type_name);
        // `VARCHAR(n)` / `DECIMAL(p, s)`-style size arguments are accepted
        // and discarded; they don't affect gatedb's closed type set.
        if self.eat_symbol("(") {
            loop {
                self.advance();
                if self.eat_symbol(")") {
                    break;
                }
                if self.peek().is_none() {
                    return Err(self.eof_err(")"));
                }
            }
        }
        let mut nullable = true;
        let mut default = None;
        loop {
            if self.eat_keyword("NOT") {
                self.expect_keyword("NULL")?;
                nullable = false;
            } else if self.eat_keyword("NULL") {
                nullable = true;
            } else if self.eat_keyword("DEFAULT") {
                default = Some(self.parse_literal()?);
            } else if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                nullable = false;
            } else if self.eat_keyword("UNIQUE") || self.eat_keyword("CHECK") {
                if self.is_symbol("(") {
                    skip_parenthesized(self);
                }
            } else {
                break;
            }
        }
        Ok(Column { name, col_type, nullable, default })
    }

    fn parse_literal(&mut self) -> Result<Value, ParseError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Number => {
                let text = t.text.clone();
                self.pos += 1;
                Ok(parse_number(&text))
            }
            Some(t) if t.kind == TokenKind::String => {
                let text = t.text.clone();
                self.pos += 1;
                Ok(Value::String(text))
            }
            Some(t) if t.kind == TokenKind::Boolean => {
                let v = t.text == "true";
                self.pos += 1;
                Ok(Value::Bool(v))
            }
            Some(t) if t.kind == TokenKind::Null => {
                self.pos += 1;
                Ok(Value::Null)
            }
            Some(t) => Err(ParseError::UnexpectedToken(format!("expected literal, found {}", t.text))),
            None => Err(self.eof_err("literal")),
        }
    }

    /// `(col1, col2, ...)`.
    pub(crate) fn parse_column_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect_symbol("(")?;
        let mut cols = Vec::new();
        loop {
            cols.push(self.expect_identifier()?);
            if self.eat_symbol(",") {
                continue;
            }
            break;
        }
        self.expect_symbol(")")?;
        Ok(cols)
    }

    /// Optional `AS alias` or bare trailing identifier alias.
    pub(crate) fn parse_optional_alias(&mut self) -> Option<String> {
        if self.eat_keyword("AS") {
            return self.expect_identifier().ok();
        }
        if let Some(t) = self.peek() {
            if t.kind == TokenKind::Identifier {
                let text = t.text.clone();
                self.pos += 1;
                return Some(text);
            }
        }
        None
    }
}

fn skip_parenthesized(p: &mut Parser<'_>) {
    if !p.eat_symbol("(") {
        return;
    }
    let mut depth = 1;
    while depth > 0 {
        match p.advance() {
            Some(t) if t.text == "(" => depth += 1,
            Some(t) if t.text == ")" => depth -= 1,
            Some(_) => {}
            None => break,
        }
    }
}

fn parse_number(text: &str) -> Value {
    if text.contains('.') {
        Value::Real(text.parse().unwrap_or(0.0))
    } else {
        match text.parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Real(text.parse().unwrap_or(0.0)),
        }
    }
}

/// Dispatch on the first keyword to the matching statement parser
/// (§4.N "the top-level `sql` gate ... inspects the first keyword").
pub fn parse_statement(p: &mut Parser<'_>) -> Result<Statement, ParseError> {
    let Some(first) = p.peek() else { return Err(p.eof_err("a statement")) };
    if first.kind != TokenKind::Keyword {
        return Err(ParseError::UnexpectedToken(format!("expected a statement keyword, found {}", first.text)));
    }
    match first.text.as_str() {
        "CREATE" => ddl::parse_create(p),
        "DROP" => ddl::parse_drop(p),
        "ALTER" => ddl::parse_alter(p),
        "TRUNCATE" => ddl::parse_truncate(p),
        "INSERT" => dml::parse_insert(p),
        "UPDATE" => dml::parse_update(p),
        "DELETE" => dml::parse_delete(p),
        "SELECT" | "WITH" => Ok(Statement::Select(Box::new(select::parse_select(p)?))),
        "EXPLAIN" => {
            p.advance();
            Ok(Statement::Explain(Box::new(select::parse_select(p)?)))
        }
        "BEGIN" => {
            p.advance();
            Ok(Statement::Begin)
        }
        "COMMIT" => {
            p.advance();
            Ok(Statement::Commit)
        }
        "ROLLBACK" => {
            p.advance();
            Ok(Statement::Rollback)
        }
        other => Err(ParseError::UnknownStatement(other.to_string())),
    }
}
