//! SQL tokenizer (§4.M).
//!
//! Grounded on `quarylabs-sqruff`'s lexer/tokenizer split (a closed
//! keyword table plus a single linear scan producing a flat token
//! stream), narrowed to the fixed, small SQL subset of §6.A rather than a
//! pluggable-dialect grammar — gatedb has exactly one dialect.

use std::fmt;

use crate::error::ParseError;

/// The kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A reserved word, matched case-insensitively (§4.M keyword list).
    Keyword,
    /// An unquoted or quoted identifier.
    Identifier,
    /// A single-quoted string literal.
    String,
    /// An integer or real literal.
    Number,
    /// A comparison/arithmetic operator.
    Operator,
    /// Punctuation: `(`, `)`, `,`, `.`, `;`, or a standalone `*`.
    Symbol,
    /// `TRUE` / `FALSE`.
    Boolean,
    /// `NULL`.
    Null,
}

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The token's kind.
    pub kind: TokenKind,
    /// The token's text. For `Keyword`, this is upper-cased. For a quoted
    /// `Identifier`, this is the unquoted name. For `String`, this is the
    /// unescaped content.
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Token {
        Token { kind, text: text.into() }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// The closed keyword list (§4.M). Matched case-insensitively; stored
/// upper-case here since that's also how `Token::text` is normalized.
const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "LIKE", "ILIKE", "IS", "NULL", "BETWEEN",
    "GROUP", "BY", "ORDER", "ASC", "DESC", "LIMIT", "OFFSET", "INSERT", "INTO", "VALUES", "UPDATE",
    "SET", "DELETE", "CREATE", "DROP", "TABLE", "INDEX", "UNIQUE", "VIEW", "TRIGGER", "CONSTRAINT",
    "ALTER", "ADD", "COLUMN", "RENAME", "TO", "IF", "EXISTS", "BEGIN", "COMMIT", "ROLLBACK", "WITH",
    "RECURSIVE", "AS", "UNION", "ALL", "JOIN", "LEFT", "RIGHT", "FULL", "INNER", "CROSS", "ON",
    "CASE", "WHEN", "THEN", "ELSE", "END", "CAST", "DISTINCT", "COUNT", "SUM", "AVG", "MIN", "MAX",
    "GROUP_CONCAT", "SEPARATOR", "OVER", "PARTITION", "ROW_NUMBER", "RANK", "DENSE_RANK", "DEFAULT",
    "HAVING", "RETURNING", "CONFLICT", "DO", "NOTHING", "NULLS", "FIRST", "LAST", "TRUNCATE",
    "EXPLAIN", "IIF", "TRUE", "FALSE", "PRIMARY", "KEY", "FOREIGN", "REFERENCES", "CHECK",
];

fn keyword_match(word: &str) -> Option<&'static str> {
    KEYWORDS.iter().find(|k| k.eq_ignore_ascii_case(word)).copied()
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether, given the previous meaningful token, a `-` should be read as
/// the start of a negative number literal rather than the subtraction
/// operator (§4.M "optional leading `-` when the preceding token is not a
/// value").
fn minus_starts_number(prev: Option<&Token>) -> bool {
    match prev {
        None => true,
        Some(t) => !matches!(
            t.kind,
            TokenKind::Identifier | TokenKind::Number | TokenKind::String | TokenKind::Boolean | TokenKind::Null
        ) && t.text != ")",
    }
}

/// Tokenize a SQL statement. Empty or whitespace/comment-only input
/// produces an empty sequence (§4.M).
pub fn tokenize(sql: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0usize;
    let mut tokens: Vec<Token> = Vec::new();

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // `-- comment` to end of line.
        if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        // Quoted identifiers: `"..."` or `` `...` ``.
        if c == '"' || c == '`' {
            let quote = c;
            let start = i + 1;
            let mut j = start;
            while j < chars.len() && chars[j] != quote {
                j += 1;
            }
            if j >= chars.len() {
                return Err(ParseError::UnterminatedString);
            }
            let name: String = chars[start..j].iter().collect();
            tokens.push(Token::new(TokenKind::Identifier, name));
            i = j + 1;
            continue;
        }

        // Single-quoted strings, with doubled `''` as an embedded quote.
        if c == '\'' {
            let mut j = i + 1;
            let mut text = String::new();
            loop {
                if j >= chars.len() {
                    return Err(ParseError::UnterminatedString);
                }
                if chars[j] == '\'' {
                    if chars.get(j + 1) == Some(&'\'') {
                        text.push('\'');
                        j += 2;
                        continue;
                    }
                    break;
                }
                text.push(chars[j]);
                j += 1;
            }
            tokens.push(Token::new(TokenKind::String, text));
            i = j + 1;
            continue;
        }

        // Numbers (optionally negative, per `minus_starts_number`).
        if c.is_ascii_digit() || (c == '-' && minus_starts_number(tokens.last()) && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            if c == '-' {
                i += 1;
            }
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Token::new(TokenKind::Number, text));
            continue;
        }

        // Identifiers and keywords.
        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if let Some(kw) = keyword_match(&word) {
                match kw {
                    "TRUE" => tokens.push(Token::new(TokenKind::Boolean, "true")),
                    "FALSE" => tokens.push(Token::new(TokenKind::Boolean, "false")),
                    "NULL" => tokens.push(Token::new(TokenKind::Null, "null")),
                    _ => tokens.push(Token::new(TokenKind::Keyword, kw)),
                }
            } else {
                tokens.push(Token::new(TokenKind::Identifier, word));
            }
            continue;
        }

        // Multi-char operators, longest match first.
        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        if ["<>", ">=", "<=", "!=", "||"].contains(&two.as_str()) {
            tokens.push(Token::new(TokenKind::Operator, two));
            i += 2;
            continue;
        }
        if "=<>+-/%".contains(c) {
            tokens.push(Token::new(TokenKind::Operator, c.to_string()));
            i += 1;
            continue;
        }
        if c == '*' {
            // Disambiguated by the parser (operator vs. "all columns"
            // symbol) based on grammar position, per §4.M.
            tokens.push(Token::new(TokenKind::Symbol, "*"));
            i += 1;
            continue;
        }
        if "(),.;".contains(c) {
            tokens.push(Token::new(TokenKind::Symbol, c.to_string()));
            i += 1;
            continue;
        }

        return Err(ParseError::UnexpectedChar(c));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(tokenize("").unwrap(), vec![]);
        assert_eq!(tokenize("   \n\t ").unwrap(), vec![]);
        assert_eq!(tokenize("-- just a comment").unwrap(), vec![]);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let tokens = tokenize("select * from t").unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::Keyword, "SELECT"));
        assert_eq!(tokens[3], Token::new(TokenKind::Keyword, "FROM"));
    }

    #[test]
    fn quoted_identifier_preserves_spaces() {
        let tokens = tokenize(r#"select "my col" from t"#).unwrap();
        assert_eq!(tokens[1], Token::new(TokenKind::Identifier, "my col"));
    }

    #[test]
    fn doubled_apostrophe_is_embedded_quote() {
        let tokens = tokenize("'it''s'").unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::String, "it's"));
    }

    #[test]
    fn negative_number_after_operator_but_not_after_identifier() {
        let tokens = tokenize("a - 1").unwrap();
        assert_eq!(tokens[1], Token::new(TokenKind::Operator, "-"));
        let tokens = tokenize("where x = -1").unwrap();
        assert_eq!(tokens.last().unwrap(), &Token::new(TokenKind::Number, "-1"));
    }

    #[test]
    fn multi_char_operators_match_longest() {
        let tokens = tokenize("a <> b").unwrap();
        assert_eq!(tokens[1], Token::new(TokenKind::Operator, "<>"));
        let tokens = tokenize("a || b").unwrap();
        assert_eq!(tokens[1], Token::new(TokenKind::Operator, "||"));
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(matches!(tokenize("'abc"), Err(ParseError::UnterminatedString)));
    }
}
