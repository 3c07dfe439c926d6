//! Text syntax for metadata filters
//!
//! ```text
//! name = 'Klaus' AND (age >= 42 OR city IN ('Munich', 'Berlin'))
//! NOT status != "draft"
//! ```
//!
//! Keywords are case-insensitive. `AND` binds tighter than `OR`. Keys that
//! are not plain identifiers are quoted with backticks. `NaN`, `Infinity`
//! and `-Infinity` are accepted as values.

use super::{key, not, Filter, MetadataValue};
use crate::error::{ChainkitError, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENT: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*").unwrap();
    static ref NUMBER: Regex = Regex::new(r"^-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?").unwrap();
}

/// Deepest nesting of parentheses and `NOT` accepted by [`parse_filter`]
pub const MAX_FILTER_DEPTH: usize = 64;

const KEYWORDS: [&str; 4] = ["AND", "OR", "NOT", "IN"];

/// Whether `name` can be written as a key without backticks
pub(super) fn is_plain_key(name: &str) -> bool {
    let plain = IDENT.find(name).map(|m| m.end()) == Some(name.len());
    plain && !KEYWORDS.contains(&name.to_ascii_uppercase().as_str())
}

/// Parse a filter expression
pub fn parse_filter(input: &str) -> Result<Filter> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let filter = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parse_error(
            token.offset,
            format!("unexpected {}", token.kind.describe()),
        ));
    }
    Ok(filter)
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Number(MetadataValue),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    Comma,
    Op(CmpOp),
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier '{}'", s),
            TokenKind::Str(s) => format!("string '{}'", s),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Not => "NOT".to_string(),
            TokenKind::In => "IN".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Op(op) => format!("operator '{}'", op.symbol()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn parse_error(position: usize, message: impl Into<String>) -> ChainkitError {
    ChainkitError::FilterParse {
        position,
        message: message.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        let Some(c) = rest.chars().next() else {
            break;
        };

        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        let (kind, len) = match c {
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            ',' => (TokenKind::Comma, 1),
            '=' if rest.starts_with("==") => (TokenKind::Op(CmpOp::Eq), 2),
            '=' => (TokenKind::Op(CmpOp::Eq), 1),
            '!' if rest.starts_with("!=") => (TokenKind::Op(CmpOp::Ne), 2),
            '<' if rest.starts_with("<>") => (TokenKind::Op(CmpOp::Ne), 2),
            '<' if rest.starts_with("<=") => (TokenKind::Op(CmpOp::Lte), 2),
            '<' => (TokenKind::Op(CmpOp::Lt), 1),
            '>' if rest.starts_with(">=") => (TokenKind::Op(CmpOp::Gte), 2),
            '>' => (TokenKind::Op(CmpOp::Gt), 1),
            '-' if rest.starts_with("-Infinity") => (
                TokenKind::Number(MetadataValue::Double(f64::NEG_INFINITY)),
                "-Infinity".len(),
            ),
            '\'' | '"' => {
                let (text, len) = read_string(rest, c, pos)?;
                (TokenKind::Str(text), len)
            }
            '`' => {
                let (text, len) = read_string(rest, c, pos)?;
                (TokenKind::Ident(text), len)
            }
            _ => {
                if let Some(m) = NUMBER.find(rest) {
                    (read_number(m.as_str(), pos)?, m.end())
                } else if let Some(m) = IDENT.find(rest) {
                    let word = m.as_str();
                    let kind = match word.to_ascii_uppercase().as_str() {
                        "AND" => TokenKind::And,
                        "OR" => TokenKind::Or,
                        "NOT" => TokenKind::Not,
                        "IN" => TokenKind::In,
                        _ => TokenKind::Ident(word.to_string()),
                    };
                    (kind, m.end())
                } else {
                    return Err(parse_error(pos, format!("unexpected character '{}'", c)));
                }
            }
        };

        tokens.push(Token { kind, offset: pos });
        pos += len;
    }

    Ok(tokens)
}

/// Reads a quoted string starting at `rest[0]`. A doubled quote escapes itself.
fn read_string(rest: &str, quote: char, offset: usize) -> Result<(String, usize)> {
    let mut text = String::new();
    let mut chars = rest.char_indices().skip(1).peekable();

    while let Some((i, c)) = chars.next() {
        if c == quote {
            if let Some(&(_, next)) = chars.peek() {
                if next == quote {
                    text.push(quote);
                    chars.next();
                    continue;
                }
            }
            return Ok((text, i + c.len_utf8()));
        }
        text.push(c);
    }

    Err(parse_error(offset, "unterminated string"))
}

fn read_number(literal: &str, offset: usize) -> Result<TokenKind> {
    let is_integral = !literal.contains(['.', 'e', 'E']);
    let value = if is_integral {
        let parsed: i64 = literal
            .parse()
            .map_err(|_| parse_error(offset, format!("integer out of range: {}", literal)))?;
        match i32::try_from(parsed) {
            Ok(small) => MetadataValue::Integer(small),
            Err(_) => MetadataValue::Long(parsed),
        }
    } else {
        let parsed: f64 = literal
            .parse()
            .map_err(|_| parse_error(offset, format!("invalid number: {}", literal)))?;
        MetadataValue::Double(parsed)
    };
    Ok(TokenKind::Number(value))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.peek().map(|t| t.offset).unwrap_or(self.end)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<()> {
        match self.advance() {
            Some(token) if token.kind == expected => Ok(()),
            Some(token) => Err(parse_error(
                token.offset,
                format!(
                    "expected {}, found {}",
                    expected.describe(),
                    token.kind.describe()
                ),
            )),
            None => Err(parse_error(
                self.end,
                format!("expected {}, found end of input", expected.describe()),
            )),
        }
    }

    fn parse_or(&mut self) -> Result<Filter> {
        let mut left = self.parse_and()?;
        while self.peek_kind() == Some(&TokenKind::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Filter> {
        let mut left = self.parse_unary()?;
        while self.peek_kind() == Some(&TokenKind::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_FILTER_DEPTH {
            return Err(parse_error(
                self.offset(),
                format!("filter nested deeper than {} levels", MAX_FILTER_DEPTH),
            ));
        }
        Ok(())
    }

    fn parse_unary(&mut self) -> Result<Filter> {
        if self.peek_kind() == Some(&TokenKind::Not) {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(not(inner));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Filter> {
        let offset = self.offset();
        match self.advance() {
            Some(Token {
                kind: TokenKind::LParen,
                ..
            }) => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                self.depth -= 1;
                Ok(inner)
            }
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => self.parse_comparison(name),
            Some(token) => Err(parse_error(
                token.offset,
                format!("expected a key or '(', found {}", token.kind.describe()),
            )),
            None => Err(parse_error(offset, "unexpected end of input")),
        }
    }

    fn parse_comparison(&mut self, name: String) -> Result<Filter> {
        let offset = self.offset();
        match self.advance().map(|t| t.kind) {
            Some(TokenKind::Op(op)) => {
                let value = self.parse_literal()?;
                let k = key(name);
                Ok(match op {
                    CmpOp::Eq => k.eq(value),
                    CmpOp::Ne => k.ne(value),
                    CmpOp::Gt => k.gt(value),
                    CmpOp::Gte => k.gte(value),
                    CmpOp::Lt => k.lt(value),
                    CmpOp::Lte => k.lte(value),
                })
            }
            Some(TokenKind::In) => Ok(key(name).is_in(self.parse_list()?)),
            Some(TokenKind::Not) => {
                self.expect(TokenKind::In)?;
                Ok(key(name).is_not_in(self.parse_list()?))
            }
            Some(other) => Err(parse_error(
                offset,
                format!(
                    "expected a comparison after '{}', found {}",
                    name,
                    other.describe()
                ),
            )),
            None => Err(parse_error(
                offset,
                format!("expected a comparison after '{}'", name),
            )),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<MetadataValue>> {
        self.expect(TokenKind::LParen)?;
        let mut values = Vec::new();
        if self.peek_kind() == Some(&TokenKind::RParen) {
            self.pos += 1;
            return Ok(values);
        }
        loop {
            values.push(self.parse_literal()?);
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => continue,
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => return Ok(values),
                Some(token) => {
                    return Err(parse_error(
                        token.offset,
                        format!("expected ',' or ')', found {}", token.kind.describe()),
                    ))
                }
                None => return Err(parse_error(self.end, "unterminated value list")),
            }
        }
    }

    fn parse_literal(&mut self) -> Result<MetadataValue> {
        let offset = self.offset();
        match self.advance() {
            Some(Token {
                kind: TokenKind::Str(s),
                ..
            }) => Ok(MetadataValue::Text(s)),
            Some(Token {
                kind: TokenKind::Number(n),
                ..
            }) => Ok(n),
            Some(Token {
                kind: TokenKind::Ident(word),
                ..
            }) if word == "NaN" => Ok(MetadataValue::Double(f64::NAN)),
            Some(Token {
                kind: TokenKind::Ident(word),
                ..
            }) if word == "Infinity" => Ok(MetadataValue::Double(f64::INFINITY)),
            Some(token) => Err(parse_error(
                token.offset,
                format!("expected a value, found {}", token.kind.describe()),
            )),
            None => Err(parse_error(offset, "expected a value, found end of input")),
        }
    }
}
