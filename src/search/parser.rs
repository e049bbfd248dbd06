//! Query text parser.
//!
//! Turns user-typed query text into a [`QueryNode`] tree.
//!
//! # Supported syntax
//!
//! - `coffee beans`: free text; juxtaposition is an implicit `AND`
//! - `"exact phrase"`: quoted free text
//! - `field:value` / `field:"quoted value"`
//! - `a AND b`, `a OR b`: `AND` binds tighter than `OR`
//! - `NOT a` / `-a`: negation
//! - `( ... )`: grouping

use crate::error::QueryError;

use super::ast::{Expression, Field, QueryNode, Tag};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Term(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

/// Parse query text into an AST.
///
/// Blank input yields [`QueryNode::Empty`].
pub fn parse(input: &str) -> Result<QueryNode, QueryError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(QueryNode::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    let node = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(QueryError::ParseFailure {
            offset: token.offset,
            reason: "unexpected ')'".to_string(),
        });
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |t| t.offset)
    }

    fn parse_or(&mut self) -> Result<QueryNode, QueryError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token { kind: TokenKind::Or, .. })) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = QueryNode::or(left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<QueryNode, QueryError> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::And) => {
                    self.pos += 1;
                }
                Some(TokenKind::Term(_) | TokenKind::LParen | TokenKind::Not) => {}
                _ => break,
            }
            let right = self.parse_unary()?;
            left = QueryNode::and(left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<QueryNode, QueryError> {
        if matches!(self.peek(), Some(Token { kind: TokenKind::Not, .. })) {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(QueryNode::not(operand));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<QueryNode, QueryError> {
        let offset = self.offset();
        match self.next() {
            Some(Token {
                kind: TokenKind::LParen,
                offset: open,
            }) => {
                if matches!(self.peek(), Some(Token { kind: TokenKind::RParen, .. })) {
                    self.pos += 1;
                    return Ok(QueryNode::group(QueryNode::Empty));
                }
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(QueryNode::group(inner)),
                    _ => Err(QueryError::ParseFailure {
                        offset: open,
                        reason: "unclosed '('".to_string(),
                    }),
                }
            }
            Some(Token {
                kind: TokenKind::Term(text),
                ..
            }) => Ok(make_leaf(&text)),
            Some(Token { kind, offset }) => Err(QueryError::ParseFailure {
                offset,
                reason: format!("unexpected {}", describe(&kind)),
            }),
            None => Err(QueryError::ParseFailure {
                offset,
                reason: "unexpected end of query".to_string(),
            }),
        }
    }
}

fn describe(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::LParen => "'('",
        TokenKind::RParen => "')'",
        TokenKind::And => "AND",
        TokenKind::Or => "OR",
        TokenKind::Not => "NOT",
        TokenKind::Term(_) => "term",
    }
}

/// Build a leaf from a raw term (`field:value` → tag, otherwise free text).
/// URLs (`scheme://...`) stay free text.
fn make_leaf(token: &str) -> QueryNode {
    if let Some((field, value)) = token.split_once(':') {
        if is_field_name(field) && !value.starts_with("//") {
            let (value, quoted) = unquote(value);
            let expression = if value.is_empty() {
                Expression::Empty
            } else {
                Expression::Literal {
                    value: serde_json::Value::String(value.to_string()),
                    quoted,
                }
            };
            return QueryNode::Tag(Tag {
                field: Field::Named {
                    name: field.to_string(),
                    quoted: false,
                },
                expression,
            });
        }
    }

    match unquote(token) {
        (text, true) => QueryNode::phrase(text),
        (text, false) => QueryNode::text(text),
    }
}

fn is_field_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip surrounding double quotes, reporting whether there were any.
fn unquote(value: &str) -> (&str, bool) {
    match value.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) if value.len() >= 2 => (inner, true),
        _ => (value, false),
    }
}

/// Tokenize input respecting quoted strings and parentheses.
fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut quote_at = 0;

    for (i, ch) in input.char_indices() {
        if ch == '"' {
            if !in_quotes {
                quote_at = i;
            }
            if current.is_empty() {
                start = i;
            }
            in_quotes = !in_quotes;
            current.push(ch);
        } else if in_quotes {
            current.push(ch);
        } else if ch.is_whitespace() {
            flush(&mut current, start, &mut tokens);
        } else if ch == '(' || ch == ')' {
            flush(&mut current, start, &mut tokens);
            let kind = if ch == '(' {
                TokenKind::LParen
            } else {
                TokenKind::RParen
            };
            tokens.push(Token { kind, offset: i });
        } else {
            if current.is_empty() {
                start = i;
            }
            current.push(ch);
        }
    }

    if in_quotes {
        return Err(QueryError::ParseFailure {
            offset: quote_at,
            reason: "unterminated quote".to_string(),
        });
    }
    flush(&mut current, start, &mut tokens);
    Ok(tokens)
}

fn flush(current: &mut String, start: usize, tokens: &mut Vec<Token>) {
    if !current.is_empty() {
        push_word(std::mem::take(current), start, tokens);
    }
}

/// Classify a whitespace-delimited word, splitting off a leading `-`.
fn push_word(word: String, offset: usize, tokens: &mut Vec<Token>) {
    let kind = match word.as_str() {
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        _ => {
            if let Some(rest) = word.strip_prefix('-').filter(|r| !r.is_empty()) {
                tokens.push(Token {
                    kind: TokenKind::Not,
                    offset,
                });
                push_word(rest.to_string(), offset + 1, tokens);
                return;
            }
            TokenKind::Term(word)
        }
    };
    tokens.push(Token { kind, offset });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_query() {
        assert_eq!(parse("").unwrap(), QueryNode::Empty);
        assert_eq!(parse("   ").unwrap(), QueryNode::Empty);
    }

    #[test]
    fn test_parse_implicit_and() {
        let node = parse("coffee in:archive").unwrap();
        assert_eq!(
            node,
            QueryNode::and(QueryNode::text("coffee"), QueryNode::tag("in", "archive"))
        );
    }

    #[test]
    fn test_parse_and_binds_tighter_than_or() {
        let node = parse("a OR b AND c").unwrap();
        assert_eq!(
            node,
            QueryNode::or(
                QueryNode::text("a"),
                QueryNode::and(QueryNode::text("b"), QueryNode::text("c"))
            )
        );
    }

    #[test]
    fn test_parse_negation_forms() {
        assert_eq!(
            parse("-use:folders").unwrap(),
            QueryNode::not(QueryNode::tag("use", "folders"))
        );
        assert_eq!(
            parse("NOT label:news").unwrap(),
            QueryNode::not(QueryNode::tag("label", "news"))
        );
    }

    #[test]
    fn test_parse_quoted_values() {
        let QueryNode::Tag(tag) = parse("label:\"a,b*\"").unwrap() else {
            panic!("expected a tag");
        };
        assert_eq!(tag.field_name(), Some("label"));
        assert_eq!(tag.operand(), "a,b*");
        assert!(tag.is_quoted());

        assert_eq!(
            parse("\"hello world\"").unwrap(),
            QueryNode::phrase("hello world")
        );
    }

    #[test]
    fn test_parse_parentheses() {
        let node = parse("(label:a OR label:b) is:unread").unwrap();
        assert_eq!(
            node,
            QueryNode::and(
                QueryNode::group(QueryNode::or(
                    QueryNode::tag("label", "a"),
                    QueryNode::tag("label", "b")
                )),
                QueryNode::tag("is", "unread")
            )
        );
        assert_eq!(parse("()").unwrap(), QueryNode::group(QueryNode::Empty));
    }

    #[test]
    fn test_parse_url_like_text_is_free_text() {
        let node = parse("https://example.com").unwrap();
        assert_eq!(node, QueryNode::text("https://example.com"));
    }

    #[test]
    fn test_parse_empty_tag_value() {
        let QueryNode::Tag(tag) = parse("label:").unwrap() else {
            panic!("expected a tag");
        };
        assert_eq!(tag.expression, Expression::Empty);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("(a OR b"),
            Err(QueryError::ParseFailure { offset: 0, .. })
        ));
        assert!(matches!(parse("a)"), Err(QueryError::ParseFailure { offset: 1, .. })));
        assert!(matches!(parse("a OR"), Err(QueryError::ParseFailure { .. })));
        assert!(matches!(
            parse("title:\"open"),
            Err(QueryError::ParseFailure { offset: 6, .. })
        ));
    }
}
