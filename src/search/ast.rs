//! Query AST.
//!
//! A closed tagged union over the node kinds the query grammar produces.
//! The serde shape is the common `{"type": "Tag", ...}` JSON AST, so a
//! tree produced by an external parser can be fed in as JSON. Source
//! locations present in that JSON are ignored.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// A node of the parsed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueryNode {
    /// Empty query or `()`.
    #[serde(rename = "EmptyExpression")]
    Empty,
    /// `field:value` or bare free text.
    Tag(Tag),
    #[serde(rename = "LogicalExpression")]
    Logical(LogicalExpression),
    /// `NOT x` or `-x`.
    #[serde(rename = "UnaryOperator")]
    Unary(UnaryOperator),
    #[serde(rename = "ParenthesizedExpression")]
    Parenthesized(ParenthesizedExpression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub field: Field,
    pub expression: Expression,
}

/// Which field a tag targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Field {
    /// Bare free text without a `field:` prefix.
    #[serde(rename = "ImplicitField")]
    Implicit,
    #[serde(rename = "Field")]
    Named {
        name: String,
        #[serde(default)]
        quoted: bool,
    },
}

/// The operand of a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    #[serde(rename = "LiteralExpression")]
    Literal {
        value: serde_json::Value,
        #[serde(default)]
        quoted: bool,
    },
    #[serde(rename = "EmptyExpression")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalExpression {
    pub operator: BooleanOperator,
    pub left: Box<QueryNode>,
    pub right: Box<QueryNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanOperator {
    pub operator: LogicalOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryOperator {
    #[serde(default)]
    pub operator: NegationOperator,
    pub operand: Box<QueryNode>,
}

/// Spelling of a negation. Both mean the same thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NegationOperator {
    #[default]
    #[serde(rename = "NOT")]
    Not,
    #[serde(rename = "-")]
    Minus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParenthesizedExpression {
    pub expression: Box<QueryNode>,
}

impl Tag {
    /// Field name, or `None` for implicit free text.
    pub fn field_name(&self) -> Option<&str> {
        match &self.field {
            Field::Implicit => None,
            Field::Named { name, .. } => Some(name),
        }
    }

    /// Operand as text. Non-string literals are rendered the way they were typed.
    pub fn operand(&self) -> String {
        match &self.expression {
            Expression::Empty => String::new(),
            Expression::Literal { value, .. } => match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            },
        }
    }

    /// Whether the operand was written in double quotes.
    pub fn is_quoted(&self) -> bool {
        matches!(self.expression, Expression::Literal { quoted: true, .. })
    }
}

impl QueryNode {
    /// `field:value` leaf.
    pub fn tag(field: &str, value: &str) -> Self {
        Self::Tag(Tag {
            field: Field::Named {
                name: field.to_string(),
                quoted: false,
            },
            expression: literal(value, false),
        })
    }

    /// Free-text leaf.
    pub fn text(value: &str) -> Self {
        Self::Tag(Tag {
            field: Field::Implicit,
            expression: literal(value, false),
        })
    }

    /// Free-text leaf for a `"quoted phrase"`.
    pub fn phrase(value: &str) -> Self {
        Self::Tag(Tag {
            field: Field::Implicit,
            expression: literal(value, true),
        })
    }

    pub fn and(left: Self, right: Self) -> Self {
        Self::logical(LogicalOperator::And, left, right)
    }

    pub fn or(left: Self, right: Self) -> Self {
        Self::logical(LogicalOperator::Or, left, right)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Self) -> Self {
        Self::Unary(UnaryOperator {
            operator: NegationOperator::Not,
            operand: Box::new(operand),
        })
    }

    pub fn group(expression: Self) -> Self {
        Self::Parenthesized(ParenthesizedExpression {
            expression: Box::new(expression),
        })
    }

    fn logical(operator: LogicalOperator, left: Self, right: Self) -> Self {
        Self::Logical(LogicalExpression {
            operator: BooleanOperator { operator },
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Decode an AST produced by an external parser.
    ///
    /// Unknown node kinds or missing members are rejected as `ParseFailure`.
    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        serde_json::from_str(json).map_err(|e| QueryError::ParseFailure {
            offset: e.column().saturating_sub(1),
            reason: format!("unrecognized query AST: {e}"),
        })
    }
}

fn literal(value: &str, quoted: bool) -> Expression {
    Expression::Literal {
        value: serde_json::Value::String(value.to_string()),
        quoted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_tagged_shape() {
        let json = r#"{
            "type": "LogicalExpression",
            "location": {"start": 0, "end": 20},
            "operator": {"type": "BooleanOperator", "operator": "AND"},
            "left": {
                "type": "Tag",
                "field": {"type": "ImplicitField"},
                "expression": {"type": "LiteralExpression", "value": "coffee", "quoted": false},
                "operator": {"type": "ComparisonOperator", "operator": ":"}
            },
            "right": {
                "type": "UnaryOperator",
                "operator": "-",
                "operand": {
                    "type": "Tag",
                    "field": {"type": "Field", "name": "in", "quoted": false},
                    "expression": {"type": "LiteralExpression", "value": "archive"}
                }
            }
        }"#;
        let node = QueryNode::from_json(json).unwrap();
        let expected = QueryNode::and(
            QueryNode::text("coffee"),
            QueryNode::Unary(UnaryOperator {
                operator: NegationOperator::Minus,
                operand: Box::new(QueryNode::tag("in", "archive")),
            }),
        );
        assert_eq!(node, expected);
    }

    #[test]
    fn test_from_json_unknown_node_fails_closed() {
        let json = r#"{"type": "RegexExpression", "value": "/a.*/"}"#;
        let err = QueryNode::from_json(json).unwrap_err();
        assert!(matches!(err, QueryError::ParseFailure { .. }));
    }

    #[test]
    fn test_numeric_literal_operand() {
        let json = r#"{
            "type": "Tag",
            "field": {"type": "Field", "name": "wordsCount"},
            "expression": {"type": "LiteralExpression", "value": 500}
        }"#;
        let QueryNode::Tag(tag) = QueryNode::from_json(json).unwrap() else {
            panic!("expected a tag");
        };
        assert_eq!(tag.field_name(), Some("wordsCount"));
        assert_eq!(tag.operand(), "500");
        assert!(!tag.is_quoted());
    }
}
