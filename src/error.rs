//! Centralized error types for readshelf.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a query into a predicate.
///
/// All of them reject the whole query. They are deterministic and never
/// retried; no partial predicate is ever returned alongside one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query text or AST has an invalid shape.
    #[error("Malformed query at offset {offset}: {reason}")]
    ParseFailure { offset: usize, reason: String },

    /// The field name is not part of the query vocabulary.
    #[error("Unexpected keyword: {field}")]
    UnknownField { field: String },

    /// The field is known but the value is not one of its keywords.
    #[error("Unexpected keyword for '{field}': {value}")]
    InvalidEnumValue { field: String, value: String },

    /// A value was required but nothing usable was given.
    #[error("Missing value for '{field}'")]
    MissingOperand { field: String },

    /// A numeric comparison is missing its operator or its integer.
    #[error("Invalid numeric filter for '{field}': {value} (expected <, <=, > or >= followed by an integer)")]
    MalformedNumericOperand { field: String, value: String },

    /// A date operand is neither a relative keyword nor a parseable date.
    #[error("Invalid date for '{field}': {value}")]
    MalformedDate { field: String, value: String },
}

impl QueryError {
    /// Field name the error refers to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::ParseFailure { .. } => None,
            Self::UnknownField { field }
            | Self::InvalidEnumValue { field, .. }
            | Self::MissingOperand { field }
            | Self::MalformedNumericOperand { field, .. }
            | Self::MalformedDate { field, .. } => Some(field),
        }
    }
}

/// All errors produced by the readshelf library.
#[derive(Error, Debug)]
pub enum ShelfError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A library snapshot could not be (de)serialized.
    #[error("Invalid library snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// The query was rejected by the compiler.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The storage engine failed. Passed through unchanged.
    #[error("Storage error: {0}")]
    Store(String),

    /// The pagination cursor is not a decimal offset.
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Convenience alias for `Result<T, ShelfError>`.
pub type Result<T> = std::result::Result<T, ShelfError>;

impl ShelfError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_carries_field() {
        let err = QueryError::InvalidEnumValue {
            field: "is".to_string(),
            value: "bogus".to_string(),
        };
        assert_eq!(err.field(), Some("is"));
        assert_eq!(err.to_string(), "Unexpected keyword for 'is': bogus");
    }

    #[test]
    fn test_query_error_converts_to_shelf_error() {
        let err: ShelfError = QueryError::UnknownField {
            field: "foo".to_string(),
        }
        .into();
        assert!(matches!(err, ShelfError::Query(QueryError::UnknownField { .. })));
        assert_eq!(err.to_string(), "Unexpected keyword: foo");
    }
}
