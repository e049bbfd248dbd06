//! Search query compiler.
//!
//! Query text is parsed into a [`ast::QueryNode`] tree, compiled field by
//! field through the [`fields::FieldRegistry`], and composed into a single
//! [`predicate::Predicate`] with its bound parameters, ranking columns and
//! sort directives. [`sql`] renders the result for PostgreSQL.

pub mod ast;
pub mod compiler;
pub mod compose;
pub mod dates;
pub mod fields;
pub mod parser;
pub mod predicate;
pub mod sql;

pub use compiler::{CompileOptions, CompiledQuery, QueryCompiler};
pub use fields::FieldRegistry;

use crate::error::QueryError;

/// Compile query text with the standard field vocabulary.
///
/// Builds a fresh registry on every call; hold a [`FieldRegistry`] and use
/// [`QueryCompiler`] directly when compiling many queries.
pub fn compile(text: &str, options: &CompileOptions) -> Result<CompiledQuery, QueryError> {
    let registry = FieldRegistry::standard();
    QueryCompiler::new(&registry).compile_text(text, options)
}
