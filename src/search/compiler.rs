//! Query compiler.
//!
//! Walks a [`QueryNode`] tree and produces a [`CompiledQuery`]: an optional
//! predicate plus the side outputs the field compilers contribute (bound
//! parameters, ranking columns, sort directives).
//!
//! Compilation is pure. Each call owns its [`Accumulator`], so one
//! [`QueryCompiler`] can serve any number of threads.

use chrono::{DateTime, FixedOffset, Weekday};
use tracing::debug;

use crate::error::QueryError;

use super::ast::QueryNode;
use super::compose;
use super::fields::FieldRegistry;
use super::parser;
use super::predicate::{ExtraColumn, ParamRef, ParamValue, Parameters, Predicate, SortDirective};

/// Whole-query token that turns on folder scoping for `in:`.
pub const USE_FOLDERS_TOKEN: &str = "use:folders";

/// Caller-side inputs that are not part of the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// `in:<folder>` also restricts to that folder.
    pub folder_scoped: bool,
    /// Caller's local time; relative dates resolve against it.
    pub now: DateTime<FixedOffset>,
    /// First day of the week for `this week`.
    pub week_start: Weekday,
}

impl CompileOptions {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            folder_scoped: false,
            now,
            week_start: Weekday::Mon,
        }
    }

    pub fn with_folders(mut self, folder_scoped: bool) -> Self {
        self.folder_scoped = folder_scoped;
        self
    }

    pub fn with_week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }
}

/// Side outputs collected while walking the tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulator {
    pub parameters: Parameters,
    pub extra_columns: Vec<ExtraColumn>,
    pub sort: Vec<SortDirective>,
    /// Set by an `in:trash` tag that every match must satisfy (not under
    /// `OR` or `NOT`).
    pub trash: bool,
    /// Number of leading ranking directives in `sort`.
    ranked: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, prefix: &str, value: ParamValue) -> ParamRef {
        self.parameters.bind(prefix, value)
    }

    pub fn add_column(&mut self, column: ExtraColumn) {
        if !self.extra_columns.iter().any(|c| c.alias == column.alias) {
            self.extra_columns.push(column);
        }
    }

    /// Add a ranking directive ahead of every `sort:` directive.
    pub fn prepend_sort(&mut self, directive: SortDirective) {
        if self.has_sort(&directive.by) {
            return;
        }
        self.sort.insert(self.ranked, directive);
        self.ranked += 1;
    }

    /// Add a directive after everything collected so far.
    pub fn push_sort(&mut self, directive: SortDirective) {
        if !self.has_sort(&directive.by) {
            self.sort.push(directive);
        }
    }

    fn has_sort(&self, by: &str) -> bool {
        self.sort.iter().any(|d| d.by == by)
    }
}

/// Result of compiling one query.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// `None` when the query places no constraint on rows.
    pub predicate: Option<Predicate>,
    pub parameters: Parameters,
    pub extra_columns: Vec<ExtraColumn>,
    /// Query-contributed ordering, before any caller default.
    pub sort: Vec<SortDirective>,
    /// The query asks for the trash (`in:trash`).
    pub trash: bool,
}

/// Compiles query trees using a fixed field registry.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'r> {
    registry: &'r FieldRegistry,
}

impl<'r> QueryCompiler<'r> {
    pub fn new(registry: &'r FieldRegistry) -> Self {
        Self { registry }
    }

    /// Compile a tree with a fresh accumulator.
    pub fn compile(
        &self,
        ast: &QueryNode,
        options: &CompileOptions,
    ) -> Result<CompiledQuery, QueryError> {
        let mut acc = Accumulator::new();
        let predicate = self.compile_into(ast, &mut acc, options)?;

        debug!(
            has_predicate = predicate.is_some(),
            params = acc.parameters.len(),
            extra_columns = acc.extra_columns.len(),
            sort = acc.sort.len(),
            "Compiled search query"
        );

        Ok(CompiledQuery {
            predicate,
            parameters: acc.parameters,
            extra_columns: acc.extra_columns,
            sort: acc.sort,
            trash: acc.trash,
        })
    }

    /// Compile a tree into a caller-owned accumulator.
    pub fn compile_into(
        &self,
        ast: &QueryNode,
        acc: &mut Accumulator,
        options: &CompileOptions,
    ) -> Result<Option<Predicate>, QueryError> {
        compose::compile_node(self.registry, ast, acc, options)
    }

    /// Parse and compile query text.
    ///
    /// `use:folders` anywhere in the text turns folder scoping on in
    /// addition to `options.folder_scoped`.
    pub fn compile_text(
        &self,
        text: &str,
        options: &CompileOptions,
    ) -> Result<CompiledQuery, QueryError> {
        let ast = parser::parse(text)?;
        let options = options.with_folders(options.folder_scoped || wants_folders(text));
        self.compile(&ast, &options)
    }
}

/// Pre-scan for the folder scoping token.
pub fn wants_folders(text: &str) -> bool {
    text.contains(USE_FOLDERS_TOKEN)
}
