//! Compiled predicate representation.
//!
//! A [`Predicate`] is the structured form of a `WHERE` clause over the
//! `library_item` table. It never holds a user-supplied literal: every such
//! value lives in [`Parameters`] and the predicate refers to it through a
//! [`ParamRef`]. The only inline values are compiler-owned constants
//! (progress thresholds, the trash retention window).
//!
//! [`crate::search::sql`] renders predicates to SQL text; the in-memory
//! engine in [`crate::store::memory`] evaluates them directly.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Columns of `library_item` that queries can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    UserId,
    State,
    Folder,
    ItemType,
    Title,
    Author,
    Description,
    Note,
    SiteName,
    Subscription,
    ItemLanguage,
    LabelNames,
    HighlightLabels,
    HighlightAnnotations,
    RecommenderNames,
    WordCount,
    ReadingProgressTopPercent,
    ReadingProgressBottomPercent,
    SavedAt,
    UpdatedAt,
    PublishedAt,
    ReadAt,
    ArchivedAt,
    DeletedAt,
}

impl Column {
    /// All columns, in table order.
    pub const ALL: [Column; 25] = [
        Self::Id,
        Self::UserId,
        Self::State,
        Self::Folder,
        Self::ItemType,
        Self::Title,
        Self::Author,
        Self::Description,
        Self::Note,
        Self::SiteName,
        Self::Subscription,
        Self::ItemLanguage,
        Self::LabelNames,
        Self::HighlightLabels,
        Self::HighlightAnnotations,
        Self::RecommenderNames,
        Self::WordCount,
        Self::ReadingProgressTopPercent,
        Self::ReadingProgressBottomPercent,
        Self::SavedAt,
        Self::UpdatedAt,
        Self::PublishedAt,
        Self::ReadAt,
        Self::ArchivedAt,
        Self::DeletedAt,
    ];

    /// SQL column name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::UserId => "user_id",
            Self::State => "state",
            Self::Folder => "folder",
            Self::ItemType => "item_type",
            Self::Title => "title",
            Self::Author => "author",
            Self::Description => "description",
            Self::Note => "note",
            Self::SiteName => "site_name",
            Self::Subscription => "subscription",
            Self::ItemLanguage => "item_language",
            Self::LabelNames => "label_names",
            Self::HighlightLabels => "highlight_labels",
            Self::HighlightAnnotations => "highlight_annotations",
            Self::RecommenderNames => "recommender_names",
            Self::WordCount => "word_count",
            Self::ReadingProgressTopPercent => "reading_progress_top_percent",
            Self::ReadingProgressBottomPercent => "reading_progress_bottom_percent",
            Self::SavedAt => "saved_at",
            Self::UpdatedAt => "updated_at",
            Self::PublishedAt => "published_at",
            Self::ReadAt => "read_at",
            Self::ArchivedAt => "archived_at",
            Self::DeletedAt => "deleted_at",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Whether the column holds a text array.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            Self::LabelNames
                | Self::HighlightLabels
                | Self::HighlightAnnotations
                | Self::RecommenderNames
        )
    }
}

/// Item labels plus the labels on its highlights.
pub const LABEL_SET: &[Column] = &[Column::LabelNames, Column::HighlightLabels];

/// A full-text index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextIndex {
    /// Title and readable content together (`search_tsv`).
    Search,
    /// A single column's own index (`<column>_tsv`).
    Field(Column),
}

/// Name of a bound parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ParamRef(String);

impl ParamRef {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParamRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Param(ParamRef),
    /// Compiler-owned constant.
    Int(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// A boolean expression over one `library_item` row.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// Explicit parentheses.
    Group(Box<Predicate>),
    /// Web-search style full-text match.
    TextMatch { index: TextIndex, query: ParamRef },
    /// Case-insensitive wildcard match on a text column.
    ILike { column: Column, pattern: ParamRef },
    /// `lower(column) = :value`; the bound value is already lower-cased.
    EqualsIgnoreCase { column: Column, value: ParamRef },
    Equals { column: Column, value: ParamRef },
    NotEquals { column: Column, value: ParamRef },
    Compare {
        column: Column,
        op: CmpOp,
        value: Operand,
    },
    /// Inclusive on both ends.
    Between {
        column: Column,
        low: Operand,
        high: Operand,
    },
    /// Case-insensitive membership of `value` in the union of array columns.
    ArrayContains {
        columns: &'static [Column],
        value: ParamRef,
    },
    /// Some element of the union of array columns matches `pattern`.
    ArrayAnyLike {
        columns: &'static [Column],
        pattern: ParamRef,
    },
    /// `column` equals one of the values in a list parameter.
    InList { column: Column, values: ParamRef },
    IsNull(Column),
    IsNotNull(Column),
    /// Array column has at least one element, or text column is non-empty.
    NotEmpty(Column),
    /// Column is null, an empty array or an empty string.
    IsEmpty(Column),
    /// Timestamp column set and within the last `days` days. Never unknown.
    WithinDays { column: Column, days: i64 },
}

impl Predicate {
    pub fn and(left: Predicate, right: Predicate) -> Predicate {
        Predicate::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Predicate, right: Predicate) -> Predicate {
        Predicate::Or(Box::new(left), Box::new(right))
    }

    pub fn negate(inner: Predicate) -> Predicate {
        Predicate::Not(Box::new(inner))
    }

    pub fn group(inner: Predicate) -> Predicate {
        Predicate::Group(Box::new(inner))
    }

    /// Every parameter this predicate refers to, in rendering order.
    pub fn param_refs(&self) -> Vec<&ParamRef> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a ParamRef>) {
        match self {
            Self::And(l, r) | Self::Or(l, r) => {
                l.collect_refs(out);
                r.collect_refs(out);
            }
            Self::Not(p) | Self::Group(p) => p.collect_refs(out),
            Self::TextMatch { query: p, .. }
            | Self::ILike { pattern: p, .. }
            | Self::EqualsIgnoreCase { value: p, .. }
            | Self::Equals { value: p, .. }
            | Self::NotEquals { value: p, .. }
            | Self::ArrayContains { value: p, .. }
            | Self::ArrayAnyLike { pattern: p, .. }
            | Self::InList { values: p, .. } => out.push(p),
            Self::Compare { value, .. } => {
                if let Operand::Param(p) = value {
                    out.push(p);
                }
            }
            Self::Between { low, high, .. } => {
                for operand in [low, high] {
                    if let Operand::Param(p) = operand {
                        out.push(p);
                    }
                }
            }
            Self::IsNull(_)
            | Self::IsNotNull(_)
            | Self::NotEmpty(_)
            | Self::IsEmpty(_)
            | Self::WithinDays { .. } => {}
        }
    }
}

/// Typed value of a bound parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    TextList(Vec<String>),
    Int(i64),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub value: ParamValue,
}

/// Bound parameters of one compilation.
///
/// Names are `<prefix>_<n>` where `n` is a running counter owned by this
/// value, so they never collide within one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    params: Vec<Param>,
    next_index: usize,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value under a fresh name derived from `prefix`.
    pub fn bind(&mut self, prefix: &str, value: ParamValue) -> ParamRef {
        let name = format!("{prefix}_{}", self.next_index);
        self.next_index += 1;
        self.params.push(Param {
            name: name.clone(),
            value,
        });
        ParamRef(name)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Computed value exposed next to the row, e.g. a relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraColumn {
    pub expr: Projection,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Full-text relevance of the row for `query`.
    Rank { index: TextIndex, query: ParamRef },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NullsOrder {
    #[serde(rename = "NULLS FIRST")]
    First,
    #[serde(rename = "NULLS LAST")]
    Last,
}

/// One `ORDER BY` entry. `by` is a column name or an extra-column alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortDirective {
    pub by: String,
    pub direction: SortDirection,
    pub nulls: NullsOrder,
}

impl SortDirective {
    /// Directive with nulls sorted last.
    pub fn new(by: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            by: by.into(),
            direction,
            nulls: NullsOrder::Last,
        }
    }
}
