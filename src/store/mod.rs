//! Storage-engine seam.
//!
//! The executors talk to storage only through [`ItemStore`]. An engine must
//! understand the whole [`Predicate`] vocabulary with parameters bound by
//! name; [`crate::search::sql`] shows the PostgreSQL rendering and
//! [`memory::MemoryStore`] evaluates it in process.

pub mod memory;
pub mod text;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::item::{ItemState, LibraryItem};
use crate::model::label::{EntityLabel, Label};
use crate::search::predicate::{ExtraColumn, Parameters, Predicate, SortDirective};

/// A `WHERE` clause and the values it refers to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// `None` matches every row.
    pub predicate: Option<Predicate>,
    pub parameters: Parameters,
}

/// One page read.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub filter: Filter,
    pub extra_columns: Vec<ExtraColumn>,
    /// Never empty when built by the search executor.
    pub sort: Vec<SortDirective>,
    pub offset: usize,
    pub limit: usize,
}

/// A matching row plus the values of any extra columns, keyed by alias.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRow {
    #[serde(flatten)]
    pub item: LibraryItem,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub scores: BTreeMap<String, f64>,
}

/// Column assignments for a bulk update. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemChanges {
    pub state: Option<ItemState>,
    pub folder: Option<String>,
    pub archived_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    /// Sets both top and bottom reading progress.
    pub reading_progress: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ItemChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Operations the search and bulk executors need from a storage engine.
///
/// Implementations provide their own consistency; callers add no locking.
pub trait ItemStore: Send + Sync {
    /// Rows matching `query.filter`, ordered and paginated.
    fn select(&self, query: &SelectQuery) -> Result<Vec<ItemRow>>;

    /// Number of rows matching `filter`.
    fn count(&self, filter: &Filter) -> Result<usize>;

    /// Apply `changes` to every matching row and return how many changed.
    fn update(&self, filter: &Filter, changes: &ItemChanges) -> Result<usize>;

    /// Ids of every matching row.
    fn select_ids(&self, filter: &Filter) -> Result<Vec<String>>;

    /// The user's labels among `ids`. Unknown ids are left out.
    fn find_labels(&self, user_id: &str, ids: &[String]) -> Result<Vec<Label>>;

    /// Existing label links for the given items.
    fn entity_labels(&self, item_ids: &[String]) -> Result<Vec<EntityLabel>>;

    /// Insert label links, silently skipping ones that already exist.
    /// Returns the number actually inserted.
    fn insert_labels(&self, links: &[EntityLabel]) -> Result<usize>;
}
