//! Search and bulk executors.
//!
//! Both paths compile the query text with the same [`QueryCompiler`] and the
//! same baseline filter, so a search preview and a bulk action over the same
//! text always agree on which items they touch.

pub mod bulk;
pub mod search;

use chrono::{DateTime, FixedOffset, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::item::ItemState;
use crate::search::compiler::{CompileOptions, CompiledQuery, QueryCompiler};
use crate::search::fields::FieldRegistry;
use crate::search::predicate::{
    Column, ParamValue, Parameters, Predicate, SortDirection, SortDirective,
};
use crate::store::ItemStore;

pub use bulk::{BulkAction, BulkRequest, BulkResponse};
pub use search::{SearchRequest, SearchResponse};

/// Hard upper bound on `first`.
pub const MAX_PAGE_SIZE: usize = 100;

/// Column for the caller's default ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortBy {
    #[default]
    UpdatedTime,
    SavedAt,
    PublishedAt,
}

impl SortBy {
    pub fn column(self) -> Column {
        match self {
            Self::UpdatedTime => Column::UpdatedAt,
            Self::SavedAt => Column::SavedAt,
            Self::PublishedAt => Column::PublishedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Caller-supplied default sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortParams {
    #[serde(default)]
    pub by: SortBy,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortParams {
    /// The directive appended after everything the query contributes.
    pub fn directive(self) -> SortDirective {
        let direction = match self.order {
            SortOrder::Ascending => SortDirection::Asc,
            SortOrder::Descending => SortDirection::Desc,
        };
        SortDirective::new(self.by.column().name(), direction)
    }
}

/// Executor settings, usually taken from [`crate::config::SearchConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub default_sort: SortParams,
    pub week_start: Weekday,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: MAX_PAGE_SIZE,
            default_sort: SortParams::default(),
            week_start: Weekday::Mon,
        }
    }
}

impl From<&crate::config::SearchConfig> for SearchSettings {
    fn from(cfg: &crate::config::SearchConfig) -> Self {
        let max_page_size = cfg.page_cap();
        Self {
            default_page_size: cfg.default_page_size.clamp(1, max_page_size),
            max_page_size,
            default_sort: cfg.sort_params(),
            week_start: cfg.week_start(),
        }
    }
}

/// Which lifecycle states the baseline filter lets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Visibility {
    pub include_pending: bool,
    pub include_deleted: bool,
}

/// Search and bulk operations over one storage engine.
pub struct LibraryService<S> {
    registry: FieldRegistry,
    store: S,
    settings: SearchSettings,
}

impl<S: ItemStore> LibraryService<S> {
    pub fn new(store: S) -> Self {
        Self::with_settings(store, SearchSettings::default())
    }

    pub fn with_settings(store: S, settings: SearchSettings) -> Self {
        Self {
            registry: FieldRegistry::standard(),
            store,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    fn compile(
        &self,
        query: &str,
        use_folders: bool,
        now: DateTime<FixedOffset>,
    ) -> Result<CompiledQuery> {
        let options = CompileOptions::new(now)
            .with_folders(use_folders)
            .with_week_start(self.settings.week_start);
        Ok(QueryCompiler::new(&self.registry).compile_text(query, &options)?)
    }
}

/// AND the mandatory ownership and visibility checks onto a compiled predicate.
///
/// Binds its own parameters into `parameters` after the query's, so names
/// never collide with compiler-bound ones.
pub(crate) fn with_baseline(
    predicate: Option<Predicate>,
    parameters: &mut Parameters,
    user_id: &str,
    visibility: Visibility,
    trash: bool,
) -> Predicate {
    let owner = parameters.bind("user_id", ParamValue::Text(user_id.to_string()));
    let mut filter = Predicate::Equals {
        column: Column::UserId,
        value: owner,
    };

    let mut hidden = Vec::new();
    if !visibility.include_pending {
        hidden.push(ItemState::Processing);
    }
    if !visibility.include_deleted && !trash {
        hidden.push(ItemState::Deleted);
    }
    for state in hidden {
        let value = parameters.bind("state", ParamValue::Text(state.as_str().to_string()));
        filter = Predicate::and(
            filter,
            Predicate::NotEquals {
                column: Column::State,
                value,
            },
        );
    }

    match predicate {
        Some(p) => Predicate::and(filter, Predicate::group(p)),
        None => filter,
    }
}
