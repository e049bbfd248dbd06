//! Search executor: the read path.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ShelfError};
use crate::store::{Filter, ItemRow, ItemStore, SelectQuery};

use super::{with_baseline, LibraryService, SortParams, Visibility};

/// One page request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub user_id: String,
    pub query: String,
    /// Page size; defaults to the configured page size, capped at 100.
    pub first: Option<usize>,
    /// Cursor returned by the previous page.
    pub after: Option<String>,
    /// Scope `in:<folder>` to the folder even without `use:folders`.
    pub use_folders: bool,
    pub include_deleted: bool,
    pub include_pending: bool,
    /// Also run the count query.
    pub include_total: bool,
    /// Overrides the configured default sort.
    pub sort: Option<SortParams>,
}

impl SearchRequest {
    pub fn new(user_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            query: query.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub items: Vec<ItemRow>,
    /// Present only when the page came back full.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
}

impl<S: ItemStore> LibraryService<S> {
    /// Run one page of a search. `now` is the caller's local time.
    pub fn search(
        &self,
        request: &SearchRequest,
        now: DateTime<FixedOffset>,
    ) -> Result<SearchResponse> {
        let query = self.build_select(request, now)?;
        let items = self.store.select(&query)?;

        let next_cursor =
            (items.len() == query.limit).then(|| (query.offset + query.limit).to_string());
        let total_count = if request.include_total {
            Some(self.store.count(&query.filter)?)
        } else {
            None
        };

        debug!(
            user = %request.user_id,
            returned = items.len(),
            offset = query.offset,
            has_next = next_cursor.is_some(),
            "Search page"
        );

        Ok(SearchResponse {
            items,
            next_cursor,
            total_count,
        })
    }

    /// Number of items the query matches, without reading any.
    pub fn count(&self, request: &SearchRequest, now: DateTime<FixedOffset>) -> Result<usize> {
        let query = self.build_select(request, now)?;
        self.store.count(&query.filter)
    }

    /// The full page query a search would run.
    pub fn build_select(
        &self,
        request: &SearchRequest,
        now: DateTime<FixedOffset>,
    ) -> Result<SelectQuery> {
        let offset = parse_cursor(request.after.as_deref())?;
        let limit = request
            .first
            .unwrap_or(self.settings.default_page_size)
            .clamp(1, self.settings.max_page_size);

        let compiled = self.compile(&request.query, request.use_folders, now)?;
        let mut parameters = compiled.parameters;
        let predicate = with_baseline(
            compiled.predicate,
            &mut parameters,
            &request.user_id,
            Visibility {
                include_pending: request.include_pending,
                include_deleted: request.include_deleted,
            },
            compiled.trash,
        );

        let mut sort = compiled.sort;
        let fallback = request.sort.unwrap_or(self.settings.default_sort).directive();
        if !sort.iter().any(|d| d.by == fallback.by) {
            sort.push(fallback);
        }

        Ok(SelectQuery {
            filter: Filter {
                predicate: Some(predicate),
                parameters,
            },
            extra_columns: compiled.extra_columns,
            sort,
            offset,
            limit,
        })
    }
}

/// Decode an `after` cursor into a row offset.
pub fn parse_cursor(after: Option<&str>) -> Result<usize> {
    match after.map(str::trim) {
        None | Some("") => Ok(0),
        Some(cursor) => cursor
            .parse()
            .map_err(|_| ShelfError::InvalidCursor(cursor.to_string())),
    }
}
