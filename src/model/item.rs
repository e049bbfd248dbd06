//! Library item record and lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a saved item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemState {
    #[default]
    Succeeded,
    /// Still being fetched or parsed ("pending").
    Processing,
    Failed,
    /// Soft-deleted; kept in the trash for a while.
    Deleted,
    Archived,
    ContentNotFetched,
}

impl ItemState {
    /// Value stored in the `state` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "SUCCEEDED",
            Self::Processing => "PROCESSING",
            Self::Failed => "FAILED",
            Self::Deleted => "DELETED",
            Self::Archived => "ARCHIVED",
            Self::ContentNotFetched => "CONTENT_NOT_FETCHED",
        }
    }
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One saved article, newsletter or file in a user's library.
///
/// The search compiler only reads these fields through their column names;
/// the content pipeline owns how they get filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: String,

    /// Owner of the item.
    pub user_id: String,

    #[serde(default)]
    pub state: ItemState,

    /// User-defined folder (`inbox` unless moved).
    #[serde(default = "default_folder")]
    pub folder: String,

    /// Item type, e.g. `ARTICLE`, `FILE`, `BOOK`.
    #[serde(default = "default_item_type")]
    pub item_type: String,

    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form note attached by the user.
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,

    /// Readable text extracted from the page, indexed for full-text search
    /// together with the title.
    #[serde(default)]
    pub content: String,

    /// Newsletter or feed the item came from.
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub item_language: Option<String>,

    /// Names of labels attached to the item itself.
    #[serde(default)]
    pub label_names: Vec<String>,
    /// Names of labels attached to the item's highlights.
    #[serde(default)]
    pub highlight_labels: Vec<String>,
    /// Annotation text of each highlight.
    #[serde(default)]
    pub highlight_annotations: Vec<String>,
    #[serde(default)]
    pub recommender_names: Vec<String>,

    #[serde(default)]
    pub word_count: Option<i64>,
    #[serde(default)]
    pub reading_progress_top_percent: f64,
    #[serde(default)]
    pub reading_progress_bottom_percent: f64,

    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

fn default_folder() -> String {
    "inbox".to_string()
}

fn default_item_type() -> String {
    "ARTICLE".to_string()
}

impl LibraryItem {
    /// A minimal succeeded item in the inbox.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        title: impl Into<String>,
        saved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            state: ItemState::Succeeded,
            folder: default_folder(),
            item_type: default_item_type(),
            title: title.into(),
            author: None,
            description: None,
            note: None,
            site_name: None,
            content: String::new(),
            subscription: None,
            item_language: None,
            label_names: Vec::new(),
            highlight_labels: Vec::new(),
            highlight_annotations: Vec::new(),
            recommender_names: Vec::new(),
            word_count: None,
            reading_progress_top_percent: 0.0,
            reading_progress_bottom_percent: 0.0,
            saved_at,
            updated_at: Some(saved_at),
            published_at: None,
            read_at: None,
            archived_at: None,
            deleted_at: None,
        }
    }
}
