//! Bulk mutation executor: the write path.
//!
//! Scopes a write with the same compiled filter a search would use. Sort
//! directives and ranking columns are read-path only and are dropped.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ShelfError};
use crate::model::item::ItemState;
use crate::model::label::EntityLabel;
use crate::store::{Filter, ItemChanges, ItemStore};

use super::{with_baseline, LibraryService, Visibility};

/// What to do with every matching item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkAction {
    Archive,
    /// Soft delete; the item moves to the trash.
    Delete,
    MarkAsRead,
    MoveToFolder { folder: String },
    AddLabels { label_ids: Vec<String> },
}

impl BulkAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Delete => "delete",
            Self::MarkAsRead => "mark-read",
            Self::MoveToFolder { .. } => "move",
            Self::AddLabels { .. } => "add-labels",
        }
    }

    /// Column assignments for the update actions, `None` for label adds.
    pub fn changes(&self, now: DateTime<Utc>) -> Option<ItemChanges> {
        let changes = match self {
            Self::Archive => ItemChanges {
                archived_at: Some(now),
                state: Some(ItemState::Archived),
                ..Default::default()
            },
            Self::Delete => ItemChanges {
                deleted_at: Some(now),
                state: Some(ItemState::Deleted),
                ..Default::default()
            },
            Self::MarkAsRead => ItemChanges {
                read_at: Some(now),
                reading_progress: Some(100.0),
                ..Default::default()
            },
            Self::MoveToFolder { folder } => ItemChanges {
                folder: Some(folder.clone()),
                ..Default::default()
            },
            Self::AddLabels { .. } => return None,
        };
        Some(ItemChanges {
            updated_at: Some(now),
            ..changes
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub user_id: String,
    pub query: String,
    pub action: BulkAction,
    #[serde(default)]
    pub use_folders: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkResponse {
    /// Items the query matched.
    pub matched: usize,
    /// Rows updated, or label links inserted.
    pub affected: usize,
    pub success: bool,
}

impl<S: ItemStore> LibraryService<S> {
    /// Apply `request.action` to every item the query matches.
    pub fn bulk(&self, request: &BulkRequest, now: DateTime<FixedOffset>) -> Result<BulkResponse> {
        let filter = self.bulk_filter(request, now)?;
        let utc_now = now.with_timezone(&Utc);

        let (matched, affected) = match &request.action {
            BulkAction::AddLabels { label_ids } => {
                self.add_labels(&request.user_id, &filter, label_ids)?
            }
            action => {
                let changes = action.changes(utc_now).unwrap_or_default();
                let updated = self.store.update(&filter, &changes)?;
                (updated, updated)
            }
        };

        info!(
            user = %request.user_id,
            action = request.action.name(),
            matched,
            affected,
            "Bulk action applied"
        );

        Ok(BulkResponse {
            matched,
            affected,
            success: true,
        })
    }

    /// The write scope for a bulk request.
    pub fn bulk_filter(&self, request: &BulkRequest, now: DateTime<FixedOffset>) -> Result<Filter> {
        let compiled = self.compile(&request.query, request.use_folders, now)?;
        let mut parameters = compiled.parameters;
        let predicate = with_baseline(
            compiled.predicate,
            &mut parameters,
            &request.user_id,
            Visibility::default(),
            compiled.trash,
        );
        Ok(Filter {
            predicate: Some(predicate),
            parameters,
        })
    }

    /// Read matching ids, then link each missing label.
    ///
    /// The read and the insert are separate; concurrent identical requests
    /// rely on the store ignoring duplicate links.
    fn add_labels(
        &self,
        user_id: &str,
        filter: &Filter,
        label_ids: &[String],
    ) -> Result<(usize, usize)> {
        let labels = self.store.find_labels(user_id, label_ids)?;
        let known: HashSet<&str> = labels.iter().map(|l| l.id.as_str()).collect();
        if let Some(missing) = label_ids.iter().find(|id| !known.contains(id.as_str())) {
            return Err(ShelfError::NotFound(format!("label {missing}")));
        }

        let item_ids = self.store.select_ids(filter)?;
        if item_ids.is_empty() {
            return Ok((0, 0));
        }

        let existing: HashSet<EntityLabel> =
            self.store.entity_labels(&item_ids)?.into_iter().collect();
        let mut links = Vec::new();
        for item_id in &item_ids {
            for label in &labels {
                let link = EntityLabel {
                    label_id: label.id.clone(),
                    library_item_id: item_id.clone(),
                };
                if !existing.contains(&link) {
                    links.push(link);
                }
            }
        }

        let inserted = if links.is_empty() {
            0
        } else {
            self.store.insert_labels(&links)?
        };
        Ok((item_ids.len(), inserted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_changes() {
        let now = Utc::now();
        let archive = BulkAction::Archive.changes(now).unwrap();
        assert_eq!(archive.state, Some(ItemState::Archived));
        assert_eq!(archive.archived_at, Some(now));
        assert_eq!(archive.updated_at, Some(now));

        let read = BulkAction::MarkAsRead.changes(now).unwrap();
        assert_eq!(read.reading_progress, Some(100.0));
        assert_eq!(read.state, None);

        let delete = BulkAction::Delete.changes(now).unwrap();
        assert_eq!(delete.state, Some(ItemState::Deleted));

        assert!(BulkAction::AddLabels { label_ids: vec![] }
            .changes(now)
            .is_none());
    }

    #[test]
    fn test_action_json_shape() {
        let action: BulkAction =
            serde_json::from_str(r#"{"type": "MOVE_TO_FOLDER", "folder": "later"}"#).unwrap();
        assert_eq!(
            action,
            BulkAction::MoveToFolder {
                folder: "later".into()
            }
        );
        assert_eq!(action.name(), "move");
    }
}
