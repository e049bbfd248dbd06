//! Labels and their association with items.

use serde::{Deserialize, Serialize};

/// A user-defined label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    /// Owner of the label.
    pub user_id: String,
    pub name: String,
}

/// Link between a label and a library item (`entity_labels` row).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityLabel {
    pub label_id: String,
    pub library_item_id: String,
}
