use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;

/// One unit of refresh work: a bookmark plus the flags for this pass.
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub bookmark: Bookmark,
    pub create_archive: bool,
    pub keep_metadata: bool,
}

impl RefreshRequest {
    pub fn new(mut bookmark: Bookmark, create_archive: bool, keep_metadata: bool) -> Self {
        bookmark.create_archive = create_archive;
        bookmark.keep_metadata = keep_metadata;
        Self {
            bookmark,
            create_archive,
            keep_metadata,
        }
    }

    pub fn id(&self) -> i64 {
        self.bookmark.id
    }
}

/// Result of refreshing a single bookmark.
///
/// A failed item keeps its original record in the merged report.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Updated(Bookmark),
    Failed { id: i64 },
}

/// Merged result of a refresh batch.
///
/// `bookmarks` has the same length and order as the input; each slot holds
/// either the updated record or the untouched original.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub bookmarks: Vec<Bookmark>,
    pub failed_ids: Vec<i64>,
}

/// Body of an "update cache" call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCacheRequest {
    pub ids: Vec<i64>,
    #[serde(default)]
    pub keep_metadata: bool,
    #[serde(default)]
    pub create_archive: bool,
}
