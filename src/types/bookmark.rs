use serde::{Deserialize, Serialize};

/// Represents a saved bookmark.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    #[serde(default)]
    pub id: i64,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub public: bool,
    /// UNIX timestamp of the last save.
    #[serde(default)]
    pub modified: i64,
    /// Readable plain text. Only loaded when explicitly requested.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// Readable HTML. Only loaded when explicitly requested.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub html: String,
    #[serde(default, rename = "imageURL")]
    pub image_url: String,
    #[serde(default)]
    pub has_content: bool,
    #[serde(default)]
    pub has_archive: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Per-pass flag: write an archive file during processing. Never stored.
    #[serde(default, skip_serializing)]
    pub create_archive: bool,
    /// Per-pass flag: keep the given title and excerpt during processing. Never stored.
    #[serde(default, skip_serializing)]
    pub keep_metadata: bool,
}

impl Bookmark {
    /// Creates a bookmark that only carries an ID and a URL.
    pub fn new(id: i64, url: &str) -> Self {
        Self {
            id,
            url: url.to_string(),
            ..Default::default()
        }
    }
}

/// A tag attached to bookmarks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    /// Marks the tag for removal during a tag diff. Never sent to clients.
    #[serde(skip)]
    pub deleted: bool,
    #[serde(default, rename = "nBookmarks", skip_serializing_if = "is_zero")]
    pub n_bookmarks: i64,
}

impl Tag {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// Sort order for bookmark listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderMethod {
    #[default]
    Default,
    ByLastAdded,
    ByLastModified,
}

/// Filter used when loading bookmarks from storage.
#[derive(Debug, Clone, Default)]
pub struct GetBookmarksOptions {
    pub ids: Vec<i64>,
    pub tags: Vec<String>,
    pub excluded_tags: Vec<String>,
    pub keyword: String,
    pub with_content: bool,
    pub order_method: OrderMethod,
    /// Zero means no limit.
    pub limit: i64,
    pub offset: i64,
}

/// Listing query as sent by clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarkQuery {
    pub keyword: String,
    pub tags: Vec<String>,
    #[serde(rename = "exclude")]
    pub excluded_tags: Vec<String>,
    /// 1-based page number. Values below 1 mean the first page.
    pub page: i64,
}

/// One page of a bookmark listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkPage {
    pub page: i64,
    pub max_page: i64,
    pub bookmarks: Vec<Bookmark>,
}
