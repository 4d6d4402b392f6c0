use serde::{Deserialize, Serialize};

/// Top-level application settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppSettings {
    /// Directory holding the database, thumbnails and archives.
    /// Empty means the platform data directory.
    #[serde(default)]
    pub data_dir: String,
    #[serde(default)]
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub archive_cache: ArchiveCacheSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            refresh: RefreshSettings::default(),
            fetch: FetchSettings::default(),
            archive_cache: ArchiveCacheSettings::default(),
        }
    }
}

/// Limits applied to "update cache" batches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshSettings {
    /// Maximum number of fetches in flight at once.
    pub concurrency_limit: usize,
    /// Largest batch accepted for a plain refresh.
    pub max_batch_size: usize,
    /// Largest batch accepted when archives are requested.
    pub max_archive_batch_size: usize,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: 10,
            max_batch_size: 20,
            max_archive_batch_size: 5,
        }
    }
}

/// Outbound HTTP settings for the remote fetcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_body_bytes: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: format!("bookshelf/{}", env!("CARGO_PKG_VERSION")),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Bounds for the opened-archive cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveCacheSettings {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for ArchiveCacheSettings {
    fn default() -> Self {
        Self {
            capacity: 16,
            ttl_secs: 300,
        }
    }
}
