//! App Core for Bookshelf.
//!
//! Holds the database, settings and the bookmark service shared by every RPC call.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::database::connection::Database;
use crate::services::bookmark_service::BookmarkService;
use crate::services::crypto_service::PBKDF2_ITERATIONS;
use crate::services::fetcher::{HttpFetcher, RemoteFetcher};
use crate::services::processor::{BookmarkProcessor, ContentProcessor};
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};

/// Database file name inside the data directory.
pub const DB_FILE: &str = "bookshelf.db";

/// Central application struct.
///
/// `BookmarkManager` and `AccountManager` borrow the connection, so they are
/// created on demand from `db.connection()`.
pub struct App<F = HttpFetcher, P = ContentProcessor> {
    pub db: Arc<Database>,
    pub data_dir: PathBuf,
    pub settings_engine: Mutex<SettingsEngine>,
    pub bookmarks: BookmarkService<F, P>,
    /// PBKDF2 iterations used when hashing account passwords.
    pub password_iterations: u32,
}

impl App {
    /// Creates the production app: settings from `BOOKSHELF_CONFIG` or the
    /// platform path, data under the resolved data directory.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings_engine = SettingsEngine::from_env();
        settings_engine.load()?;
        let data_dir = settings_engine.data_dir();
        Self::new(settings_engine, &data_dir)
    }

    /// Creates an app with the HTTP fetcher and content processor.
    pub fn new(settings_engine: SettingsEngine, data_dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let settings = settings_engine.get_settings().clone();
        let fetcher = Arc::new(HttpFetcher::new(&settings.fetch)?);
        let processor = Arc::new(ContentProcessor::new(data_dir));
        Self::with_collaborators(settings_engine, data_dir, fetcher, processor)
    }
}

impl<F, P> App<F, P>
where
    F: RemoteFetcher,
    P: BookmarkProcessor,
{
    /// Creates an app around the given fetcher and processor.
    pub fn with_collaborators(
        settings_engine: SettingsEngine,
        data_dir: &Path,
        fetcher: Arc<F>,
        processor: Arc<P>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        fs::create_dir_all(data_dir)?;
        let db = Arc::new(Database::open(data_dir.join(DB_FILE))?);

        let settings = settings_engine.get_settings().clone();
        let bookmarks = BookmarkService::new(
            Arc::clone(&db),
            data_dir,
            fetcher,
            processor,
            settings.refresh.clone(),
            &settings.archive_cache,
        );

        info!(data_dir = %data_dir.display(), "bookshelf initialized");
        Ok(Self {
            db,
            data_dir: data_dir.to_path_buf(),
            settings_engine: Mutex::new(settings_engine),
            bookmarks,
            password_iterations: PBKDF2_ITERATIONS,
        })
    }
}
