//! Bookmark Service for Bookshelf.
//!
//! The request/response operations exposed to the transport layer: listing,
//! inserting, editing, tagging, deleting and refreshing bookmarks, plus
//! archive access. Refresh batches are checked against the configured size
//! limits before any remote fetch happens.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::database::Database;
use crate::managers::archive_cache::{ArchiveCache, ArchiveCacheTrait};
use crate::managers::bookmark_manager::{BookmarkManager, BookmarkManagerTrait};
use crate::services::fetcher::RemoteFetcher;
use crate::services::processor::{
    archive_path, process_blocking, thumb_path, BookmarkProcessor, ProcessRequest,
};
use crate::services::refresh::RefreshOrchestrator;
use crate::services::url_cleaner::remove_utm_params;
use crate::types::bookmark::{Bookmark, BookmarkPage, BookmarkQuery, GetBookmarksOptions, OrderMethod, Tag};
use crate::types::errors::{BookmarkError, ServiceError};
use crate::types::refresh::{BatchReport, RefreshRequest, UpdateCacheRequest};
use crate::types::settings::{ArchiveCacheSettings, RefreshSettings};

/// Number of bookmarks per listing page.
pub const PAGE_SIZE: i64 = 30;

/// Archive contents shared between the cache and callers.
pub type ArchiveData = Arc<Vec<u8>>;

pub struct BookmarkService<F, P> {
    db: Arc<Database>,
    data_dir: PathBuf,
    fetcher: Arc<F>,
    processor: Arc<P>,
    orchestrator: RefreshOrchestrator<F, P>,
    policy: RefreshSettings,
    archives: ArchiveCache<i64, ArchiveData>,
}

impl<F, P> BookmarkService<F, P>
where
    F: RemoteFetcher,
    P: BookmarkProcessor,
{
    pub fn new<D: AsRef<Path>>(
        db: Arc<Database>,
        data_dir: D,
        fetcher: Arc<F>,
        processor: Arc<P>,
        policy: RefreshSettings,
        cache: &ArchiveCacheSettings,
    ) -> Self {
        let orchestrator = RefreshOrchestrator::new(
            Arc::clone(&fetcher),
            Arc::clone(&processor),
            policy.concurrency_limit,
        );

        let archives = ArchiveCache::new(cache.capacity, Duration::from_secs(cache.ttl_secs));
        archives.on_evict(Arc::new(|id: &i64, data: ArchiveData| {
            debug!(id, bytes = data.len(), "archive evicted from cache");
        }));

        Self {
            db,
            data_dir: data_dir.as_ref().to_path_buf(),
            fetcher,
            processor,
            orchestrator,
            policy,
            archives,
        }
    }

    /// Sets the thumbnail URL and archive flag from the files on disk.
    fn decorate(&self, book: &mut Bookmark) {
        if thumb_path(&self.data_dir, book.id).exists() {
            book.image_url = format!("/bookmark/{}/thumb", book.id);
        }
        if archive_path(&self.data_dir, book.id).exists() {
            book.has_archive = true;
        }
    }

    fn load(&self, ids: &[i64]) -> Result<Vec<Bookmark>, ServiceError> {
        let conn = self.db.connection();
        let manager = BookmarkManager::new(&conn);
        let options = GetBookmarksOptions {
            ids: ids.to_vec(),
            with_content: true,
            ..Default::default()
        };
        Ok(manager.get_bookmarks(&options)?)
    }

    fn save(&self, bookmarks: &[Bookmark]) -> Result<Vec<Bookmark>, ServiceError> {
        let conn = self.db.connection();
        Ok(BookmarkManager::new(&conn).save_bookmarks(bookmarks)?)
    }

    /// Returns one page of bookmarks, newest first.
    pub fn get_bookmarks(&self, query: &BookmarkQuery) -> Result<BookmarkPage, ServiceError> {
        let page = query.page.max(1);
        let options = GetBookmarksOptions {
            tags: non_empty(&query.tags),
            excluded_tags: non_empty(&query.excluded_tags),
            keyword: query.keyword.clone(),
            order_method: OrderMethod::ByLastAdded,
            limit: PAGE_SIZE,
            offset: (page - 1) * PAGE_SIZE,
            ..Default::default()
        };

        let (count, mut bookmarks) = {
            let conn = self.db.connection();
            let manager = BookmarkManager::new(&conn);
            (
                manager.get_bookmarks_count(&options)?,
                manager.get_bookmarks(&options)?,
            )
        };

        for book in &mut bookmarks {
            self.decorate(book);
        }

        Ok(BookmarkPage {
            page,
            max_page: (count + PAGE_SIZE - 1) / PAGE_SIZE,
            bookmarks,
        })
    }

    /// Creates a bookmark from a URL, enriching it with the remote content.
    ///
    /// A failed download is tolerated; a fatal processing error aborts the insert.
    pub async fn insert_bookmark(&self, mut book: Bookmark) -> Result<Bookmark, ServiceError> {
        book.id = {
            let conn = self.db.connection();
            BookmarkManager::new(&conn).create_new_id()?
        };
        book.url = remove_utm_params(&book.url).map_err(|e| ServiceError::InvalidUrl(e.to_string()))?;

        match self.fetcher.fetch(&book.url).await {
            Ok(content) => {
                let request = ProcessRequest {
                    keep_title: book.keep_metadata,
                    keep_excerpt: book.keep_metadata,
                    create_archive: book.create_archive,
                    bookmark: book.clone(),
                    content,
                };
                match process_blocking(Arc::clone(&self.processor), request).await {
                    Ok(processed) => book = processed,
                    Err(err) if err.fatal => return Err(ServiceError::Process(err)),
                    Err(mut err) => {
                        if let Some(partial) = err.partial.take() {
                            book = *partial;
                        }
                        warn!(id = book.id, error = %err, "bookmark processed partially");
                    }
                }
            }
            Err(err) => warn!(id = book.id, url = %book.url, error = %err, "failed to download bookmark"),
        }

        if book.title.trim().is_empty() {
            book.title = book.url.clone();
        }

        let mut saved = self
            .save(std::slice::from_ref(&book))?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InvalidInput("bookmark was not saved".to_string()))?;
        self.decorate(&mut saved);

        info!(id = saved.id, url = %saved.url, "bookmark inserted");
        Ok(saved)
    }

    /// Replaces URL, title, excerpt, visibility and tags of an existing bookmark.
    pub fn update_bookmark(&self, request: Bookmark) -> Result<Bookmark, ServiceError> {
        if request.title.trim().is_empty() {
            return Err(ServiceError::InvalidInput("title must not be empty".to_string()));
        }

        let mut book = self
            .load(&[request.id])?
            .into_iter()
            .next()
            .ok_or(ServiceError::Storage(BookmarkError::NotFound(request.id)))?;

        book.url = remove_utm_params(&request.url).map_err(|e| ServiceError::InvalidUrl(e.to_string()))?;
        book.title = request.title.clone();
        book.excerpt = request.excerpt.clone();
        book.public = request.public;
        book.tags = diff_tags(&book.tags, &request.tags);

        let mut saved = self
            .save(std::slice::from_ref(&book))?
            .into_iter()
            .next()
            .ok_or(ServiceError::NoMatchingBookmarks)?;
        saved.image_url = request.image_url;
        saved.has_archive = request.has_archive;
        Ok(saved)
    }

    /// Re-fetches and reprocesses the given bookmarks and persists the results.
    ///
    /// Failed items are saved unchanged and reported in `failed_ids`. A stored
    /// URL that no longer cleans rejects the whole batch before any fetch.
    pub async fn update_cache(&self, request: UpdateCacheRequest) -> Result<BatchReport, ServiceError> {
        let bookmarks = self.load(&request.ids)?;
        self.check_batch(bookmarks.len(), request.create_archive)?;

        let mut requests = Vec::with_capacity(bookmarks.len());
        for mut book in bookmarks {
            book.url = remove_utm_params(&book.url)
                .map_err(|e| ServiceError::InvalidUrl(format!("bookmark {}: {}", book.id, e)))?;
            requests.push(RefreshRequest::new(book, request.create_archive, request.keep_metadata));
        }

        let report = self.orchestrator.refresh_batch(requests).await;
        if request.create_archive {
            // Cached copies may predate the archives just written.
            for book in &report.bookmarks {
                self.archives.remove(&book.id);
            }
        }

        let mut saved = self.save(&report.bookmarks)?;
        for book in &mut saved {
            self.decorate(book);
        }

        Ok(BatchReport {
            bookmarks: saved,
            failed_ids: report.failed_ids,
        })
    }

    /// Rejects empty or oversized refresh batches.
    pub fn check_batch(&self, len: usize, create_archive: bool) -> Result<(), ServiceError> {
        if len == 0 {
            return Err(ServiceError::NoMatchingBookmarks);
        }
        if len > self.policy.max_batch_size {
            return Err(ServiceError::BatchTooLarge {
                limit: self.policy.max_batch_size,
            });
        }
        if create_archive && len > self.policy.max_archive_batch_size {
            return Err(ServiceError::ArchiveBatchTooLarge {
                limit: self.policy.max_archive_batch_size,
            });
        }
        Ok(())
    }

    /// Adds tags to every listed bookmark, skipping names it already has.
    pub fn update_bookmark_tags(&self, ids: &[i64], tags: &[Tag]) -> Result<Vec<Bookmark>, ServiceError> {
        if ids.is_empty() || tags.is_empty() {
            return Err(ServiceError::InvalidInput("IDs and tags must not be empty".to_string()));
        }

        let mut bookmarks = self.load(ids)?;
        if bookmarks.is_empty() {
            return Err(ServiceError::NoMatchingBookmarks);
        }

        for book in &mut bookmarks {
            for tag in tags {
                if !book.tags.iter().any(|existing| existing.name == tag.name) {
                    book.tags.push(Tag::named(&tag.name));
                }
            }
        }

        let mut saved = self.save(&bookmarks)?;
        for book in &mut saved {
            self.decorate(book);
        }
        Ok(saved)
    }

    /// Deletes bookmarks together with their thumbnail and archive files.
    pub fn delete_bookmarks(&self, ids: &[i64]) -> Result<(), ServiceError> {
        {
            let conn = self.db.connection();
            BookmarkManager::new(&conn).delete_bookmarks(ids)?;
        }

        for id in ids {
            self.archives.remove(id);
            for path in [thumb_path(&self.data_dir, *id), archive_path(&self.data_dir, *id)] {
                if let Err(err) = fs::remove_file(&path) {
                    if err.kind() != ErrorKind::NotFound {
                        warn!(id, path = %path.display(), error = %err, "failed to remove bookmark file");
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get_tags(&self) -> Result<Vec<Tag>, ServiceError> {
        let conn = self.db.connection();
        Ok(BookmarkManager::new(&conn).get_tags()?)
    }

    pub fn rename_tag(&self, id: i64, name: &str) -> Result<(), ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::InvalidInput("tag name must not be empty".to_string()));
        }
        let conn = self.db.connection();
        Ok(BookmarkManager::new(&conn).rename_tag(id, name)?)
    }

    /// Returns the archived content of a bookmark, through the archive cache.
    pub fn open_archive(&self, id: i64) -> Result<ArchiveData, ServiceError> {
        if let Some(data) = self.archives.get(&id) {
            return Ok(data);
        }

        let data = match fs::read(archive_path(&self.data_dir, id)) {
            Ok(bytes) => Arc::new(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ServiceError::ArchiveNotFound(id))
            }
            Err(err) => return Err(ServiceError::Io(err.to_string())),
        };
        self.archives.put(id, Arc::clone(&data));
        Ok(data)
    }

    /// Drops expired archives from the cache.
    pub fn purge_archive_cache(&self) -> usize {
        self.archives.purge_expired()
    }
}

/// Computes the tag list to save when replacing `current` with `requested`.
///
/// Existing tags missing from the request are marked deleted; requested
/// names not yet present are appended without an ID.
pub fn diff_tags(current: &[Tag], requested: &[Tag]) -> Vec<Tag> {
    let mut tags: Vec<Tag> = current
        .iter()
        .map(|tag| Tag {
            deleted: true,
            ..tag.clone()
        })
        .collect();

    for wanted in requested {
        match tags.iter_mut().find(|tag| tag.name == wanted.name) {
            Some(existing) => existing.deleted = false,
            None => tags.push(Tag::named(&wanted.name)),
        }
    }
    tags
}

fn non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
