//! Bounded-concurrency refresh pipeline.
//!
//! `RefreshOrchestrator::refresh_batch` re-fetches and reprocesses a batch of
//! bookmarks with at most `concurrency_limit` items in flight. Per-item fetch
//! and processing failures are collected as IDs and never abort siblings.
//! The returned list always has one record per input, in input order: the
//! updated record when the item succeeded, the original otherwise.
//!
//! Batch-size policy is not enforced here; callers reject oversized batches
//! before invoking the orchestrator.

use std::panic;
use std::sync::{Arc, OnceLock};

use tokio::sync::{mpsc, AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::services::fetcher::RemoteFetcher;
use crate::services::processor::{process_blocking, BookmarkProcessor, ProcessRequest};
use crate::types::bookmark::Bookmark;
use crate::types::refresh::{BatchReport, RefreshOutcome, RefreshRequest};

/// Lower bound for the failure channel buffer.
const MIN_FAILURE_BUFFER: usize = 10;

// === AdmissionGate ===

/// Counting gate that bounds how many items are processed at once.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Held while an item is in flight. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Creates a gate with `capacity` slots (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot.
    pub async fn admit(&self) -> Result<AdmissionPermit, AcquireError> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        Ok(AdmissionPermit { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// === FailureCollector ===

/// Many-producer collector of failed bookmark IDs.
///
/// A drain task accumulates IDs until every sender is gone. `finish` consumes
/// the collector, so completion can only be signalled once the caller has
/// joined all producers.
pub struct FailureCollector {
    sender: mpsc::Sender<i64>,
    drain: JoinHandle<Vec<i64>>,
}

/// Sending half handed to a single refresh task.
#[derive(Debug, Clone)]
pub struct FailureReporter {
    sender: mpsc::Sender<i64>,
}

impl FailureCollector {
    /// Starts the drain task. Must be called inside a tokio runtime.
    pub fn new(buffer: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel(buffer.max(MIN_FAILURE_BUFFER));
        let drain = tokio::spawn(async move {
            let mut failed = Vec::new();
            while let Some(id) = receiver.recv().await {
                failed.push(id);
            }
            failed
        });
        Self { sender, drain }
    }

    pub fn reporter(&self) -> FailureReporter {
        FailureReporter {
            sender: self.sender.clone(),
        }
    }

    /// Closes the collector's own sender and waits for the drain to see every report.
    pub async fn finish(self) -> Vec<i64> {
        drop(self.sender);
        match self.drain.await {
            Ok(failed) => failed,
            Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            Err(err) => {
                warn!(error = %err, "failure drain task was cancelled");
                Vec::new()
            }
        }
    }
}

impl FailureReporter {
    pub async fn report(&self, id: i64) {
        if self.sender.send(id).await.is_err() {
            warn!(id, "failure collector closed before report");
        }
    }
}

// === ResultArena ===

/// Fixed-size set of write-once result slots, one per batch index.
#[derive(Debug)]
pub struct ResultArena {
    slots: Arc<Vec<OnceLock<Bookmark>>>,
}

/// Write access to exactly one arena slot.
#[derive(Debug)]
pub struct SlotWriter {
    slots: Arc<Vec<OnceLock<Bookmark>>>,
    index: usize,
}

impl ResultArena {
    pub fn new(len: usize) -> Self {
        Self {
            slots: Arc::new((0..len).map(|_| OnceLock::new()).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the writer for `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn writer(&self, index: usize) -> SlotWriter {
        assert!(
            index < self.slots.len(),
            "result slot {} out of range for batch of {}",
            index,
            self.slots.len()
        );
        SlotWriter {
            slots: Arc::clone(&self.slots),
            index,
        }
    }

    /// Produces the final list: written slots replace the original at the same index.
    pub fn into_merged(self, originals: Vec<Bookmark>) -> Vec<Bookmark> {
        debug_assert_eq!(originals.len(), self.slots.len());
        match Arc::try_unwrap(self.slots) {
            Ok(slots) => originals
                .into_iter()
                .zip(slots)
                .map(|(original, slot)| slot.into_inner().unwrap_or(original))
                .collect(),
            Err(shared) => originals
                .into_iter()
                .zip(shared.iter())
                .map(|(original, slot)| slot.get().cloned().unwrap_or(original))
                .collect(),
        }
    }
}

impl SlotWriter {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Stores the updated record.
    ///
    /// # Panics
    ///
    /// Panics if the slot was already written.
    pub fn write(self, bookmark: Bookmark) {
        if self.slots[self.index].set(bookmark).is_err() {
            panic!("result slot {} written twice", self.index);
        }
    }
}

// === RefreshOrchestrator ===

/// Drives fetch and processing for a batch under a fixed concurrency limit.
pub struct RefreshOrchestrator<F, P> {
    fetcher: Arc<F>,
    processor: Arc<P>,
    concurrency_limit: usize,
}

impl<F, P> RefreshOrchestrator<F, P>
where
    F: RemoteFetcher,
    P: BookmarkProcessor,
{
    pub fn new(fetcher: Arc<F>, processor: Arc<P>, concurrency_limit: usize) -> Self {
        Self {
            fetcher,
            processor,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Refreshes every request and returns the merged records plus failed IDs.
    ///
    /// A panic inside a worker is re-raised here once it is observed.
    pub async fn refresh_batch(&self, requests: Vec<RefreshRequest>) -> BatchReport {
        if requests.is_empty() {
            return BatchReport::default();
        }

        let batch_id = Uuid::new_v4();
        let span = info_span!("refresh_batch", %batch_id, size = requests.len());
        self.run(requests).instrument(span).await
    }

    async fn run(&self, requests: Vec<RefreshRequest>) -> BatchReport {
        let originals: Vec<Bookmark> = requests.iter().map(|r| r.bookmark.clone()).collect();
        let arena = ResultArena::new(requests.len());
        let gate = AdmissionGate::new(self.concurrency_limit);
        let failures = FailureCollector::new(self.concurrency_limit);

        let mut tasks = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let item = RefreshItem {
                fetcher: Arc::clone(&self.fetcher),
                processor: Arc::clone(&self.processor),
                gate: gate.clone(),
                writer: arena.writer(index),
                reporter: failures.reporter(),
                request,
            };
            tasks.spawn(item.run().in_current_span());
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    panic::resume_unwind(err.into_panic());
                }
                warn!(error = %err, "refresh task was cancelled");
            }
        }

        let failed_ids = failures.finish().await;
        let bookmarks = arena.into_merged(originals);

        info!(
            updated = bookmarks.len() - failed_ids.len(),
            failed = failed_ids.len(),
            "refresh batch finished"
        );
        BatchReport {
            bookmarks,
            failed_ids,
        }
    }
}

/// Everything one refresh task owns.
struct RefreshItem<F, P> {
    fetcher: Arc<F>,
    processor: Arc<P>,
    gate: AdmissionGate,
    writer: SlotWriter,
    reporter: FailureReporter,
    request: RefreshRequest,
}

impl<F, P> RefreshItem<F, P>
where
    F: RemoteFetcher,
    P: BookmarkProcessor,
{
    async fn run(self) {
        let RefreshItem {
            fetcher,
            processor,
            gate,
            writer,
            reporter,
            request,
        } = self;

        let id = request.id();
        let _permit = match gate.admit().await {
            Ok(permit) => permit,
            Err(err) => {
                warn!(id, error = %err, "admission gate closed");
                reporter.report(id).await;
                return;
            }
        };

        match refresh_one(&*fetcher, processor, request).await {
            RefreshOutcome::Updated(updated) => writer.write(updated),
            RefreshOutcome::Failed { id } => reporter.report(id).await,
        }
    }
}

/// Fetches and processes one record. The caller holds its admission permit
/// for the whole call, processing included.
async fn refresh_one<F, P>(fetcher: &F, processor: Arc<P>, request: RefreshRequest) -> RefreshOutcome
where
    F: RemoteFetcher,
    P: BookmarkProcessor,
{
    let id = request.id();
    let content = match fetcher.fetch(&request.bookmark.url).await {
        Ok(content) => content,
        Err(err) => {
            warn!(id, url = %request.bookmark.url, error = %err, "failed to fetch bookmark");
            return RefreshOutcome::Failed { id };
        }
    };

    let process_request = ProcessRequest {
        keep_title: request.keep_metadata,
        keep_excerpt: request.keep_metadata,
        create_archive: request.create_archive,
        bookmark: request.bookmark,
        content,
    };

    match process_blocking(processor, process_request).await {
        Ok(updated) => RefreshOutcome::Updated(updated),
        Err(err) => {
            warn!(id, error = %err, "failed to process bookmark");
            RefreshOutcome::Failed { id }
        }
    }
}
