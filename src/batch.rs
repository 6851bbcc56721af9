//! Bounded-concurrency batch transfers.
//!
//! The orchestrator runs many single-file transfers under a semaphore
//! ceiling. It performs no retries of its own - retry and backoff belong
//! entirely to the single-transfer loop - and a failed item never aborts its
//! siblings. Permits are acquired before spawning, so transfers *start* in
//! input order even though they complete first-come-first-served.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::fetcher::Fetcher;
use crate::progress::ProgressSample;
use crate::transfer::{ProgressFn, TransferOutcome, TransferRequest};

/// Default number of simultaneously in-flight transfers.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Per-item progress callback: `(item index, destination filename, sample)`.
pub type BatchProgressFn = Arc<dyn Fn(usize, &str, &ProgressSample) + Send + Sync>;

/// Per-item completion callback: `(item index, destination filename, outcome)`.
pub type BatchCompleteFn = Arc<dyn Fn(usize, &str, &TransferOutcome) + Send + Sync>;

/// One entry in a batch. The index is the caller's stable identity for
/// correlating progress and completion callbacks with its own bookkeeping.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Caller-assigned identity, normally the item's position in the input.
    pub index: usize,
    /// The transfer to perform.
    pub request: TransferRequest,
}

impl BatchItem {
    /// Creates a batch item.
    #[must_use]
    pub fn new(index: usize, request: TransferRequest) -> Self {
        Self { index, request }
    }
}

/// Options for a batch run.
#[derive(Clone, Default)]
pub struct BatchOptions {
    /// Concurrency ceiling; values below 1 are clamped to 1. 0 means "use
    /// [`DEFAULT_CONCURRENCY`]".
    pub concurrency_limit: usize,
    /// Per-item progress callback.
    pub on_progress: Option<BatchProgressFn>,
    /// Per-item completion callback, invoked in completion order.
    pub on_complete: Option<BatchCompleteFn>,
}

impl std::fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOptions")
            .field("concurrency_limit", &self.concurrency_limit)
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Aggregated result of a batch run.
///
/// `outcomes` is index-aligned with the input regardless of completion order,
/// and its length always equals the input length.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// One outcome per input item, in input order.
    pub outcomes: Vec<TransferOutcome>,
    /// Number of succeeded items.
    pub success_count: usize,
    /// Number of failed items.
    pub failure_count: usize,
}

impl Fetcher {
    /// Runs all `items` with at most `concurrency_limit` transfers in flight.
    ///
    /// As each transfer completes, the next queued item (in input order)
    /// starts. `cancel` is shared: once fired, in-flight transfers resolve as
    /// cancelled and queued ones cancel as soon as they start.
    #[instrument(skip(self, items, options, cancel), fields(items = items.len()))]
    pub async fn download_batch(
        &self,
        items: Vec<BatchItem>,
        options: &BatchOptions,
        cancel: tokio_util::sync::CancellationToken,
    ) -> BatchResult {
        let limit = match options.concurrency_limit {
            0 => DEFAULT_CONCURRENCY,
            n => n.max(1),
        };
        let total = items.len();
        info!(total, limit, "starting batch");

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut handles = Vec::with_capacity(total);

        for (position, item) in items.into_iter().enumerate() {
            // Acquire before spawning so starts follow input order and the
            // ceiling is enforced at the spawn site.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                // The semaphore is never closed while we hold it.
                break;
            };

            let fetcher = self.clone();
            let cancel = cancel.clone();
            let on_progress = options.on_progress.clone();
            let on_complete = options.on_complete.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;

                let index = item.index;
                let filename = item
                    .request
                    .destination
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();

                let progress: Option<ProgressFn> = on_progress.map(|callback| {
                    let filename = filename.clone();
                    Arc::new(move |sample: &ProgressSample| {
                        callback(index, &filename, sample);
                    }) as ProgressFn
                });

                debug!(index, url = %item.request.source, "batch item started");
                let outcome = fetcher.download_file(&item.request, progress, cancel).await;

                if let Some(callback) = on_complete {
                    callback(index, &filename, &outcome);
                }
                (position, outcome)
            }));
        }

        let mut outcomes: Vec<Option<TransferOutcome>> = (0..total).map(|_| None).collect();
        for handle in handles {
            match handle.await {
                Ok((position, outcome)) => outcomes[position] = Some(outcome),
                // Task panics are logged but don't fail the batch; the slot
                // is filled with a failed outcome below.
                Err(e) => warn!(error = %e, "batch transfer task panicked"),
            }
        }

        let outcomes: Vec<TransferOutcome> = outcomes
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| TransferOutcome {
                    succeeded: false,
                    destination: None,
                    error_message: Some("transfer task panicked".to_string()),
                    bytes_transferred: 0,
                    duration: std::time::Duration::ZERO,
                })
            })
            .collect();

        let success_count = outcomes.iter().filter(|o| o.succeeded).count();
        let failure_count = outcomes.len() - success_count;
        info!(success_count, failure_count, "batch complete");

        BatchResult {
            outcomes,
            success_count,
            failure_count,
        }
    }
}
