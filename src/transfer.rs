//! Single-file streaming transfer with retry, backoff, and cleanup.
//!
//! This is the transfer state machine: connect, stream to disk, sample
//! progress, retry with exponential backoff, clean up partial output on
//! terminal failure. [`Fetcher::download_file`] never returns an error; every
//! failure mode is folded into the returned [`TransferOutcome`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::Method;
use serde::Serialize;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::FetchError;
use crate::fetcher::{declared_content_length, Fetcher};
use crate::progress::{ProgressSample, ProgressSampler};

/// Default retry count after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default per-attempt deadline (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default backoff before the first retry (1 second, doubling per attempt).
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Callback receiving rate-limited progress samples during a transfer.
pub type ProgressFn = Arc<dyn Fn(&ProgressSample) + Send + Sync>;

/// Everything needed to transfer one file. Immutable once the transfer runs.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Source URL.
    pub source: String,
    /// Destination file path.
    pub destination: PathBuf,
    /// Extra request headers; a `User-Agent` entry overrides the default
    /// identification header.
    pub headers: HashMap<String, String>,
    /// Deadline for each individual attempt.
    pub timeout: Duration,
    /// Retries after the initial attempt (total attempts = `max_retries + 1`).
    pub max_retries: u32,
    /// Backoff before the first retry; doubles each subsequent retry.
    pub initial_backoff: Duration,
}

impl TransferRequest {
    /// Creates a request with default timeout, retry, and backoff settings.
    #[must_use]
    pub fn new(source: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            headers: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }

    /// Adds a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the per-attempt deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the initial backoff delay.
    #[must_use]
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }
}

/// Terminal result of one transfer, covering its whole retry sequence.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    /// Whether the transfer completed.
    pub succeeded: bool,
    /// Destination path of the written file; `None` on failure.
    pub destination: Option<PathBuf>,
    /// Display string of the last error; `None` on success.
    pub error_message: Option<String>,
    /// Bytes written by the final attempt (counters reset per attempt).
    pub bytes_transferred: u64,
    /// Wall-clock duration of the whole retry sequence.
    pub duration: Duration,
}

impl TransferOutcome {
    fn success(destination: PathBuf, bytes_transferred: u64, duration: Duration) -> Self {
        Self {
            succeeded: true,
            destination: Some(destination),
            error_message: None,
            bytes_transferred,
            duration,
        }
    }

    fn failure(error_message: String, bytes_transferred: u64, duration: Duration) -> Self {
        Self {
            succeeded: false,
            destination: None,
            error_message: Some(error_message),
            bytes_transferred,
            duration,
        }
    }
}

/// Result of an in-memory download.
#[derive(Debug, Clone)]
pub struct MemoryOutcome {
    /// Whether the download completed.
    pub succeeded: bool,
    /// The full response body; `None` on failure.
    pub data: Option<Vec<u8>>,
    /// Display string of the last error; `None` on success.
    pub error_message: Option<String>,
}

impl MemoryOutcome {
    fn success(data: Vec<u8>) -> Self {
        Self {
            succeeded: true,
            data: Some(data),
            error_message: None,
        }
    }

    fn failure(error_message: String) -> Self {
        Self {
            succeeded: false,
            data: None,
            error_message: Some(error_message),
        }
    }
}

/// Retry/backoff settings for [`Fetcher::download_to_memory`].
#[derive(Debug, Clone)]
pub struct MemoryOptions {
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// Deadline for each individual attempt.
    pub timeout: Duration,
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles each subsequent retry.
    pub initial_backoff: Duration,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

/// Backoff before retry number `attempt + 1`: `initial * 2^attempt`.
///
/// No jitter: delays are exact and monotonically increasing. The shift is
/// clamped so pathological retry counts saturate instead of overflowing.
#[must_use]
pub(crate) fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    initial.saturating_mul(1u32 << attempt.min(20))
}

impl Fetcher {
    /// Transfers one file from `request.source` to `request.destination`.
    ///
    /// Never returns an error: all failure is encoded in the outcome. The
    /// attempt loop retries every failure kind except external cancellation,
    /// which resolves the transfer immediately. On terminal failure the
    /// destination path is removed (best-effort) so no partial output survives.
    ///
    /// `progress` receives rate-limited [`ProgressSample`]s plus one final
    /// sample when an attempt's relay completes. `cancel` aborts connect,
    /// streaming, and backoff sleeps alike.
    #[instrument(skip(self, request, progress, cancel), fields(url = %request.source))]
    pub async fn download_file(
        &self,
        request: &TransferRequest,
        progress: Option<ProgressFn>,
        cancel: CancellationToken,
    ) -> TransferOutcome {
        let started = Instant::now();

        if let Some(parent) = request.destination.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent).await {
                    let error = FetchError::io(parent, e);
                    warn!(error = %error, "failed to create destination directory");
                    return TransferOutcome::failure(error.to_string(), 0, started.elapsed());
                }
            }
        }

        for attempt in 0..=request.max_retries {
            let mut bytes_done: u64 = 0;
            debug!(attempt, "starting attempt");

            let result = {
                let relay = self.run_attempt(request, &mut bytes_done, progress.as_ref());
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(FetchError::cancelled(&request.source)),
                    outcome = time::timeout(request.timeout, relay) => match outcome {
                        Ok(inner) => inner,
                        Err(_) => Err(FetchError::timeout(&request.source)),
                    },
                }
            };

            match result {
                Ok(()) => {
                    info!(
                        path = %request.destination.display(),
                        bytes = bytes_done,
                        attempt,
                        "transfer complete"
                    );
                    return TransferOutcome::success(
                        request.destination.clone(),
                        bytes_done,
                        started.elapsed(),
                    );
                }
                Err(error) if error.is_terminal() => {
                    warn!(attempt, error = %error, "transfer cancelled");
                    remove_partial(&request.destination).await;
                    return TransferOutcome::failure(
                        error.to_string(),
                        bytes_done,
                        started.elapsed(),
                    );
                }
                Err(error) if attempt < request.max_retries => {
                    let delay = backoff_delay(request.initial_backoff, attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "attempt failed, backing off"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            remove_partial(&request.destination).await;
                            return TransferOutcome::failure(
                                FetchError::cancelled(&request.source).to_string(),
                                bytes_done,
                                started.elapsed(),
                            );
                        }
                        () = time::sleep(delay) => {}
                    }
                }
                Err(error) => {
                    warn!(attempt, error = %error, "transfer failed after all attempts");
                    remove_partial(&request.destination).await;
                    return TransferOutcome::failure(
                        error.to_string(),
                        bytes_done,
                        started.elapsed(),
                    );
                }
            }
        }

        // Unreachable: the loop always returns at the final attempt. Kept so
        // the function is total even if the loop bounds change.
        TransferOutcome::failure("max retries exceeded".to_string(), 0, started.elapsed())
    }

    /// One attempt: request, open destination (truncating any prior partial
    /// content), relay chunk by chunk, flush, emit the final sample.
    async fn run_attempt(
        &self,
        request: &TransferRequest,
        bytes_done: &mut u64,
        progress: Option<&ProgressFn>,
    ) -> Result<(), FetchError> {
        let response = self
            .send(Method::GET, &request.source, &request.headers)
            .await?;
        let bytes_total = declared_content_length(&response).unwrap_or(0);

        let file = File::create(&request.destination)
            .await
            .map_err(|e| FetchError::io(&request.destination, e))?;
        let mut writer = BufWriter::new(file);
        let mut sampler = ProgressSampler::new(Instant::now());
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::network(&request.source, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(&request.destination, e))?;
            *bytes_done += chunk.len() as u64;

            if let Some(callback) = progress {
                if let Some(sample) = sampler.offer(*bytes_done, bytes_total, Instant::now()) {
                    callback(&sample);
                }
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| FetchError::io(&request.destination, e))?;

        if let Some(callback) = progress {
            callback(&sampler.finish(*bytes_done, bytes_total, Instant::now()));
        }
        Ok(())
    }

    /// Downloads a URL fully into memory with the same retry, backoff, and
    /// cancellation semantics as [`download_file`](Self::download_file).
    ///
    /// The whole response is buffered, so this is unsuitable for very large
    /// payloads; no progress is reported and nothing touches disk.
    #[instrument(skip(self, options, cancel), fields(url = %url))]
    pub async fn download_to_memory(
        &self,
        url: &str,
        options: &MemoryOptions,
        cancel: CancellationToken,
    ) -> MemoryOutcome {
        for attempt in 0..=options.max_retries {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(FetchError::cancelled(url)),
                outcome = time::timeout(options.timeout, self.fetch_bytes(url, &options.headers)) => {
                    match outcome {
                        Ok(inner) => inner,
                        Err(_) => Err(FetchError::timeout(url)),
                    }
                }
            };

            match result {
                Ok(data) => {
                    info!(bytes = data.len(), attempt, "in-memory download complete");
                    return MemoryOutcome::success(data);
                }
                Err(error) if error.is_terminal() => {
                    warn!(attempt, error = %error, "in-memory download cancelled");
                    return MemoryOutcome::failure(error.to_string());
                }
                Err(error) if attempt < options.max_retries => {
                    let delay = backoff_delay(options.initial_backoff, attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "attempt failed, backing off"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return MemoryOutcome::failure(
                                FetchError::cancelled(url).to_string(),
                            );
                        }
                        () = time::sleep(delay) => {}
                    }
                }
                Err(error) => {
                    warn!(attempt, error = %error, "in-memory download failed after all attempts");
                    return MemoryOutcome::failure(error.to_string());
                }
            }
        }

        MemoryOutcome::failure("max retries exceeded".to_string())
    }

    async fn fetch_bytes(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Vec<u8>, FetchError> {
        let response = self.send(Method::GET, url, headers).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Best-effort removal of partial output; "not found" is not an error.
async fn remove_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial output"),
    }
}
