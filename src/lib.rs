//! Fetchkit
//!
//! Streaming HTTP(S) file transfers with bounded memory use, live
//! progress/speed/ETA reporting, automatic retry with exponential backoff,
//! cooperative cancellation, and bounded-concurrency batch transfer.
//!
//! # Architecture
//!
//! - [`fetcher`] - HTTP client wrapper shared by all operations
//! - [`transfer`] - single-file streaming transfer loop (retry, backoff,
//!   partial-output cleanup)
//! - [`progress`] - rate-limited progress sampling (percentage, speed, ETA)
//! - [`batch`] - semaphore-bounded multi-file orchestration
//! - [`probe`] - HEAD-based size probe
//! - [`error`] - transfer error types
//!
//! # Example
//!
//! ```no_run
//! use fetchkit::{Fetcher, TransferRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let fetcher = Fetcher::new();
//! let request = TransferRequest::new("https://example.com/data.bin", "./data.bin");
//! let outcome = fetcher
//!     .download_file(&request, None, CancellationToken::new())
//!     .await;
//! println!("succeeded: {}, bytes: {}", outcome.succeeded, outcome.bytes_transferred);
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod batch;
pub mod error;
pub mod fetcher;
pub mod probe;
pub mod progress;
pub mod transfer;

// Re-export commonly used types
pub use batch::{
    BatchCompleteFn, BatchItem, BatchOptions, BatchProgressFn, BatchResult, DEFAULT_CONCURRENCY,
};
pub use error::FetchError;
pub use fetcher::Fetcher;
pub use progress::{ProgressSample, ProgressSampler};
pub use transfer::{
    MemoryOptions, MemoryOutcome, ProgressFn, TransferOutcome, TransferRequest,
    DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT,
};
