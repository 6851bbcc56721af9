//! Error types for file transfers.
//!
//! All errors are caught at the attempt boundary inside the transfer loop and
//! translated into either a continued retry or a terminal failed outcome.
//! None of them propagate to callers of the public API; the outcome carries
//! the final error's display string as its only diagnostic payload.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during a single transfer attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS, or a
    /// broken body stream mid-transfer).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The per-attempt deadline elapsed before the attempt completed.
    ///
    /// Retryable, unlike [`FetchError::Cancelled`].
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The caller's cancellation signal fired. Terminal: no further attempts.
    #[error("cancelled while fetching {url}")]
    Cancelled {
        /// The URL being fetched when the signal fired.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} {reason} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The canonical reason phrase for the status code.
        reason: &'static str,
    },

    /// The server returned a success status that carries no body.
    #[error("empty body fetching {url}")]
    EmptyBody {
        /// The URL whose response had no body to stream.
        url: String,
    },

    /// File system error (create, write, flush).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates an HTTP status error with the canonical reason phrase.
    pub fn http_status(url: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown"),
        }
    }

    /// Creates an empty-body error.
    pub fn empty_body(url: impl Into<String>) -> Self {
        Self::EmptyBody { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns true when the error terminates the retry loop immediately.
    ///
    /// Only external cancellation is terminal; every other kind (including a
    /// per-attempt deadline expiry) is retried until attempts are exhausted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// Note on From trait implementations:
// We intentionally do NOT implement `From<reqwest::Error>` or
// `From<std::io::Error>` because the variants require context (url, path)
// that the source errors don't provide. The helper constructors are the
// correct pattern here as they let callers attach that context.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let error = FetchError::timeout("https://example.com/file.bin");
        let msg = error.to_string();
        assert!(msg.contains("timeout"), "Expected 'timeout' in: {msg}");
        assert!(msg.contains("https://example.com/file.bin"));
    }

    #[test]
    fn test_cancelled_display_mentions_cancel() {
        let error = FetchError::cancelled("https://example.com/file.bin");
        assert!(error.to_string().contains("cancel"));
    }

    #[test]
    fn test_http_status_display_has_code_and_reason() {
        let error = FetchError::http_status(
            "https://example.com/file.bin",
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        );
        let msg = error.to_string();
        assert!(msg.contains("500"), "Expected '500' in: {msg}");
        assert!(
            msg.contains("Internal Server Error"),
            "Expected reason in: {msg}"
        );
    }

    #[test]
    fn test_empty_body_display() {
        let error = FetchError::empty_body("https://example.com/file.bin");
        assert!(error.to_string().contains("empty body"));
    }

    #[test]
    fn test_io_display_contains_path() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = FetchError::io(PathBuf::from("/tmp/out.bin"), io_error);
        assert!(error.to_string().contains("/tmp/out.bin"));
    }

    #[test]
    fn test_invalid_url_display() {
        let error = FetchError::invalid_url("not-a-url");
        let msg = error.to_string();
        assert!(msg.contains("invalid URL"), "Expected 'invalid URL' in: {msg}");
        assert!(msg.contains("not-a-url"));
    }

    #[test]
    fn test_only_cancellation_is_terminal() {
        assert!(FetchError::cancelled("u").is_terminal());
        assert!(!FetchError::timeout("u").is_terminal());
        assert!(!FetchError::empty_body("u").is_terminal());
        assert!(
            !FetchError::http_status("u", reqwest::StatusCode::NOT_FOUND).is_terminal()
        );
    }
}
