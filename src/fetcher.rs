//! HTTP client wrapper shared by all transfer operations.
//!
//! A [`Fetcher`] owns one `reqwest::Client` and is designed to be created
//! once and reused, taking advantage of connection pooling. It is cheap to
//! clone (the inner client is reference-counted), which is how the batch
//! orchestrator hands it to spawned transfer tasks.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method, Response};
use tracing::debug;
use url::Url;

use crate::error::FetchError;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent identifying the tool.
///
/// Callers can override it per transfer by supplying a `User-Agent` entry in
/// the request headers.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("fetchkit/{version}")
}

/// HTTP fetcher with streaming support.
///
/// # Example
///
/// ```no_run
/// use fetchkit::Fetcher;
///
/// # async fn example() {
/// let fetcher = Fetcher::new();
/// let size = fetcher.peek_size("https://example.com/file.bin").await;
/// println!("declared size: {size:?}");
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    /// Creates a fetcher with the default connect timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
    }

    /// Creates a fetcher with an explicit connect timeout.
    ///
    /// The per-attempt deadline is separate and belongs to the transfer
    /// request; this timeout only bounds connection establishment.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Sends a request with caller headers layered over the client defaults.
    ///
    /// Maps transport failures to [`FetchError::Network`] (or
    /// [`FetchError::Timeout`] for connect timeouts), non-success statuses to
    /// [`FetchError::HttpStatus`], and 204 No Content to
    /// [`FetchError::EmptyBody`].
    pub(crate) async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Response, FetchError> {
        // Validate early so malformed input fails with a clear error instead
        // of a transport-level one.
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let mut request = self.client.request(method, url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status));
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(FetchError::empty_body(url));
        }

        debug!(url = %url, status = status.as_u16(), "request succeeded");
        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Parses a `content-length` response header into a total byte count.
///
/// Absent or non-numeric values collapse to `None` ("unknown"); the transfer
/// loop represents unknown as 0 in progress samples rather than inferring a
/// size.
pub(crate) fn declared_content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_agent_has_name_and_version() {
        let ua = default_user_agent();
        assert!(ua.starts_with("fetchkit/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
    }

    #[tokio::test]
    async fn test_send_rejects_invalid_url() {
        let fetcher = Fetcher::new();
        let result = fetcher
            .send(Method::GET, "not-a-valid-url", &HashMap::new())
            .await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_send_maps_error_status() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new();
        let url = format!("{}/missing", mock_server.uri());
        let result = fetcher.send(Method::GET, &url, &HashMap::new()).await;

        match result {
            Err(FetchError::HttpStatus { status, reason, .. }) => {
                assert_eq!(status, 404);
                assert_eq!(reason, "Not Found");
            }
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_maps_204_to_empty_body() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nothing"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new();
        let url = format!("{}/nothing", mock_server.uri());
        let result = fetcher.send(Method::GET, &url, &HashMap::new()).await;

        assert!(matches!(result, Err(FetchError::EmptyBody { .. })));
    }

    #[tokio::test]
    async fn test_caller_headers_reach_the_server() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gated"))
            .and(header("x-api-key", "sesame"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new();
        let url = format!("{}/gated", mock_server.uri());

        // Without the header the mock does not match and wiremock returns 404.
        let result = fetcher.send(Method::GET, &url, &HashMap::new()).await;
        assert!(result.is_err());

        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), "sesame".to_string());
        let result = fetcher.send(Method::GET, &url, &headers).await;
        assert!(result.is_ok(), "Expected Ok, got: {result:?}");
    }

    #[tokio::test]
    async fn test_caller_user_agent_overrides_default() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ua"))
            .and(header("user-agent", "custom-agent/9.9"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new();
        let url = format!("{}/ua", mock_server.uri());
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), "custom-agent/9.9".to_string());

        let result = fetcher.send(Method::GET, &url, &headers).await;
        assert!(result.is_ok(), "Expected Ok, got: {result:?}");
    }
}
