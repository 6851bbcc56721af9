//! Size probe: learn a resource's declared size without transferring it.

use std::collections::HashMap;

use reqwest::Method;
use tracing::{debug, instrument};

use crate::fetcher::{declared_content_length, Fetcher};

impl Fetcher {
    /// Issues a HEAD request and returns the declared `content-length`.
    ///
    /// Returns `None` for any failure: transport errors, error statuses, and
    /// missing or non-numeric size headers all collapse to "unknown". Never
    /// returns an error.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn peek_size(&self, url: &str) -> Option<u64> {
        match self.send(Method::HEAD, url, &HashMap::new()).await {
            Ok(response) => {
                let size = declared_content_length(&response);
                debug!(size, "size probe complete");
                size
            }
            Err(error) => {
                debug!(error = %error, "size probe failed, treating as unknown");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::Fetcher;

    #[tokio::test]
    async fn test_peek_size_reads_content_length() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/file.bin"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "4096"))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new();
        let url = format!("{}/file.bin", mock_server.uri());
        assert_eq!(fetcher.peek_size(&url).await, Some(4096));
    }

    #[tokio::test]
    async fn test_peek_size_error_status_is_unknown() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new();
        let url = format!("{}/gone", mock_server.uri());
        assert_eq!(fetcher.peek_size(&url).await, None);
    }

    #[tokio::test]
    async fn test_peek_size_unreachable_host_is_unknown() {
        let fetcher = Fetcher::new();
        // Port 1 on loopback refuses connections.
        assert_eq!(fetcher.peek_size("http://127.0.0.1:1/file.bin").await, None);
    }
}
