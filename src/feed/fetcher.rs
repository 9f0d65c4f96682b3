use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::util::{validate_url, UrlValidationError};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Request timeout used when the configuration does not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifying User-Agent sent with every request.
///
/// Some origins (reddit among them) answer generic client identities with
/// an HTTP error, so this must never be left to the library default.
pub const USER_AGENT: &str = concat!(
    "rss2push/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/rss2push/rss2push)"
);

/// Errors that can occur while retrieving a feed.
///
/// Only transport-level problems are errors: a non-2xx response still yields
/// its body and is left for the parser to judge.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The feed URI is not an absolute http(s) URL
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Retrieves raw feed documents over HTTP.
///
/// One attempt per call, no retries. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedFetcher {
    /// Builds a fetcher with its own client carrying [`USER_AGENT`].
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    /// The underlying client, shared with the notification sinks.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetches `uri` and returns the response body.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] - `uri` is not an http(s) URL
    /// - [`FetchError::Network`] - connection, TLS or body read failure
    /// - [`FetchError::Timeout`] - no complete response within the timeout
    /// - [`FetchError::ResponseTooLarge`] - body exceeded 10MB
    pub async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        let url = validate_url(uri)?;

        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
            .map_err(FetchError::Network)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                feed = %uri,
                status = %status,
                "Feed returned non-success status, parsing body anyway"
            );
        }

        let bytes = tokio::time::timeout(self.timeout, read_limited_bytes(response, MAX_FEED_SIZE))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        tracing::debug!(feed = %uri, bytes = bytes.len(), status = %status, "Fetched feed");
        Ok(bytes)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
