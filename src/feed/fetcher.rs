use crate::feed::parser::{parse_feed, Feed};
use crate::util::{validate_url, UrlValidationError};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

const MAX_RETRIES: u32 = 2;
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

pub const DEFAULT_USER_AGENT: &str = concat!("feedflux/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while fetching one feed.
///
/// All of them are contained to the source that produced them: the worker
/// logs the error and ends without emitting items or writing a checkpoint.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source is not a fetchable http(s) URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The per-source deadline elapsed before the feed was retrieved
    #[error("Request timed out")]
    Timeout,
    /// Feed body could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Something that can turn a feed URL into a parsed [`Feed`].
///
/// The deadline is advisory for implementations: the worker also enforces it
/// by dropping the returned future once it elapses.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str, deadline: Instant) -> Result<Feed, FetchError>;
}

/// [`FeedSource`] backed by an HTTP client and `feed-rs`.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    /// Build a source with its own client identifying as `user_agent`.
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    async fn fetch_bytes(&self, url: &str, deadline: Instant) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FetchError::Timeout);
            }

            let response = self.client.get(url).timeout(remaining).send().await?;
            let status = response.status();

            let retryable = status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error();

            if retryable {
                let delay = Duration::from_secs(2u64.pow(retry_count)); // 1s, 2s
                let out_of_retries = retry_count >= MAX_RETRIES;
                let out_of_time = Instant::now() + delay >= deadline;

                if out_of_retries || out_of_time {
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        return Err(FetchError::RateLimited(retry_count));
                    }
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }

                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count,
                    delay_secs = delay.as_secs(),
                    "Retryable response, backing off"
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            // 4xx errors fail immediately
            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            return read_limited_bytes(response, MAX_FEED_SIZE).await;
        }
    }
}

#[async_trait::async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str, deadline: Instant) -> Result<Feed, FetchError> {
        validate_url(url)?;

        let bytes = self.fetch_bytes(url, deadline).await.map_err(|e| match e {
            FetchError::Network(ref inner) if inner.is_timeout() => FetchError::Timeout,
            other => other,
        })?;

        parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
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
