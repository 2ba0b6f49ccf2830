use crate::util::UrlValidationError;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default retry budget for background fetches. Interactive calls use 0.
pub const MAX_RETRIES: u32 = 3;
/// Upper bound on any response body we are willing to buffer.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a feed or page over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL was malformed or refused by the SSRF guard
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the client timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after the retry budget
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body was not a parseable RSS/Atom/JSON feed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(e)
        }
    }
}

/// Backoff before retry number `attempt` (0-based): 2s, 4s, 8s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64 << attempt.min(5))
}

/// GET `url` and return the body, bounded by [`MAX_BODY_SIZE`].
///
/// 429, 5xx and truncated bodies are retried up to `max_retries` times with
/// exponential backoff. Other non-2xx statuses fail immediately. The request
/// timeout is whatever the client was built with.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &Url,
    max_retries: u32,
) -> Result<Vec<u8>, FetchError> {
    let mut retry_count = 0;

    loop {
        let response = client.get(url.as_str()).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if retry_count >= max_retries {
                return Err(FetchError::RateLimited(retry_count));
            }
        } else if status.is_server_error() {
            if retry_count >= max_retries {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }
        } else if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        } else {
            match read_limited_bytes(response, MAX_BODY_SIZE).await {
                Ok(bytes) => return Ok(bytes),
                Err(e @ FetchError::IncompleteResponse { .. }) if retry_count >= max_retries => {
                    return Err(e)
                }
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    tracing::debug!(url = %url, expected, received, "Incomplete download");
                }
                Err(e) => return Err(e),
            }
        }

        let delay = backoff_delay(retry_count);
        tracing::warn!(
            url = %url,
            status = %status,
            retry = retry_count,
            delay_secs = delay.as_secs(),
            "Fetch failed, retrying after delay"
        );
        tokio::time::sleep(delay).await;
        retry_count += 1;
    }
}

/// Read a response body, enforcing `limit` and the announced Content-Length.
pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();
    if expected_length.is_some_and(|len| len > limit as u64) {
        return Err(FetchError::ResponseTooLarge);
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
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
