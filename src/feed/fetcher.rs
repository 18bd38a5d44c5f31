use futures::StreamExt;
use reqwest::StatusCode;
use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default cap on a fetched body (10MB).
pub const DEFAULT_MAX_BODY: usize = 10 * 1024 * 1024;

/// Errors raised by the fetch capability itself.
///
/// An HTTP error status is *not* a `FetchError`: the response is returned
/// as a [`Page`] and callers decide what a non-2xx status means to them.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Connection failed after the headers arrived, while reading the body
    #[error("Failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    /// Request exceeded the configured per-request timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FetchError {
    /// Returns true if a later attempt of the same request may succeed.
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_)
            | FetchError::Body(_)
            | FetchError::Timeout
            | FetchError::IncompleteResponse { .. } => true,
            FetchError::ResponseTooLarge => false,
        }
    }
}

/// A fetched document: status plus the raw body.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl Page {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, replacing invalid UTF-8 sequences.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body as text, failing on invalid UTF-8.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }
}

/// Outbound HTTP GET capability used by the resolver and the extractor.
///
/// Implementations must be stateless with respect to a single request:
/// every call is an independent, idempotent GET.
pub trait Fetch: Send + Sync {
    fn get(&self, url: &Url) -> impl Future<Output = Result<Page, FetchError>> + Send;
}

/// [`Fetch`] backed by a `reqwest::Client`.
///
/// The client carries the user-agent header; some server-rendered pages
/// vary their output or refuse clients that do not look like a browser.
/// Transport errors are stripped of their URL before they are returned.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_body: usize,
}

impl HttpFetcher {
    /// Builds a fetcher whose client sends `user_agent` on every request.
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        max_body: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self::with_client(client, timeout, max_body))
    }

    /// Wraps an existing client (caller controls configuration).
    pub fn with_client(client: reqwest::Client, timeout: Duration, max_body: usize) -> Self {
        Self {
            client,
            timeout,
            max_body,
        }
    }

    async fn fetch(&self, url: &Url) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.without_url()))?;

        let status = response.status();
        let body = read_limited_bytes(response, self.max_body).await?;
        Ok(Page { status, body })
    }
}

impl Fetch for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<Page, FetchError> {
        // The timeout covers the body as well as the headers.
        let page = tokio::time::timeout(self.timeout, self.fetch(url))
            .await
            .map_err(|_| FetchError::Timeout)??;

        tracing::trace!(url = %url, status = %page.status, bytes = page.body.len(), "Fetched");
        Ok(page)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
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
        let chunk = chunk.map_err(|e| FetchError::Body(e.without_url()))?;
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

/// Retry wrapper around another [`Fetch`].
///
/// Retries transient transport failures, HTTP 429 and 5xx responses with
/// exponential backoff (`base_delay`, `2 * base_delay`, `4 * base_delay`, ...).
/// With `max_retries == 0` every call is passed straight through.
///
/// After the last retry a 429/5xx response is returned as-is so the caller
/// still sees the upstream status.
#[derive(Debug, Clone)]
pub struct Retrying<F> {
    inner: F,
    max_retries: u32,
    base_delay: Duration,
}

impl<F> Retrying<F> {
    pub fn new(inner: F, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl<F: Fetch> Fetch for Retrying<F> {
    async fn get(&self, url: &Url) -> Result<Page, FetchError> {
        let mut retry_count = 0;

        loop {
            let result = self.inner.get(url).await;

            let retryable = match &result {
                Ok(page) => {
                    page.status == StatusCode::TOO_MANY_REQUESTS || page.status.is_server_error()
                }
                Err(e) => e.is_transient(),
            };

            if !retryable || retry_count >= self.max_retries {
                return result;
            }

            let delay = self.delay_for(retry_count);
            match &result {
                Ok(page) => tracing::warn!(
                    url = %url,
                    status = %page.status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Upstream error status, retrying after delay"
                ),
                Err(e) => tracing::warn!(
                    url = %url,
                    error = %e,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, retrying after delay"
                ),
            }

            tokio::time::sleep(delay).await;
            retry_count += 1;
        }
    }
}
