use futures::StreamExt;
use reqwest::header::{ACCEPT, LOCATION, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Per-request budget covering connect, headers and body.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_REDIRECTS: usize = 10;

const CLIENT_AGENT: &str = concat!("caschy/", env!("CARGO_PKG_VERSION"));
const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml, */*";

/// Errors that can occur while retrieving a document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// No complete response within the fetcher's timeout
    #[error("Request timeout after 30 seconds")]
    Timeout,
    /// Response with a status other than 200 that is not a followable redirect
    #[error("Request failed with status code {0}")]
    RequestFailed(u16),
    /// Redirect `Location` that cannot be resolved against the request URL
    #[error("Invalid redirect target: {0}")]
    InvalidRedirect(String),
    #[error("Too many redirects (more than {0})")]
    TooManyRedirects(usize),
    /// Target is neither an absolute URL nor a valid query string
    #[error("Invalid request target: {0}")]
    InvalidTarget(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
}

/// GET-only HTTP client for the blog's feed and REST endpoints.
///
/// Redirects are followed by hand, one hop per request, so every hop gets
/// the same headers and its own timeout.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl Fetcher {
    /// Build a fetcher whose relative targets resolve against `base_url`.
    pub fn new(base_url: Url) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use a caller-configured client. The client should not follow
    /// redirects on its own, otherwise hops bypass this fetcher.
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            timeout: FETCH_TIMEOUT,
        }
    }

    /// Override the per-hop budget (defaults to [`FETCH_TIMEOUT`]).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Turn a fetch target into a URL.
    ///
    /// Targets starting with `http` are absolute URLs; anything else is a raw
    /// query string for the base feed URL.
    pub fn resolve(&self, target: &str) -> Result<Url, FetchError> {
        if target.starts_with("http") {
            return Url::parse(target).map_err(|e| FetchError::InvalidTarget(e.to_string()));
        }
        let mut url = self.base_url.clone();
        url.set_query(Some(target.trim_start_matches('?')));
        Ok(url)
    }

    /// Fetch a target (absolute URL or query string) and return the body.
    pub async fn fetch(&self, target: &str) -> Result<String, FetchError> {
        let url = self.resolve(target)?;
        self.fetch_url(url).await
    }

    /// Fetch an absolute URL, following redirects, and return the body.
    pub async fn fetch_url(&self, url: Url) -> Result<String, FetchError> {
        let mut current = url;

        for _ in 0..=MAX_REDIRECTS {
            tracing::debug!(url = %current, "Fetching");
            match tokio::time::timeout(self.timeout, self.get_once(&current))
                .await
                .map_err(|_| FetchError::Timeout)??
            {
                Hop::Body(body) => return Ok(body),
                Hop::Redirect(next) => {
                    tracing::debug!(from = %current, to = %next, "Following redirect");
                    current = next;
                }
            }
        }

        Err(FetchError::TooManyRedirects(MAX_REDIRECTS))
    }

    async fn get_once(&self, url: &Url) -> Result<Hop, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, CLIENT_AGENT)
            .header(ACCEPT, FEED_ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if status.is_redirection() {
            let Some(location) = response.headers().get(LOCATION) else {
                return Err(FetchError::RequestFailed(status.as_u16()));
            };
            let location = location
                .to_str()
                .map_err(|e| FetchError::InvalidRedirect(e.to_string()))?;
            let next = url
                .join(location)
                .map_err(|e| FetchError::InvalidRedirect(format!("{location}: {e}")))?;
            return Ok(Hop::Redirect(next));
        }

        if status != StatusCode::OK {
            return Err(FetchError::RequestFailed(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_BODY_SIZE).await?;
        String::from_utf8(bytes)
            .map(Hop::Body)
            .map_err(|_| FetchError::InvalidUtf8)
    }
}

enum Hop {
    Body(String),
    Redirect(Url),
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
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

    Ok(bytes)
}
