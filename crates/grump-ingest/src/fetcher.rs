//! Byte retrieval for local files and remote URLs

use async_trait::async_trait;
use grump_protocol::models::{DocumentOrigin, DocumentRef};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Reasons a source could not be retrieved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Local read failed
    #[error("IO error: {0}")]
    Io(String),
    /// URL is malformed or not HTTP(S)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),
    /// Body exceeded the response ceiling
    #[error("Response exceeds {limit} bytes")]
    TooLarge {
        /// The configured ceiling
        limit: u64,
    },
    /// Request did not finish within the timeout
    #[error("Request timed out")]
    Timeout,
    /// Connection or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Retrieves the raw bytes of a document
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Read or download `document`
    async fn fetch(&self, document: &DocumentRef) -> Result<Vec<u8>, FetchError>;
}

/// Filesystem reads plus HTTP(S) downloads with a size ceiling
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
    max_response_bytes: u64,
}

impl HttpFetcher {
    /// Create a fetcher over a shared client
    pub fn new(http: reqwest::Client, max_response_bytes: u64) -> Self {
        Self {
            http,
            max_response_bytes,
        }
    }

    async fn read_local(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| FetchError::Io(format!("{path}: {e}")))
    }

    async fn download(&self, document: &DocumentRef) -> Result<Vec<u8>, FetchError> {
        let shown = document.public_identifier();
        let url = Url::parse(&document.identifier)
            .map_err(|e| FetchError::InvalidUrl(format!("{shown}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let mut response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let limit = self.max_response_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FetchError::TooLarge { limit });
        }

        // Content-Length may be absent or wrong; enforce the ceiling while streaming.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        debug!(url = shown, bytes = body.len(), "Downloaded remote document");
        Ok(body)
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    #[instrument(skip(self, document), fields(source = %document.public_identifier()))]
    async fn fetch(&self, document: &DocumentRef) -> Result<Vec<u8>, FetchError> {
        match document.origin {
            DocumentOrigin::Local => self.read_local(&document.identifier).await,
            DocumentOrigin::Remote => self.download(document).await,
        }
    }
}
