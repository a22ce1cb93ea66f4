//! Knowledge Ingestion Engine
//!
//! Turns local directories, remote URLs and a remote folder into one
//! budget-limited [`KnowledgeSnapshot`](grump_protocol::KnowledgeSnapshot).
//!
//! A cycle runs in five stages:
//!
//! 1. [`locator`] enumerates candidate documents in scan-group order
//! 2. [`remote_folder`] expands a folder reference through the listing API
//! 3. [`fetcher`] reads local bytes or downloads remote bodies
//! 4. [`extractor`] turns bytes into plain text
//! 5. [`allocator`] charges each source against the global budget
//!
//! [`pipeline::KnowledgeService`] drives the cycle, publishes the snapshot
//! and refreshes every backend prompt.

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Global budget accounting
pub mod allocator;
/// Text extraction per document category
pub mod extractor;
/// Local and remote byte retrieval
pub mod fetcher;
/// Candidate enumeration
pub mod locator;
/// Cycle orchestration and the public service
pub mod pipeline;
/// Remote folder parsing and listing
pub mod remote_folder;

pub use allocator::{Allocation, BudgetAllocator};
pub use extractor::{ExtractError, Extractor};
pub use fetcher::{DocumentFetcher, FetchError, HttpFetcher};
pub use locator::{LocatedSources, SourceLocator};
pub use pipeline::{KnowledgeService, ReloadSummary};
pub use remote_folder::{DirectoryListingError, FolderLister, FolderRef};

use thiserror::Error;

/// Errors raised while ingesting knowledge.
///
/// Per-source failures are logged and counted as skipped; only
/// [`IngestError::Configuration`] and [`IngestError::Core`] stop a cycle
/// before it starts.
#[derive(Error, Debug)]
pub enum IngestError {
    /// A configured value cannot be used
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A source could not be read or downloaded
    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] FetchError),

    /// A source produced no text
    #[error("Source has no extractable text")]
    ExtractionEmpty,

    /// A source could not be parsed
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The remote folder could not be listed
    #[error("Directory listing failed: {0}")]
    DirectoryListing(#[from] DirectoryListingError),

    /// Error from the core crate
    #[error(transparent)]
    Core(#[from] grump_core::GrumpError),
}

impl From<ExtractError> for IngestError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Empty => IngestError::ExtractionEmpty,
            ExtractError::Parse(msg) => IngestError::Extraction(msg),
        }
    }
}

/// Result type alias using [`IngestError`]
pub type Result<T> = std::result::Result<T, IngestError>;

/// Build the HTTP client shared by the fetcher and the folder lister
pub fn build_http_client(config: &grump_core::KnowledgeConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.fetch_timeout_seconds))
        .user_agent(concat!("grump-knowledge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| IngestError::Configuration(format!("failed to build HTTP client: {e}")))
}
