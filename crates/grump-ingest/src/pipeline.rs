//! Ingestion cycle and the knowledge service
//!
//! [`KnowledgeService`] is the single owner of a loaded knowledge base. A
//! cycle locates sources, processes them strictly in scan order and stops as
//! soon as the budget is spent, then publishes the snapshot and refreshes
//! every backend prompt. Cycles are serialized; readers never wait on one.

use crate::allocator::{Allocation, BudgetAllocator};
use crate::extractor::Extractor;
use crate::fetcher::{DocumentFetcher, HttpFetcher};
use crate::locator::SourceLocator;
use crate::remote_folder::FolderLister;
use crate::{build_http_client, IngestError, Result};
use grump_core::{Backend, IntegrationOutcome, KnowledgeConfig, KnowledgeStore, PromptRegistry};
use grump_protocol::models::{
    CategoryCounts, DocumentRef, ExtractedDocument, KnowledgeSnapshot, KnowledgeSummary,
};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Outcome of one load or reload
#[derive(Debug, Clone, Serialize)]
pub struct ReloadSummary {
    /// Sources that contributed a fragment
    pub processed_count: usize,
    /// Sources that failed or had no usable text
    pub skipped_count: usize,
    /// Contributed fragments per group
    pub per_category: CategoryCounts,
    /// Candidates located per group
    pub located: CategoryCounts,
    /// Characters in the published snapshot
    pub total_chars: usize,
    /// Version of the published snapshot
    pub snapshot_version: u64,
    /// Whether the budget stopped the cycle early
    pub budget_exhausted: bool,
    /// Why the remote folder contributed nothing, if it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_error: Option<String>,
    /// What each backend did with the snapshot
    pub integrations: Vec<(Backend, IntegrationOutcome)>,
}

/// Fetch and extract one source
pub async fn process_source(
    fetcher: &dyn DocumentFetcher,
    document: &DocumentRef,
) -> Result<ExtractedDocument> {
    let bytes = fetcher.fetch(document).await?;
    let extracted = Extractor.extract(document.clone(), bytes).await?;
    Ok(extracted)
}

/// Run one cycle over `documents` and assemble its snapshot.
///
/// Returns the snapshot and whether the budget ran out. Sources after the
/// point of exhaustion are neither fetched nor counted.
pub async fn assemble_snapshot(
    documents: &[DocumentRef],
    fetcher: &dyn DocumentFetcher,
    mut allocator: BudgetAllocator,
    version: u64,
) -> (KnowledgeSnapshot, bool) {
    for (index, document) in documents.iter().enumerate() {
        if allocator.is_exhausted() {
            info!(
                total = allocator.total(),
                remaining_sources = documents.len() - index,
                "Reached knowledge base size limit"
            );
            break;
        }

        let extracted = match process_source(fetcher, document).await {
            Ok(extracted) => extracted,
            Err(IngestError::ExtractionEmpty) => {
                warn!(source = %document.public_identifier(), "No text content found, skipping");
                allocator.record_skip();
                continue;
            }
            Err(e) => {
                warn!(source = %document.public_identifier(), error = %e, "Failed to process source");
                allocator.record_skip();
                continue;
            }
        };

        match allocator.offer(extracted) {
            Allocation::Accepted {
                truncated,
                consumed,
                total,
            } => info!(
                source = %document.label(),
                group = ?document.group(),
                consumed,
                total,
                truncated,
                "Learned from source"
            ),
            Allocation::Skipped => {
                warn!(source = %document.public_identifier(), "No text content found, skipping")
            }
            Allocation::Exhausted => break,
        }
    }

    let exhausted = allocator.is_exhausted();
    (allocator.finish(version), exhausted)
}

/// Loads, holds and serves the knowledge base
pub struct KnowledgeService {
    config: KnowledgeConfig,
    locator: SourceLocator,
    fetcher: Arc<dyn DocumentFetcher>,
    store: KnowledgeStore,
    prompts: PromptRegistry,
    reload_lock: Mutex<()>,
    remote_sources: AtomicUsize,
}

impl std::fmt::Debug for KnowledgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeService")
            .field("locator", &self.locator)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl KnowledgeService {
    /// Create a service over `config`, loading the persona prompt it names
    pub fn new(config: KnowledgeConfig) -> Result<Self> {
        let prompts = PromptRegistry::load(config.prompt_path.as_deref())?;
        Self::with_prompts(config, prompts)
    }

    /// Create a service with an explicit prompt registry
    pub fn with_prompts(config: KnowledgeConfig, prompts: PromptRegistry) -> Result<Self> {
        config.validate()?;
        let http = build_http_client(&config)?;
        let fetcher = Arc::new(HttpFetcher::new(http.clone(), config.max_response_bytes));
        Ok(Self::from_parts(config, prompts, http, fetcher))
    }

    /// Create a service with a custom fetcher
    pub fn from_parts(
        config: KnowledgeConfig,
        prompts: PromptRegistry,
        http: reqwest::Client,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        let lister = FolderLister::new(
            http,
            config.listing_api_base.clone(),
            config.raw_content_base.clone(),
        )
        .with_token(config.listing_token.clone());
        let locator = SourceLocator::new(&config, lister);

        Self {
            config,
            locator,
            fetcher,
            store: KnowledgeStore::new(),
            prompts,
            reload_lock: Mutex::new(()),
            remote_sources: AtomicUsize::new(0),
        }
    }

    /// Load the knowledge base. Same as [`Self::reload`].
    pub async fn load(&self) -> ReloadSummary {
        self.reload().await
    }

    /// Run a full cycle, publish its snapshot and refresh every backend.
    ///
    /// Concurrent calls run one after another; each publishes a complete
    /// snapshot.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> ReloadSummary {
        let _guard = self.reload_lock.lock().await;

        info!("Loading knowledge base");
        let located = self.locator.locate().await;
        self.remote_sources
            .store(located.counts.remote, Ordering::SeqCst);

        let allocator =
            BudgetAllocator::new(self.config.max_total_chars, self.config.max_chars_per_source);
        let version = self.store.next_version();
        let (snapshot, budget_exhausted) =
            assemble_snapshot(&located.documents, self.fetcher.as_ref(), allocator, version).await;

        self.store.replace(snapshot);
        let live = self.store.read();
        let integrations = if live.is_empty() {
            info!("No knowledge available, restoring base prompts");
            self.prompts.reset_all();
            Vec::new()
        } else {
            self.prompts.integrate_all(&live)
        };

        info!(
            processed = live.processed_count,
            skipped = live.skipped_count,
            total_chars = live.total_chars,
            version = live.version,
            "Knowledge base loaded"
        );

        ReloadSummary {
            processed_count: live.processed_count,
            skipped_count: live.skipped_count,
            per_category: live.per_category,
            located: located.counts,
            total_chars: live.total_chars,
            snapshot_version: live.version,
            budget_exhausted,
            folder_error: located.folder_error,
            integrations,
        }
    }

    /// Overview of the live snapshot; local file counts are recomputed now
    pub fn summary(&self) -> KnowledgeSummary {
        let markdown = self.locator.local_markdown();
        let pdfs = self.locator.local_pdfs();
        let live = self.store.read();

        KnowledgeSummary {
            local_markdown_files: markdown.len(),
            local_pdf_files: pdfs.len(),
            local_markdown: markdown.iter().map(DocumentRef::label).collect(),
            local_pdfs: pdfs.iter().map(DocumentRef::label).collect(),
            remote_sources: self.remote_sources.load(Ordering::SeqCst),
            processed_count: live.processed_count,
            skipped_count: live.skipped_count,
            per_category: live.per_category,
            total_chars: live.total_chars,
            has_knowledge: !live.is_empty(),
            snapshot_version: live.version,
        }
    }

    /// The live snapshot
    pub fn snapshot(&self) -> Arc<KnowledgeSnapshot> {
        self.store.read()
    }

    /// Text of the live snapshot
    pub fn knowledge_text(&self) -> String {
        self.store.knowledge_text()
    }

    /// Current system prompt of `backend`
    pub fn system_prompt(&self, backend: Backend) -> Option<String> {
        self.prompts.system_prompt(backend)
    }

    /// Drop all knowledge and restore the base prompts
    pub async fn clear(&self) {
        let _guard = self.reload_lock.lock().await;
        self.store.clear();
        self.prompts.reset_all();
        self.remote_sources.store(0, Ordering::SeqCst);
        info!("Knowledge base cleared");
    }

    /// The configuration this service was built with
    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    /// Prompt registry of all backends
    pub fn prompts(&self) -> &PromptRegistry {
        &self.prompts
    }
}
