//! Candidate enumeration
//!
//! Produces the documents of one cycle in scan-group order: local markdown,
//! local PDFs, then remote sources (explicit URLs before folder entries).
//! Local directories are scanned one level deep; helper documents such as
//! `README.md` are never treated as knowledge.

use crate::remote_folder::{FolderLister, FolderRef};
use crate::{IngestError, Result};
use grump_core::KnowledgeConfig;
use grump_protocol::models::{CategoryCounts, DocumentCategory, DocumentRef};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File stems (case-insensitive) that are documentation about the knowledge
/// base rather than knowledge
const EXCLUDED_STEMS: &[&str] = &[
    "readme",
    "quick_start",
    "quick-start",
    "quickstart",
    "troubleshooting",
    "status",
];

/// Whether a file name is a helper document
pub fn is_excluded_name(name: &str) -> bool {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    EXCLUDED_STEMS.contains(&stem.as_str())
}

/// Everything located for one cycle
#[derive(Debug, Clone, Default)]
pub struct LocatedSources {
    /// Candidates in scan order
    pub documents: Vec<DocumentRef>,
    /// Candidates per scan group
    pub counts: CategoryCounts,
    /// Why the remote folder contributed nothing, if it failed
    pub folder_error: Option<String>,
}

/// Enumerates candidate documents from configuration
#[derive(Debug, Clone)]
pub struct SourceLocator {
    markdown_dir: PathBuf,
    pdf_dir: PathBuf,
    remote_urls: Vec<String>,
    remote_folder: Option<String>,
    lister: FolderLister,
}

impl SourceLocator {
    /// Build a locator for `config`, listing folders through `lister`
    pub fn new(config: &KnowledgeConfig, lister: FolderLister) -> Self {
        Self {
            markdown_dir: config.markdown_dir.clone(),
            pdf_dir: config.pdf_dir.clone(),
            remote_urls: config.remote_url_list(),
            remote_folder: config.remote_folder.clone(),
            lister,
        }
    }

    /// Markdown files in the markdown directory, sorted by name
    pub fn local_markdown(&self) -> Vec<DocumentRef> {
        scan_dir(&self.markdown_dir, DocumentCategory::Markdown)
    }

    /// PDF files in the PDF directory, sorted by name
    pub fn local_pdfs(&self) -> Vec<DocumentRef> {
        scan_dir(&self.pdf_dir, DocumentCategory::Pdf)
    }

    /// Explicitly configured remote URLs, in configuration order
    pub fn explicit_remote(&self) -> Vec<DocumentRef> {
        self.remote_urls.iter().map(DocumentRef::remote).collect()
    }

    /// Expand the configured remote folder (empty when none is configured)
    pub async fn expand_remote_folder(&self) -> Result<Vec<DocumentRef>> {
        let Some(reference) = self.remote_folder.as_deref() else {
            return Ok(Vec::new());
        };
        let folder = FolderRef::parse(reference)?;
        self.lister.list(&folder).await
    }

    /// Locate every candidate of a cycle.
    ///
    /// A folder that cannot be parsed or listed is logged and contributes
    /// nothing; explicit URLs and local files are unaffected.
    pub async fn locate(&self) -> LocatedSources {
        let mut documents = self.local_markdown();
        documents.extend(self.local_pdfs());
        documents.extend(self.explicit_remote());

        let mut folder_error = None;
        match self.expand_remote_folder().await {
            Ok(entries) => {
                for entry in entries {
                    if documents.iter().any(|d| d.identifier == entry.identifier) {
                        debug!(url = %entry.public_identifier(), "Folder entry already configured explicitly");
                        continue;
                    }
                    documents.push(entry);
                }
            }
            Err(IngestError::DirectoryListing(e)) => {
                warn!(error = %e, "Remote folder listing failed, continuing without it");
                folder_error = Some(e.to_string());
            }
            Err(e) => {
                warn!(error = %e, "Remote folder skipped");
                folder_error = Some(e.to_string());
            }
        }

        let mut counts = CategoryCounts::default();
        for doc in &documents {
            counts.increment(doc.group());
        }
        info!(
            markdown = counts.markdown,
            pdf = counts.pdf,
            remote = counts.remote,
            "Located knowledge sources"
        );

        LocatedSources {
            documents,
            counts,
            folder_error,
        }
    }
}

fn scan_dir(dir: &Path, category: DocumentCategory) -> Vec<DocumentRef> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Knowledge directory missing, treating as empty");
        return Vec::new();
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !DocumentCategory::is_supported_name(&name)
            || DocumentCategory::from_identifier(&name) != category
        {
            continue;
        }
        if is_excluded_name(&name) {
            debug!(file = %name, "Skipping helper document");
            continue;
        }
        documents.push(DocumentRef::local(entry.path()));
    }
    documents
}
