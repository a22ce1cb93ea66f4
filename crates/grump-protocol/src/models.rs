use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Marker appended after a fragment whose source text did not fit its allowance.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated for size...]";

/// Separator placed between rendered fragments in a snapshot.
pub const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Where a document comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrigin {
    /// File on the local filesystem
    Local,
    /// Document reachable over HTTP(S)
    Remote,
}

/// Document format, which selects the text extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    /// Markdown or plain text, used verbatim
    Markdown,
    /// Portable Document Format
    Pdf,
}

impl DocumentCategory {
    /// Classify an identifier (path or URL) by its extension.
    ///
    /// `.pdf` (any case) is a PDF; everything else is treated as text.
    pub fn from_identifier(identifier: &str) -> Self {
        let name = strip_query(identifier).to_ascii_lowercase();
        if name.ends_with(".pdf") {
            DocumentCategory::Pdf
        } else {
            DocumentCategory::Markdown
        }
    }

    /// Whether a file name carries one of the supported extensions (`.md`, `.pdf`).
    pub fn is_supported_name(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        lower.ends_with(".md") || lower.ends_with(".pdf")
    }
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentCategory::Markdown => write!(f, "markdown"),
            DocumentCategory::Pdf => write!(f, "pdf"),
        }
    }
}

/// Scan group. Fragments always appear in this order within a snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceGroup {
    /// Markdown files from the local markdown directory
    LocalMarkdown,
    /// PDF files from the local PDF directory
    LocalPdf,
    /// Explicit remote URLs followed by expanded remote-folder entries
    Remote,
}

/// A single candidate document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct DocumentRef {
    /// Local file or remote URL
    pub origin: DocumentOrigin,
    /// Format used for extraction
    pub category: DocumentCategory,
    /// Filesystem path (local) or URL (remote)
    pub identifier: String,
}

impl DocumentRef {
    /// Reference a local file; the category comes from its extension.
    pub fn local(path: impl AsRef<Path>) -> Self {
        let identifier = path.as_ref().to_string_lossy().to_string();
        Self {
            origin: DocumentOrigin::Local,
            category: DocumentCategory::from_identifier(&identifier),
            identifier,
        }
    }

    /// Reference a remote URL; the category comes from its extension.
    pub fn remote(url: impl Into<String>) -> Self {
        let identifier = url.into();
        Self {
            origin: DocumentOrigin::Remote,
            category: DocumentCategory::from_identifier(&identifier),
            identifier,
        }
    }

    /// Override the detected category
    pub fn with_category(mut self, category: DocumentCategory) -> Self {
        self.category = category;
        self
    }

    /// Whether the document is fetched over the network
    pub fn is_remote(&self) -> bool {
        self.origin == DocumentOrigin::Remote
    }

    /// Scan group this document belongs to
    pub fn group(&self) -> SourceGroup {
        match (self.origin, self.category) {
            (DocumentOrigin::Remote, _) => SourceGroup::Remote,
            (DocumentOrigin::Local, DocumentCategory::Markdown) => SourceGroup::LocalMarkdown,
            (DocumentOrigin::Local, DocumentCategory::Pdf) => SourceGroup::LocalPdf,
        }
    }

    /// Identifier safe for prompts and logs: remote URLs lose their query
    /// string and fragment, which may carry access tokens.
    pub fn public_identifier(&self) -> &str {
        match self.origin {
            DocumentOrigin::Local => &self.identifier,
            DocumentOrigin::Remote => strip_query(&self.identifier),
        }
    }

    /// Human-readable label: the file name, or the last URL path segment.
    pub fn label(&self) -> String {
        match self.origin {
            DocumentOrigin::Local => Path::new(&self.identifier)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| self.identifier.clone()),
            DocumentOrigin::Remote => {
                let trimmed = strip_query(&self.identifier).trim_end_matches('/');
                trimmed
                    .rsplit('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .unwrap_or(trimmed)
                    .to_string()
            }
        }
    }
}

fn strip_query(identifier: &str) -> &str {
    identifier
        .split(['?', '#'])
        .next()
        .unwrap_or(identifier)
}

/// Text pulled out of one document. Consumed once by the allocator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedDocument {
    /// The document the text came from
    pub source: DocumentRef,
    /// Extracted plain text
    pub text: String,
    /// When extraction finished
    pub extracted_at: DateTime<Utc>,
}

impl ExtractedDocument {
    /// Wrap freshly extracted text
    pub fn new(source: DocumentRef, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
            extracted_at: Utc::now(),
        }
    }

    /// True when the text has no non-whitespace characters
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// The budget-limited contribution of one source to a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KnowledgeFragment {
    /// File name of the source
    pub source_label: String,
    /// Originating URL for remote sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Scan group of the source
    pub group: SourceGroup,
    /// Kept text, before the attribution wrapper and truncation marker
    pub content: String,
    /// Whether the source text was cut to fit
    pub truncated: bool,
}

impl KnowledgeFragment {
    /// Render the fragment with its attribution header.
    ///
    /// The rendered length is what the allocator charges against the budget.
    pub fn render(&self) -> String {
        let origin = match &self.source_url {
            Some(url) => format!(" ({url})"),
            None => String::new(),
        };
        let marker = if self.truncated { TRUNCATION_MARKER } else { "" };
        format!(
            "\n\n[Knowledge from \"{}\"{}:\n{}{}\n]",
            self.source_label, origin, self.content, marker
        )
    }

    /// Length of [`Self::render`] in characters
    pub fn rendered_len(&self) -> usize {
        self.render().chars().count()
    }
}

/// Per-group counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryCounts {
    /// Local markdown documents
    pub markdown: usize,
    /// Local PDF documents
    pub pdf: usize,
    /// Remote documents
    pub remote: usize,
}

impl CategoryCounts {
    /// Add one to the counter for `group`
    pub fn increment(&mut self, group: SourceGroup) {
        match group {
            SourceGroup::LocalMarkdown => self.markdown += 1,
            SourceGroup::LocalPdf => self.pdf += 1,
            SourceGroup::Remote => self.remote += 1,
        }
    }

    /// Sum of all counters
    pub fn total(&self) -> usize {
        self.markdown + self.pdf + self.remote
    }
}

/// The complete, immutable result of one ingestion cycle
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KnowledgeSnapshot {
    /// Monotonic version; 0 is the initial empty snapshot
    pub version: u64,
    /// Rendered fragments joined with a blank line
    pub text: String,
    /// Fragments in scan order
    pub fragments: Vec<KnowledgeFragment>,
    /// Sources that contributed a fragment
    pub processed_count: usize,
    /// Sources that failed or had no usable text
    pub skipped_count: usize,
    /// Contributed fragments per group
    pub per_category: CategoryCounts,
    /// Character count of `text`
    pub total_chars: usize,
    /// When the cycle finished (None for the initial snapshot)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl KnowledgeSnapshot {
    /// The snapshot a process starts with
    pub fn empty() -> Self {
        Self {
            version: 0,
            text: String::new(),
            fragments: Vec::new(),
            processed_count: 0,
            skipped_count: 0,
            per_category: CategoryCounts::default(),
            total_chars: 0,
            loaded_at: None,
        }
    }

    /// Assemble a snapshot from fragments in scan order
    pub fn from_fragments(
        version: u64,
        fragments: Vec<KnowledgeFragment>,
        processed_count: usize,
        skipped_count: usize,
    ) -> Self {
        let mut per_category = CategoryCounts::default();
        for fragment in &fragments {
            per_category.increment(fragment.group);
        }
        let text = fragments
            .iter()
            .map(KnowledgeFragment::render)
            .collect::<Vec<_>>()
            .join(FRAGMENT_SEPARATOR);
        let total_chars = text.chars().count();

        Self {
            version,
            text,
            fragments,
            processed_count,
            skipped_count,
            per_category,
            total_chars,
            loaded_at: Some(Utc::now()),
        }
    }

    /// True when no knowledge was assembled
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Default for KnowledgeSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Knowledge base overview returned without re-running the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct KnowledgeSummary {
    /// Markdown files currently present locally (recomputed on every call)
    pub local_markdown_files: usize,
    /// PDF files currently present locally (recomputed on every call)
    pub local_pdf_files: usize,
    /// Names of the local markdown files
    pub local_markdown: Vec<String>,
    /// Names of the local PDF files
    pub local_pdfs: Vec<String>,
    /// Remote sources located by the last load
    pub remote_sources: usize,
    /// Processed count of the live snapshot
    pub processed_count: usize,
    /// Skipped count of the live snapshot
    pub skipped_count: usize,
    /// Per-group fragment counts of the live snapshot
    pub per_category: CategoryCounts,
    /// Character count of the live snapshot
    pub total_chars: usize,
    /// Whether the live snapshot carries any knowledge
    pub has_knowledge: bool,
    /// Version of the live snapshot
    pub snapshot_version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn category_from_identifier() {
        assert_eq!(
            DocumentCategory::from_identifier("docs/Guide.PDF"),
            DocumentCategory::Pdf
        );
        assert_eq!(
            DocumentCategory::from_identifier("https://x.test/a.pdf?raw=true"),
            DocumentCategory::Pdf
        );
        assert_eq!(
            DocumentCategory::from_identifier("notes.md"),
            DocumentCategory::Markdown
        );
        assert_eq!(
            DocumentCategory::from_identifier("https://x.test/page"),
            DocumentCategory::Markdown
        );
    }

    #[test]
    fn supported_names() {
        assert!(DocumentCategory::is_supported_name("a.md"));
        assert!(DocumentCategory::is_supported_name("B.PDF"));
        assert!(!DocumentCategory::is_supported_name("c.txt"));
    }

    #[test]
    fn groups_follow_origin_and_category() {
        assert_eq!(DocumentRef::local("/kb/a.md").group(), SourceGroup::LocalMarkdown);
        assert_eq!(DocumentRef::local("/kb/a.pdf").group(), SourceGroup::LocalPdf);
        assert_eq!(
            DocumentRef::remote("https://x.test/a.pdf").group(),
            SourceGroup::Remote
        );
        assert!(SourceGroup::LocalMarkdown < SourceGroup::LocalPdf);
        assert!(SourceGroup::LocalPdf < SourceGroup::Remote);
    }

    #[test]
    fn labels() {
        assert_eq!(DocumentRef::local("/kb/guide.md").label(), "guide.md");
        assert_eq!(
            DocumentRef::remote("https://x.test/dir/manual.pdf?token=1").label(),
            "manual.pdf"
        );
        assert_eq!(DocumentRef::remote("https://x.test/dir/").label(), "dir");
    }

    #[test]
    fn public_identifier_drops_remote_query() {
        assert_eq!(
            DocumentRef::remote("https://raw.x.test/a/b.md?token=abc#top").public_identifier(),
            "https://raw.x.test/a/b.md"
        );
        assert_eq!(
            DocumentRef::local("/kb/notes?.md").public_identifier(),
            "/kb/notes?.md"
        );
    }

    #[test]
    fn render_local_and_remote() {
        let local = KnowledgeFragment {
            source_label: "a.md".to_string(),
            source_url: None,
            group: SourceGroup::LocalMarkdown,
            content: "hello".to_string(),
            truncated: false,
        };
        assert_eq!(local.render(), "\n\n[Knowledge from \"a.md\":\nhello\n]");

        let remote = KnowledgeFragment {
            source_label: "b.pdf".to_string(),
            source_url: Some("https://x.test/b.pdf".to_string()),
            group: SourceGroup::Remote,
            content: "cut".to_string(),
            truncated: true,
        };
        assert_eq!(
            remote.render(),
            "\n\n[Knowledge from \"b.pdf\" (https://x.test/b.pdf):\ncut\n\n[Content truncated for size...]\n]"
        );
        assert_eq!(remote.rendered_len(), remote.render().chars().count());
    }

    #[test]
    fn snapshot_from_fragments_counts_groups() {
        let fragment = |group| KnowledgeFragment {
            source_label: "x".to_string(),
            source_url: None,
            group,
            content: "y".to_string(),
            truncated: false,
        };
        let snapshot = KnowledgeSnapshot::from_fragments(
            3,
            vec![fragment(SourceGroup::LocalMarkdown), fragment(SourceGroup::Remote)],
            2,
            1,
        );
        assert_eq!(snapshot.version, 3);
        assert_eq!(snapshot.per_category.markdown, 1);
        assert_eq!(snapshot.per_category.remote, 1);
        assert_eq!(snapshot.per_category.total(), 2);
        assert_eq!(snapshot.total_chars, snapshot.text.chars().count());
        assert_eq!(snapshot.text.matches("[Knowledge from").count(), 2);
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = KnowledgeSnapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.processed_count, 0);
        assert!(snapshot.loaded_at.is_none());
    }
}
