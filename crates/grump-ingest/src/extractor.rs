//! Plain-text extraction
//!
//! Markdown is decoded as UTF-8 (lossy) and used verbatim. PDFs are parsed
//! with `lopdf` on the blocking pool; a parser panic is contained and
//! reported as a parse failure for that document only.

use grump_protocol::models::{DocumentCategory, DocumentRef, ExtractedDocument};
use lopdf::Document;
use thiserror::Error;
use tracing::debug;

/// Extraction failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The document yielded no non-whitespace text
    #[error("no extractable text")]
    Empty,
    /// The document could not be parsed
    #[error("parse failed: {0}")]
    Parse(String),
}

/// Turns document bytes into text for one category
pub trait TextExtractor {
    /// Extract text. An empty string is allowed here; the caller decides
    /// whether that is an error.
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Markdown and plain text
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownExtractor;

impl TextExtractor for MarkdownExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// PDF text layer, page by page
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let document =
            Document::load_mem(bytes).map_err(|e| ExtractError::Parse(format!("invalid PDF: {e}")))?;

        let mut pages = Vec::new();
        for page_number in document.get_pages().keys() {
            match document.extract_text(&[*page_number]) {
                Ok(text) if !text.trim().is_empty() => pages.push(text),
                Ok(_) => {}
                Err(e) => debug!(page = page_number, error = %e, "Skipping unreadable PDF page"),
            }
        }
        Ok(pages.join("\n"))
    }
}

/// Category-dispatching extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct Extractor;

impl Extractor {
    /// Extract the text of `source` from its raw bytes
    pub async fn extract(
        &self,
        source: DocumentRef,
        bytes: Vec<u8>,
    ) -> Result<ExtractedDocument, ExtractError> {
        let text = match source.category {
            DocumentCategory::Markdown => MarkdownExtractor.extract_text(&bytes)?,
            DocumentCategory::Pdf => {
                tokio::task::spawn_blocking(move || PdfExtractor.extract_text(&bytes))
                    .await
                    .map_err(|e| ExtractError::Parse(format!("PDF parser aborted: {e}")))??
            }
        };

        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(ExtractedDocument::new(source, text))
    }
}
