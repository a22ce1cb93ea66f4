//! Grump Protocol - shared types for the knowledge pipeline
//!
//! This crate holds the data model passed between the ingestion pipeline,
//! the knowledge store and the prompt integrator.
//!
//! # Core Types
//!
//! - [`DocumentRef`] - A candidate document (local path or remote URL)
//! - [`ExtractedDocument`] - Plain text pulled out of one document
//! - [`KnowledgeFragment`] - The budget-limited contribution of one source
//! - [`KnowledgeSnapshot`] - The immutable result of one ingestion cycle
//! - [`KnowledgeSummary`] - Overview served without re-running the pipeline
//!
//! # Example
//!
//! ```rust
//! use grump_protocol::models::{DocumentRef, SourceGroup};
//!
//! let doc = DocumentRef::local("/srv/kb/guide.pdf");
//! assert_eq!(doc.group(), SourceGroup::LocalPdf);
//! assert_eq!(doc.label(), "guide.pdf");
//! ```

#![warn(missing_docs)]

/// Protocol models module
pub mod models;

pub use models::*;
