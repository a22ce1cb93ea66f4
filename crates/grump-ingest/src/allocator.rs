//! Budget allocation across sources
//!
//! Each accepted source may contribute at most `min(cap, budget - total)`
//! characters of text. The rendered fragment (attribution header, content
//! and truncation marker) is what gets charged, so `total` can run slightly
//! past the budget on the last fragment. Once `total` reaches the budget the
//! allocator is exhausted and the caller must stop before fetching anything
//! else.

use grump_protocol::models::{ExtractedDocument, KnowledgeFragment, KnowledgeSnapshot};
use tracing::debug;

/// What happened to one offered document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// The budget was already spent; the document was not counted
    Exhausted,
    /// The document had no usable text
    Skipped,
    /// A fragment was added
    Accepted {
        /// Whether the text was cut to the allowance
        truncated: bool,
        /// Rendered characters charged for this fragment
        consumed: usize,
        /// Running total after this fragment
        total: usize,
    },
}

/// Running budget for a single ingestion cycle
#[derive(Debug)]
pub struct BudgetAllocator {
    budget: usize,
    cap: usize,
    total: usize,
    fragments: Vec<KnowledgeFragment>,
    skipped: usize,
}

impl BudgetAllocator {
    /// Create an allocator with a global `budget` and a per-source `cap`
    pub fn new(budget: usize, cap: usize) -> Self {
        Self {
            budget,
            cap,
            total: 0,
            fragments: Vec::new(),
            skipped: 0,
        }
    }

    /// True once the running total has reached the budget
    pub fn is_exhausted(&self) -> bool {
        self.total >= self.budget
    }

    /// Characters the next source may contribute
    pub fn allowance(&self) -> usize {
        self.cap.min(self.budget.saturating_sub(self.total))
    }

    /// Characters charged so far
    pub fn total(&self) -> usize {
        self.total
    }

    /// Offer the extracted text of one source
    pub fn offer(&mut self, document: ExtractedDocument) -> Allocation {
        if self.is_exhausted() {
            return Allocation::Exhausted;
        }
        if document.is_blank() {
            self.record_skip();
            return Allocation::Skipped;
        }

        let allowed = self.allowance();
        let (content, truncated) = match document.text.char_indices().nth(allowed) {
            Some((cut, _)) => (document.text[..cut].to_string(), true),
            None => (document.text, false),
        };

        let source = document.source;
        let fragment = KnowledgeFragment {
            source_label: source.label(),
            source_url: source
                .is_remote()
                .then(|| source.public_identifier().to_string()),
            group: source.group(),
            content,
            truncated,
        };
        let consumed = fragment.rendered_len();
        self.total += consumed;
        debug!(
            source = %fragment.source_label,
            allowed,
            consumed,
            total = self.total,
            truncated,
            "Fragment accepted"
        );
        self.fragments.push(fragment);

        Allocation::Accepted {
            truncated,
            consumed,
            total: self.total,
        }
    }

    /// Count a source that failed before reaching the allocator
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Close the cycle and assemble its snapshot
    pub fn finish(self, version: u64) -> KnowledgeSnapshot {
        let processed = self.fragments.len();
        KnowledgeSnapshot::from_fragments(version, self.fragments, processed, self.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grump_protocol::models::{DocumentRef, TRUNCATION_MARKER};
    use pretty_assertions::assert_eq;

    fn doc(path: &str, text: &str) -> ExtractedDocument {
        ExtractedDocument::new(DocumentRef::local(path), text)
    }

    #[test]
    fn short_text_is_kept_whole() {
        let mut allocator = BudgetAllocator::new(1_000, 100);
        let outcome = allocator.offer(doc("/kb/a.md", "hello"));
        assert!(matches!(
            outcome,
            Allocation::Accepted {
                truncated: false,
                ..
            }
        ));
        let snapshot = allocator.finish(1);
        assert_eq!(snapshot.text, "\n\n[Knowledge from \"a.md\":\nhello\n]");
        assert_eq!(snapshot.processed_count, 1);
        assert_eq!(snapshot.total_chars, snapshot.text.chars().count());
    }

    #[test]
    fn long_text_is_cut_to_cap_with_marker() {
        let mut allocator = BudgetAllocator::new(10_000, 10);
        allocator.offer(doc("/kb/a.md", &"x".repeat(25)));
        let snapshot = allocator.finish(1);
        let fragment = &snapshot.fragments[0];
        assert_eq!(fragment.content, "x".repeat(10));
        assert!(fragment.truncated);
        assert!(snapshot.text.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn text_exactly_at_allowance_is_not_marked() {
        let mut allocator = BudgetAllocator::new(10_000, 10);
        allocator.offer(doc("/kb/a.md", &"y".repeat(10)));
        let snapshot = allocator.finish(1);
        assert!(!snapshot.fragments[0].truncated);
        assert!(!snapshot.text.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn allowance_shrinks_with_remaining_budget() {
        let mut allocator = BudgetAllocator::new(60, 1_000);
        allocator.offer(doc("/kb/a.md", "abc"));
        let remaining = 60 - allocator.total();
        assert_eq!(allocator.allowance(), remaining);

        allocator.offer(doc("/kb/b.md", &"z".repeat(200)));
        let snapshot = allocator.finish(1);
        assert_eq!(snapshot.fragments[1].content.chars().count(), remaining);
        assert!(snapshot.fragments[1].truncated);
    }

    #[test]
    fn exhausted_budget_rejects_without_counting() {
        let mut allocator = BudgetAllocator::new(100, 1_000);
        allocator.offer(doc("/kb/a.md", &"a".repeat(80)));
        assert!(allocator.is_exhausted());
        assert_eq!(allocator.offer(doc("/kb/b.md", "more")), Allocation::Exhausted);

        let snapshot = allocator.finish(1);
        assert_eq!(snapshot.processed_count, 1);
        assert_eq!(snapshot.skipped_count, 0);
    }

    #[test]
    fn blank_text_is_skipped() {
        let mut allocator = BudgetAllocator::new(100, 50);
        assert_eq!(allocator.offer(doc("/kb/a.md", "  \n\t ")), Allocation::Skipped);
        assert_eq!(allocator.total(), 0);
        let snapshot = allocator.finish(1);
        assert_eq!(snapshot.skipped_count, 1);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut allocator = BudgetAllocator::new(1_000, 3);
        allocator.offer(doc("/kb/a.md", "ééééé"));
        let snapshot = allocator.finish(1);
        assert_eq!(snapshot.fragments[0].content, "ééé");
    }

    #[test]
    fn remote_fragments_carry_their_url() {
        let mut allocator = BudgetAllocator::new(1_000, 100);
        allocator.offer(ExtractedDocument::new(
            DocumentRef::remote("https://x.test/dir/notes.md"),
            "remote text",
        ));
        let snapshot = allocator.finish(1);
        assert!(snapshot
            .text
            .starts_with("\n\n[Knowledge from \"notes.md\" (https://x.test/dir/notes.md):\n"));
        assert_eq!(snapshot.per_category.remote, 1);
    }

    #[test]
    fn remote_url_query_is_not_rendered() {
        let mut allocator = BudgetAllocator::new(1_000, 100);
        allocator.offer(ExtractedDocument::new(
            DocumentRef::remote("https://raw.x.test/private/notes.md?token=GHSAT0SECRET"),
            "private text",
        ));
        let snapshot = allocator.finish(1);
        assert_eq!(
            snapshot.fragments[0].source_url.as_deref(),
            Some("https://raw.x.test/private/notes.md")
        );
        assert!(!snapshot.text.contains("GHSAT0SECRET"));
        assert!(snapshot.text.contains("private text"));
    }
}
