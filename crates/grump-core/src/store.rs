//! Knowledge snapshot store
//!
//! Holds exactly one live [`KnowledgeSnapshot`]. Snapshots are built
//! entirely outside the store and published with a single `Arc` swap, so a
//! reader sees either the old or the new snapshot, never a mix.

use grump_protocol::models::KnowledgeSnapshot;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Owner of the live knowledge snapshot
#[derive(Debug)]
pub struct KnowledgeStore {
    current: RwLock<Arc<KnowledgeSnapshot>>,
    versions: AtomicU64,
}

impl Default for KnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeStore {
    /// Create a store holding the empty snapshot (version 0)
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(KnowledgeSnapshot::empty())),
            versions: AtomicU64::new(0),
        }
    }

    /// The live snapshot
    pub fn read(&self) -> Arc<KnowledgeSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Text of the live snapshot (empty when nothing is loaded)
    pub fn knowledge_text(&self) -> String {
        self.read().text.clone()
    }

    /// Reserve the version number for the next snapshot
    pub fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish a fully built snapshot, returning the one it replaced
    pub fn replace(&self, snapshot: KnowledgeSnapshot) -> Arc<KnowledgeSnapshot> {
        let next = Arc::new(snapshot);
        debug!(
            version = next.version,
            total_chars = next.total_chars,
            "Publishing knowledge snapshot"
        );
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Drop all knowledge by publishing a fresh empty snapshot
    pub fn clear(&self) -> Arc<KnowledgeSnapshot> {
        let mut empty = KnowledgeSnapshot::empty();
        empty.version = self.next_version();
        self.replace(empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grump_protocol::models::{KnowledgeFragment, SourceGroup};

    fn snapshot(version: u64, content: &str) -> KnowledgeSnapshot {
        KnowledgeSnapshot::from_fragments(
            version,
            vec![KnowledgeFragment {
                source_label: "a.md".to_string(),
                source_url: None,
                group: SourceGroup::LocalMarkdown,
                content: content.to_string(),
                truncated: false,
            }],
            1,
            0,
        )
    }

    #[test]
    fn starts_empty() {
        let store = KnowledgeStore::new();
        assert!(store.read().is_empty());
        assert_eq!(store.read().version, 0);
        assert_eq!(store.knowledge_text(), "");
    }

    #[test]
    fn versions_increase() {
        let store = KnowledgeStore::new();
        assert_eq!(store.next_version(), 1);
        assert_eq!(store.next_version(), 2);
    }

    #[test]
    fn replace_swaps_whole_snapshot() {
        let store = KnowledgeStore::new();
        let held = store.read();

        let previous = store.replace(snapshot(store.next_version(), "first"));
        assert_eq!(previous.version, 0);
        assert!(store.knowledge_text().contains("first"));

        // A reader holding the old Arc keeps seeing the old snapshot.
        assert!(held.is_empty());

        let previous = store.replace(snapshot(store.next_version(), "second"));
        assert!(previous.text.contains("first"));
        let live = store.read();
        assert!(live.text.contains("second"));
        assert!(!live.text.contains("first"));
        assert_eq!(live.version, 2);
    }

    #[test]
    fn clear_publishes_new_empty_version() {
        let store = KnowledgeStore::new();
        store.replace(snapshot(store.next_version(), "kept"));
        let previous = store.clear();
        assert!(previous.text.contains("kept"));
        let live = store.read();
        assert!(live.is_empty());
        assert_eq!(live.version, 2);
    }
}
