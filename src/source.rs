//! Source revisions produced by the editor and their resolved form.

use std::sync::atomic::{AtomicU64, Ordering};

/// One immutable snapshot of the editor text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRevision {
    pub id: u64,
    pub text: String,
}

impl SourceRevision {
    pub fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// Hands out monotonically increasing revision ids.
#[derive(Debug, Default)]
pub struct RevisionCounter {
    next: AtomicU64,
}

impl RevisionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self, text: impl Into<String>) -> SourceRevision {
        let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        SourceRevision::new(id, text)
    }
}

/// Source text after directive rewriting, ready to be written to a scratch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub text: String,
    pub revision: u64,
}
