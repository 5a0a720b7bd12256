//! Completion statistics
//!
//! Listeners never learn why a completion was dropped. These counters keep
//! that distinction available for logs and diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// What happened to one completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionFate {
    /// Current success, resources adopted
    Applied,
    /// Current failure, reported to the listener
    Failed,
    /// Superseded by a newer load
    Stale,
    /// Arrived after the node was disposed
    Disposed,
}

/// Thread-safe completion counters
#[derive(Debug, Default)]
pub struct CompletionStats {
    applied: AtomicU64,
    failed: AtomicU64,
    stale: AtomicU64,
    disposed: AtomicU64,
}

impl CompletionStats {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completion
    pub fn record(&self, fate: CompletionFate) {
        let counter = match fate {
            CompletionFate::Applied => &self.applied,
            CompletionFate::Failed => &self.failed,
            CompletionFate::Stale => &self.stale,
            CompletionFate::Disposed => &self.disposed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    #[must_use]
    pub fn snapshot(&self) -> CompletionSnapshot {
        CompletionSnapshot {
            applied: self.applied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            disposed: self.disposed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CompletionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionSnapshot {
    /// Successful loads adopted by their node
    pub applied: u64,
    /// Failed loads reported to a listener
    pub failed: u64,
    /// Completions dropped because a newer load superseded them
    pub stale: u64,
    /// Completions dropped because the node was disposed
    pub disposed: u64,
}

impl CompletionSnapshot {
    /// All completions seen
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.applied + self.failed + self.stale + self.disposed
    }

    /// Completions that never reached a listener
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.stale + self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let stats = CompletionStats::new();
        stats.record(CompletionFate::Applied);
        stats.record(CompletionFate::Stale);
        stats.record(CompletionFate::Stale);
        stats.record(CompletionFate::Disposed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.applied, 1);
        assert_eq!(snapshot.stale, 2);
        assert_eq!(snapshot.dropped(), 3);
        assert_eq!(snapshot.total(), 4);
    }

    #[test]
    fn test_snapshot_json() {
        let stats = CompletionStats::new();
        stats.record(CompletionFate::Failed);

        let json = serde_json::to_string(&stats.snapshot()).unwrap();
        assert_eq!(json, r#"{"applied":0,"failed":1,"stale":0,"disposed":0}"#);
    }
}
