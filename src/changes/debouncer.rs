//! Event debouncer for file change notifications
//!
//! Accumulates events within a configurable time window and produces
//! normalized change batches, so a burst of saves or a branch switch
//! becomes one dirty pass.

use crate::changes::{ChangeBatch, ChangeConfig, ChangeKind, FileChange};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Debouncer that accumulates file changes within a time window
pub struct EventDebouncer {
    config: ChangeConfig,
    /// Most recent normalized kind by path
    pending: HashMap<PathBuf, ChangeKind>,
    /// Time of the last event (any file)
    last_event: Option<Instant>,
}

impl EventDebouncer {
    pub fn new(config: ChangeConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            last_event: None,
        }
    }

    /// Add a file change event to the debouncer
    pub fn add_event(&mut self, path: PathBuf, kind: ChangeKind) {
        self.last_event = Some(Instant::now());

        let Some(&existing) = self.pending.get(&path) else {
            self.pending.insert(path, kind);
            return;
        };

        let new_kind = match (existing, kind) {
            // Create + Modify = Create (content update during creation)
            (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
            // Create + Delete = noop
            (ChangeKind::Created, ChangeKind::Deleted | ChangeKind::Renamed) => {
                self.pending.remove(&path);
                return;
            }
            // Delete + Create = Modified (file was replaced)
            (ChangeKind::Deleted | ChangeKind::Renamed, ChangeKind::Created) => ChangeKind::Modified,
            (ChangeKind::Deleted, ChangeKind::Modified) => ChangeKind::Modified,
            (_, ChangeKind::Renamed) => ChangeKind::Deleted,
            _ => kind,
        };
        self.pending.insert(path, new_kind);
    }

    /// Check if the debounce window has elapsed since the last event
    pub fn is_ready(&self) -> bool {
        self.last_event
            .is_some_and(|last| last.elapsed() >= self.config.debounce_duration())
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Time until the next batch is ready (None if no pending events)
    pub fn time_until_ready(&self) -> Option<Duration> {
        self.last_event.map(|last| {
            self.config
                .debounce_duration()
                .saturating_sub(last.elapsed())
        })
    }

    /// Flush all pending changes into a batch
    /// Returns None if no changes are pending
    pub fn flush(&mut self) -> Option<ChangeBatch> {
        self.last_event = None;
        if self.pending.is_empty() {
            return None;
        }

        let mut batch = ChangeBatch::new();
        for (path, kind) in self.pending.drain() {
            batch.add(FileChange { path, kind });
        }

        if batch.is_empty() { None } else { Some(batch) }
    }

    /// Flush only when the debounce window has passed
    pub fn poll(&mut self) -> Option<ChangeBatch> {
        if self.is_ready() { self.flush() } else { None }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_event = None;
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
