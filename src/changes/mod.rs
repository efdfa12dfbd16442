//! File change batching for incremental re-indexing.
//!
//! A notifier reports raw events to an [`EventDebouncer`]; once the window
//! has passed the debouncer yields a normalized [`ChangeBatch`], whose known
//! files are handed to the dirty pass.

pub mod debouncer;

pub use debouncer::EventDebouncer;

use crate::error::Result;
use crate::index::dirty::DirtyReport;
use crate::index::files::FileTable;
use crate::index::location::FileId;
use crate::index::set::IndexSet;
use crate::utils::app_data::{AppConfig, DEFAULT_DEBOUNCE_MS};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Kind of file change detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    /// Old path of a rename; the new path arrives as `Created`
    Renamed,
}

/// A single file change event
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Accumulated batch of changes ready for processing
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    pub created: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl ChangeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.created.len() + self.modified.len() + self.deleted.len()
    }

    /// Add a change to the batch
    pub fn add(&mut self, change: FileChange) {
        match change.kind {
            ChangeKind::Created => {
                // Delete + Create = Modified (file was replaced)
                if let Some(pos) = self.deleted.iter().position(|p| p == &change.path) {
                    self.deleted.remove(pos);
                    if !self.modified.contains(&change.path) {
                        self.modified.push(change.path);
                    }
                } else if !self.created.contains(&change.path) {
                    self.created.push(change.path);
                }
            }
            ChangeKind::Modified => {
                // If file was just created, don't add to modified
                if !self.created.contains(&change.path) && !self.modified.contains(&change.path) {
                    self.modified.push(change.path);
                }
            }
            ChangeKind::Deleted | ChangeKind::Renamed => {
                // Create + Delete = noop
                if let Some(pos) = self.created.iter().position(|p| p == &change.path) {
                    self.created.remove(pos);
                    return;
                }
                self.modified.retain(|p| p != &change.path);
                if !self.deleted.contains(&change.path) {
                    self.deleted.push(change.path);
                }
            }
        }
    }

    /// Merge another batch into this one
    pub fn merge(&mut self, other: ChangeBatch) {
        for path in other.created {
            self.add(FileChange {
                path,
                kind: ChangeKind::Created,
            });
        }
        for path in other.modified {
            self.add(FileChange {
                path,
                kind: ChangeKind::Modified,
            });
        }
        for path in other.deleted {
            self.add(FileChange {
                path,
                kind: ChangeKind::Deleted,
            });
        }
    }

    /// Ids of the changed files the index already knows.
    ///
    /// Unknown paths have no facts to invalidate and are skipped.
    pub fn dirty_ids(&self, files: &FileTable) -> Vec<FileId> {
        let ids: BTreeSet<FileId> = self
            .created
            .iter()
            .chain(&self.modified)
            .chain(&self.deleted)
            .filter_map(|path| files.id_for(path))
            .collect();
        ids.into_iter().collect()
    }
}

/// Configuration for change batching
#[derive(Debug, Clone)]
pub struct ChangeConfig {
    /// Changes within this window are batched
    pub debounce_ms: u64,
    /// Run the prunes of a dirty pass in parallel
    pub parallel_prune: bool,
}

impl Default for ChangeConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            parallel_prune: true,
        }
    }
}

impl From<&AppConfig> for ChangeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            debounce_ms: config.debounce_ms,
            parallel_prune: config.parallel_prune,
        }
    }
}

impl ChangeConfig {
    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Invalidate everything derived from the files in `batch`
pub fn apply_batch(index: &mut IndexSet, batch: &ChangeBatch, config: &ChangeConfig) -> Result<DirtyReport> {
    let ids = batch.dirty_ids(index.files());
    debug!(
        changes = batch.total_changes(),
        known = ids.len(),
        "applying change batch"
    );
    index.dirty_with(&ids, config.parallel_prune)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::location::Location;
    use crate::index::merge::UnitFacts;
    use crate::index::types::{SymbolInfo, Source};
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::TempDir;

    fn change(path: &str, kind: ChangeKind) -> FileChange {
        FileChange {
            path: PathBuf::from(path),
            kind,
        }
    }

    #[test]
    fn test_change_batch_create_then_modify() {
        let mut batch = ChangeBatch::new();
        batch.add(change("a.c", ChangeKind::Created));
        batch.add(change("a.c", ChangeKind::Modified));

        assert_eq!(batch.created.len(), 1);
        assert!(batch.modified.is_empty());
    }

    #[test]
    fn test_change_batch_create_then_delete() {
        let mut batch = ChangeBatch::new();
        batch.add(change("a.c", ChangeKind::Created));
        batch.add(change("a.c", ChangeKind::Deleted));

        assert!(batch.is_empty());
    }

    #[test]
    fn test_change_batch_delete_then_create() {
        let mut batch = ChangeBatch::new();
        batch.add(change("a.c", ChangeKind::Deleted));
        batch.add(change("a.c", ChangeKind::Created));

        assert_eq!(batch.modified, vec![PathBuf::from("a.c")]);
        assert!(batch.created.is_empty());
        assert!(batch.deleted.is_empty());
    }

    #[test]
    fn test_change_batch_merge_overlapping() {
        let mut first = ChangeBatch::new();
        first.add(change("a.c", ChangeKind::Modified));
        first.add(change("b.h", ChangeKind::Created));

        let mut second = ChangeBatch::new();
        second.add(change("a.c", ChangeKind::Modified));
        second.add(change("b.h", ChangeKind::Deleted));
        second.add(change("c.h", ChangeKind::Renamed));

        first.merge(second);
        assert_eq!(first.modified, vec![PathBuf::from("a.c")]);
        assert!(first.created.is_empty());
        assert_eq!(first.deleted, vec![PathBuf::from("c.h")]);
        assert_eq!(first.total_changes(), 2);
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig {
            debounce_ms: 40,
            parallel_prune: false,
            ..Default::default()
        };
        let config = ChangeConfig::from(&app);
        assert_eq!(config.debounce_duration(), Duration::from_millis(40));
        assert!(!config.parallel_prune);
    }

    #[test]
    fn test_apply_batch_dirties_known_files() {
        let dir = TempDir::new().unwrap();
        let mut index = IndexSet::open(dir.path(), Path::new("/p")).unwrap();
        index
            .merge(&UnitFacts {
                source: Source {
                    file_id: 1,
                    ..Default::default()
                },
                files: BTreeMap::from([(1, "/p/a.c".to_string())]),
                symbols: vec![(
                    Location::new(1, 1, 1),
                    SymbolInfo {
                        symbol_name: "a".to_string(),
                        ..Default::default()
                    },
                )],
                ..Default::default()
            })
            .unwrap();

        let mut batch = ChangeBatch::new();
        batch.add(change("/p/a.c", ChangeKind::Modified));
        batch.add(change("/p/unknown.c", ChangeKind::Created));
        assert_eq!(batch.dirty_ids(index.files()), vec![1]);

        let report = apply_batch(&mut index, &batch, &ChangeConfig::default()).unwrap();
        assert_eq!(report.symbols.removed, 1);
        assert!(index.symbols_by_name("a").unwrap().is_empty());
    }
}
