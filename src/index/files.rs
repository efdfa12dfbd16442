//! Persistent file-id table.
//!
//! Ids start at 1 so that 0 stays the null file id of [`Location::NULL`].
//!
//! [`Location::NULL`]: crate::index::location::Location::NULL

use crate::error::{IndexError, Result};
use crate::index::location::FileId;
use crate::index::store::Store;
use crate::index::table::{PersistedStore, StagedTable};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

pub struct FileTable {
    store: PersistedStore<FileId, String>,
    by_path: FxHashMap<String, FileId>,
    next_id: FileId,
}

impl FileTable {
    /// Open the table and build the reverse lookup
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut table = Self {
            store: PersistedStore::open(path),
            by_path: FxHashMap::default(),
            next_id: 1,
        };
        table.reload()?;
        Ok(table)
    }

    fn reload(&mut self) -> Result<()> {
        self.by_path.clear();
        self.next_id = 1;
        for (id, path) in self.store.entries()? {
            let after = id
                .checked_add(1)
                .filter(|_| id != 0)
                .ok_or_else(|| IndexError::corrupt(self.store.path(), format!("invalid file id {}", id)))?;
            self.next_id = self.next_id.max(after);
            self.by_path.insert(path, id);
        }
        Ok(())
    }

    pub fn id_for(&self, path: &Path) -> Option<FileId> {
        path.to_str().and_then(|p| self.id_for_str(p))
    }

    pub fn id_for_str(&self, path: &str) -> Option<FileId> {
        self.by_path.get(path).copied()
    }

    /// Id of `path`, allocating the next free id for an unseen path
    pub fn get_or_insert(&mut self, path: &str) -> Result<FileId> {
        if let Some(&id) = self.by_path.get(path) {
            return Ok(id);
        }
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| IndexError::corrupt(self.store.path(), "file id space exhausted"))?;
        self.store.put(id, path.to_string());
        self.by_path.insert(path.to_string(), id);
        Ok(id)
    }

    pub fn path(&self, id: FileId) -> Result<Option<String>> {
        self.store.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// All `(id, path)` pairs in id order
    pub fn entries(&self) -> Result<Vec<(FileId, String)>> {
        self.store.entries()
    }

    pub(crate) fn pending(&self) -> usize {
        self.store.pending()
    }

    pub(crate) fn stage(&self) -> Result<Option<StagedTable>> {
        self.store.stage()
    }

    pub(crate) fn finish_commit(&mut self) -> Result<()> {
        self.store.finish_commit()
    }

    /// Forget ids allocated since the last commit
    pub fn rollback(&mut self) -> Result<()> {
        self.store.rollback();
        self.reload()
    }
}
