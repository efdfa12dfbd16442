//! File-backed store with an in-memory overlay.
//!
//! Table file layout:
//! - 4 bytes: magic `SDX1`
//! - 4 bytes (little-endian u32): entry count
//! - entries: `Codec`-encoded key followed by its value, in key order
//!
//! The file is memory-mapped and decoded on first read. Writes go to the
//! overlay (puts) and the tombstone set (removes), which are disjoint.
//! Commit rewrites the whole table through a temp file and a rename.

use crate::error::{IndexError, Result};
use crate::index::store::{MemoryStore, Store};
use crate::utils::encoding::{Codec, Decoder, read_u32_le, write_u32_le};
use memmap2::Mmap;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::ops::{Bound, RangeBounds};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

const TABLE_MAGIC: &[u8; 4] = b"SDX1";
const HEADER_LEN: usize = 8;

/// Persisted ordered table with a write overlay
pub struct PersistedStore<K, V> {
    path: PathBuf,
    /// Committed contents, loaded lazily on first access
    base: OnceLock<BTreeMap<K, V>>,
    overlay: MemoryStore<K, V>,
    tombstones: BTreeSet<K>,
}

impl<K, V> PersistedStore<K, V>
where
    K: Codec + Ord + Clone,
    V: Codec + Clone,
{
    /// Attach to a table file; nothing is read until the first lookup
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base: OnceLock::new(),
            overlay: MemoryStore::new(),
            tombstones: BTreeSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of uncommitted mutations
    pub fn pending(&self) -> usize {
        self.overlay.count() + self.tombstones.len()
    }

    pub fn has_pending(&self) -> bool {
        self.pending() > 0
    }

    pub fn is_loaded(&self) -> bool {
        self.base.get().is_some()
    }

    /// Force the committed table into memory
    pub fn load(&self) -> Result<()> {
        self.base().map(|_| ())
    }

    fn base(&self) -> Result<&BTreeMap<K, V>> {
        if let Some(base) = self.base.get() {
            return Ok(base);
        }
        let loaded = read_table(&self.path)?;
        Ok(self.base.get_or_init(|| loaded))
    }

    /// Discard every uncommitted mutation
    pub fn rollback(&mut self) {
        self.overlay.clear();
        self.tombstones.clear();
    }

    /// Write the merged view to a temp file next to the table.
    ///
    /// Returns None when there is nothing to commit.
    pub fn stage(&self) -> Result<Option<StagedTable>> {
        if !self.has_pending() {
            return Ok(None);
        }
        let entries = self.entries()?;
        let tmp = self.path.with_extension("db.tmp");
        write_table(&tmp, &entries)?;
        Ok(Some(StagedTable {
            tmp,
            dest: self.path.clone(),
        }))
    }

    /// Fold the overlay into the in-memory base once the staged file is live
    pub fn finish_commit(&mut self) -> Result<()> {
        if !self.has_pending() {
            return Ok(());
        }
        self.base()?;
        let Some(base) = self.base.get_mut() else {
            return Ok(());
        };
        for key in std::mem::take(&mut self.tombstones) {
            base.remove(&key);
        }
        for (key, value) in std::mem::take(&mut self.overlay).into_map() {
            base.insert(key, value);
        }
        Ok(())
    }

    /// Stage, publish and fold in one step
    pub fn commit(&mut self) -> Result<()> {
        if let Some(staged) = self.stage()? {
            staged.publish()?;
        }
        self.finish_commit()
    }
}

impl<K, V> Store<K, V> for PersistedStore<K, V>
where
    K: Codec + Ord + Clone,
    V: Codec + Clone,
{
    fn get(&self, key: &K) -> Result<Option<V>> {
        if self.tombstones.contains(key) {
            return Ok(None);
        }
        if let Some(value) = self.overlay.get_ref(key) {
            return Ok(Some(value.clone()));
        }
        Ok(self.base()?.get(key).cloned())
    }

    fn range<R: RangeBounds<K>>(&self, range: R) -> Result<Vec<(K, V)>> {
        let bounds: (Bound<K>, Bound<K>) = (range.start_bound().cloned(), range.end_bound().cloned());
        let base = self.base()?;

        let mut out = Vec::new();
        let mut overlay = self.overlay.range_iter(bounds.clone()).peekable();

        for (key, value) in base.range(bounds) {
            while let Some((over_key, over_value)) = overlay.next_if(|(k, _)| *k < key) {
                out.push((over_key.clone(), over_value.clone()));
            }
            if let Some((over_key, over_value)) = overlay.next_if(|(k, _)| *k == key) {
                out.push((over_key.clone(), over_value.clone()));
                continue;
            }
            if self.tombstones.contains(key) {
                continue;
            }
            out.push((key.clone(), value.clone()));
        }
        out.extend(overlay.map(|(k, v)| (k.clone(), v.clone())));

        Ok(out)
    }

    fn put(&mut self, key: K, value: V) {
        self.tombstones.remove(&key);
        self.overlay.put(key, value);
    }

    fn remove(&mut self, key: &K) {
        self.overlay.take(key);
        self.tombstones.insert(key.clone());
    }
}

/// A table rewritten to a temp file, waiting to replace the live one
#[derive(Debug)]
pub struct StagedTable {
    tmp: PathBuf,
    dest: PathBuf,
}

impl StagedTable {
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Atomically replace the live table
    pub fn publish(self) -> Result<()> {
        fs::rename(&self.tmp, &self.dest).map_err(|e| IndexError::io(&self.dest, e))
    }
}

impl Drop for StagedTable {
    fn drop(&mut self) {
        // Leftover after a failed or abandoned commit; gone after publish
        let _ = fs::remove_file(&self.tmp);
    }
}

/// Read a table file; a missing file is an empty table
fn read_table<K: Codec + Ord, V: Codec>(path: &Path) -> Result<BTreeMap<K, V>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(IndexError::io(path, e)),
    };

    let len = file.metadata().map_err(|e| IndexError::io(path, e))?.len();
    if (len as usize) < HEADER_LEN {
        return Err(IndexError::corrupt(path, "file shorter than header"));
    }

    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| IndexError::io(path, e))?;

    if &mmap[..4] != TABLE_MAGIC {
        return Err(IndexError::corrupt(path, "bad magic"));
    }
    let count = read_u32_le(&mut &mmap[4..HEADER_LEN]).map_err(|e| IndexError::io(path, e))?;

    let mut dec = Decoder::new(&mmap[HEADER_LEN..]);
    let mut map = BTreeMap::new();
    for i in 0..count {
        let key = K::decode(&mut dec)
            .ok_or_else(|| IndexError::corrupt(path, format!("truncated key at entry {}", i)))?;
        let value = V::decode(&mut dec)
            .ok_or_else(|| IndexError::corrupt(path, format!("truncated value at entry {}", i)))?;
        map.insert(key, value);
    }
    if !dec.is_empty() {
        return Err(IndexError::corrupt(
            path,
            format!("trailing bytes at offset {}", HEADER_LEN + dec.position()),
        ));
    }

    debug!(path = %path.display(), entries = count, "loaded table");
    Ok(map)
}

fn write_table<K: Codec, V: Codec>(path: &Path, entries: &[(K, V)]) -> Result<()> {
    let io_err = |e| IndexError::io(path, e);

    let mut body = Vec::new();
    for (key, value) in entries {
        key.encode(&mut body);
        value.encode(&mut body);
    }

    let mut file = BufWriter::new(File::create(path).map_err(io_err)?);
    file.write_all(TABLE_MAGIC).map_err(io_err)?;
    write_u32_le(&mut file, entries.len() as u32).map_err(io_err)?;
    file.write_all(&body).map_err(io_err)?;
    file.flush().map_err(io_err)?;
    file.get_ref().sync_all().map_err(io_err)?;

    Ok(())
}
