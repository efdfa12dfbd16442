//! The correlated stores of one project index.
//!
//! Directory layout:
//! ```text
//! <index dir>/
//!   meta.json        - version marker and counts
//!   symbols.db       - Location -> SymbolInfo
//!   references.db    - Location -> {Location}      (who refers to the key)
//!   targets.db       - Location -> {Location: kind} (what the key refers to)
//!   usrs.db          - USR -> {Location}
//!   symnames.db      - name -> {Location}
//!   dependencies.db  - file id -> {file id}        (invalidated when the key changes)
//!   sources.db       - unit id -> Source
//!   fixits.db        - file id -> {FixIt}
//!   files.db         - file id -> path
//! ```

use crate::error::{IndexError, Result};
use crate::index::files::FileTable;
use crate::index::location::{FileId, Location};
use crate::index::store::Store;
use crate::index::table::PersistedStore;
use crate::index::types::*;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const META_FILE: &str = "meta.json";

pub type SymbolStore = PersistedStore<Location, SymbolInfo>;
pub type LocationSetStore<K> = PersistedStore<K, BTreeSet<Location>>;
pub type TargetStore = PersistedStore<Location, BTreeMap<Location, TargetKind>>;
pub type DependencyStore = PersistedStore<FileId, BTreeSet<FileId>>;

/// Per-table entry counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCounts {
    pub files: usize,
    pub symbols: usize,
    pub references: usize,
    pub targets: usize,
    pub usrs: usize,
    pub symbol_names: usize,
    pub dependencies: usize,
    pub sources: usize,
    pub fixits: usize,
}

pub struct IndexSet {
    dir: PathBuf,
    meta: IndexMeta,
    pub(crate) symbols: SymbolStore,
    pub(crate) references: LocationSetStore<Location>,
    pub(crate) targets: TargetStore,
    pub(crate) usrs: LocationSetStore<String>,
    pub(crate) symbol_names: LocationSetStore<String>,
    pub(crate) dependencies: DependencyStore,
    pub(crate) sources: PersistedStore<UnitId, Source>,
    pub(crate) fixits: PersistedStore<FileId, BTreeSet<FixIt>>,
    pub(crate) files: FileTable,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Read and version-check `meta.json`; None when the index is new
fn read_meta(dir: &Path) -> Result<Option<IndexMeta>> {
    let path = dir.join(META_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IndexError::io(&path, e)),
    };

    // Check the version before the rest of the layout, which may differ
    let probe: VersionProbe =
        serde_json::from_str(&content).map_err(|source| IndexError::Meta {
            path: path.clone(),
            source,
        })?;
    if probe.version != INDEX_VERSION {
        return Err(IndexError::VersionMismatch {
            path,
            found: probe.version,
            expected: INDEX_VERSION,
        });
    }

    let meta = serde_json::from_str(&content).map_err(|source| IndexError::Meta {
        path: path.clone(),
        source,
    })?;
    Ok(Some(meta))
}

fn write_meta(dir: &Path, meta: &IndexMeta) -> Result<()> {
    let path = dir.join(META_FILE);
    let tmp = dir.join("meta.json.tmp");

    let mut writer = BufWriter::new(File::create(&tmp).map_err(|e| IndexError::io(&tmp, e))?);
    serde_json::to_writer_pretty(&mut writer, meta).map_err(|source| IndexError::Meta {
        path: tmp.clone(),
        source,
    })?;
    writer.flush().map_err(|e| IndexError::io(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| IndexError::io(&path, e))
}

impl IndexSet {
    /// True when `dir` holds a committed index
    pub fn exists(dir: &Path) -> bool {
        dir.join(META_FILE).is_file()
    }

    /// Open the index in `dir`, creating an empty one for `root` if absent.
    ///
    /// Fails with [`IndexError::VersionMismatch`] before any table is touched
    /// when the directory was written by another format version.
    pub fn open(dir: &Path, root: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| IndexError::io(dir, e))?;

        let meta = match read_meta(dir)? {
            Some(meta) => {
                debug!(dir = %dir.display(), files = meta.file_count, "opened index");
                meta
            }
            None => {
                let now = now_secs();
                info!(dir = %dir.display(), root = %root.display(), "creating index");
                IndexMeta {
                    root_path: root.to_path_buf(),
                    created_at: now,
                    updated_at: now,
                    ..Default::default()
                }
            }
        };

        Ok(Self {
            meta,
            symbols: PersistedStore::open(dir.join("symbols.db")),
            references: PersistedStore::open(dir.join("references.db")),
            targets: PersistedStore::open(dir.join("targets.db")),
            usrs: PersistedStore::open(dir.join("usrs.db")),
            symbol_names: PersistedStore::open(dir.join("symnames.db")),
            dependencies: PersistedStore::open(dir.join("dependencies.db")),
            sources: PersistedStore::open(dir.join("sources.db")),
            fixits: PersistedStore::open(dir.join("fixits.db")),
            files: FileTable::open(dir.join("files.db"))?,
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn root_path(&self) -> &Path {
        &self.meta.root_path
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    /// Uncommitted mutations across every table
    pub fn pending(&self) -> usize {
        self.symbols.pending()
            + self.references.pending()
            + self.targets.pending()
            + self.usrs.pending()
            + self.symbol_names.pending()
            + self.dependencies.pending()
            + self.sources.pending()
            + self.fixits.pending()
            + self.files.pending()
    }

    pub fn has_pending(&self) -> bool {
        self.pending() > 0
    }

    /// Make every pending mutation durable.
    ///
    /// All changed tables are written to temp files first; if any of those
    /// writes fails no live table is replaced.
    pub fn commit(&mut self) -> Result<()> {
        let fresh = !Self::exists(&self.dir);
        if !self.has_pending() && !fresh {
            return Ok(());
        }
        let pending = self.pending();

        let staged = [
            self.symbols.stage()?,
            self.references.stage()?,
            self.targets.stage()?,
            self.usrs.stage()?,
            self.symbol_names.stage()?,
            self.dependencies.stage()?,
            self.sources.stage()?,
            self.fixits.stage()?,
            self.files.stage()?,
        ];
        for table in staged.into_iter().flatten() {
            table.publish()?;
        }

        self.symbols.finish_commit()?;
        self.references.finish_commit()?;
        self.targets.finish_commit()?;
        self.usrs.finish_commit()?;
        self.symbol_names.finish_commit()?;
        self.dependencies.finish_commit()?;
        self.sources.finish_commit()?;
        self.fixits.finish_commit()?;
        self.files.finish_commit()?;

        self.meta.version = INDEX_VERSION;
        self.meta.file_count = self.files.len() as u32;
        self.meta.symbol_count = self.symbols.len()? as u64;
        self.meta.updated_at = now_secs();
        write_meta(&self.dir, &self.meta)?;

        info!(
            dir = %self.dir.display(),
            mutations = pending,
            symbols = self.meta.symbol_count,
            "committed index"
        );
        Ok(())
    }

    /// Discard every uncommitted mutation
    pub fn rollback(&mut self) -> Result<()> {
        self.symbols.rollback();
        self.references.rollback();
        self.targets.rollback();
        self.usrs.rollback();
        self.symbol_names.rollback();
        self.dependencies.rollback();
        self.sources.rollback();
        self.fixits.rollback();
        self.files.rollback()
    }

    // Queries

    pub fn symbol(&self, loc: &Location) -> Result<Option<SymbolInfo>> {
        self.symbols.get(loc)
    }

    /// Symbol whose name span covers `loc`
    pub fn find_symbol(&self, loc: Location) -> Result<Option<(Location, SymbolInfo)>> {
        if !loc.is_valid() {
            return Ok(None);
        }
        let Some((key, info)) = self
            .symbols
            .range(Location::file_start(loc.file_id)..=loc)?
            .pop()
        else {
            return Ok(None);
        };
        let span = info.symbol_length.max(1);
        if key.line == loc.line && loc.column < key.column.saturating_add(span) {
            Ok(Some((key, info)))
        } else {
            Ok(None)
        }
    }

    pub fn symbols_in_file(&self, file_id: FileId) -> Result<Vec<(Location, SymbolInfo)>> {
        self.symbols
            .range(Location::file_start(file_id)..=Location::file_end(file_id))
    }

    pub fn symbols_by_name(&self, name: &str) -> Result<Vec<(Location, SymbolInfo)>> {
        let Some(locations) = self.symbol_names.get(&name.to_string())? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(locations.len());
        for loc in locations {
            if let Some(info) = self.symbols.get(&loc)? {
                out.push((loc, info));
            }
        }
        Ok(out)
    }

    /// Locations that refer to `loc`
    pub fn references_to(&self, loc: &Location) -> Result<BTreeSet<Location>> {
        Ok(self.references.get(loc)?.unwrap_or_default())
    }

    /// Locations `loc` refers to, with the kind of each edge
    pub fn targets_of(&self, loc: &Location) -> Result<BTreeMap<Location, TargetKind>> {
        Ok(self.targets.get(loc)?.unwrap_or_default())
    }

    pub fn usr_locations(&self, usr: &str) -> Result<BTreeSet<Location>> {
        Ok(self.usrs.get(&usr.to_string())?.unwrap_or_default())
    }

    /// Files invalidated directly when `file_id` changes
    pub fn dependents(&self, file_id: FileId) -> Result<BTreeSet<FileId>> {
        Ok(self.dependencies.get(&file_id)?.unwrap_or_default())
    }

    pub fn source(&self, unit: UnitId) -> Result<Option<Source>> {
        self.sources.get(&unit)
    }

    /// Every compile configuration recorded for `file_id`, across build roots
    pub fn sources_for_file(&self, file_id: FileId) -> Result<Vec<Source>> {
        Ok(self
            .sources
            .entries()?
            .into_iter()
            .filter(|(_, source)| source.file_id == file_id)
            .map(|(_, source)| source)
            .collect())
    }

    pub fn fixits(&self, file_id: FileId) -> Result<BTreeSet<FixIt>> {
        Ok(self.fixits.get(&file_id)?.unwrap_or_default())
    }

    pub fn counts(&self) -> Result<IndexCounts> {
        Ok(IndexCounts {
            files: self.files.len(),
            symbols: self.symbols.len()?,
            references: self.references.len()?,
            targets: self.targets.len()?,
            usrs: self.usrs.len()?,
            symbol_names: self.symbol_names.len()?,
            dependencies: self.dependencies.len()?,
            sources: self.sources.len()?,
            fixits: self.fixits.len()?,
        })
    }
}

/// Read the metadata of the index in `dir` without opening its tables
pub fn load_meta(dir: &Path) -> Result<Option<IndexMeta>> {
    read_meta(dir)
}

impl std::fmt::Debug for IndexSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSet")
            .field("dir", &self.dir)
            .field("root", &self.meta.root_path)
            .field("pending", &self.pending())
            .finish()
    }
}
