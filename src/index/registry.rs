//! Open project indexes shared between the merge pipeline and queries.
//!
//! Each [`Project`] guards its [`IndexSet`] with one `RwLock`: merges and
//! dirty passes hold the write lock, queries hold read locks.

use crate::index::set::IndexSet;
use crate::utils::app_data::{AppConfig, index_dir_in};
use crate::utils::project::{RootMode, find_project_root};
use anyhow::{Result, anyhow};
use lru::LruCache;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// One project's index
pub struct Project {
    root: PathBuf,
    index: RwLock<IndexSet>,
}

impl Project {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared access for queries
    pub fn read(&self) -> Result<RwLockReadGuard<'_, IndexSet>> {
        self.index
            .read()
            .map_err(|_| anyhow!("index lock poisoned for {}", self.root.display()))
    }

    /// Exclusive access for merges and dirty passes
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, IndexSet>> {
        self.index
            .write()
            .map_err(|_| anyhow!("index lock poisoned for {}", self.root.display()))
    }
}

/// Registry of open projects, keyed by canonical root
pub struct ProjectRegistry {
    app_dir: PathBuf,
    mode: RootMode,
    capacity: usize,
    projects: RwLock<HashMap<PathBuf, Arc<Project>>>,
    /// Recency of every open project, least recent last
    recent: Mutex<LruCache<PathBuf, ()>>,
}

impl ProjectRegistry {
    pub fn new(app_dir: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            app_dir: app_dir.into(),
            mode: config.default_root_mode,
            capacity: config.max_open_projects.max(1),
            projects: RwLock::new(HashMap::new()),
            recent: Mutex::new(LruCache::unbounded()),
        }
    }

    pub fn mode(&self) -> RootMode {
        self.mode
    }

    /// Project owning `path`, located with the registry's root mode
    pub fn project_for_path(&self, path: &Path) -> Result<Arc<Project>> {
        let root = find_project_root(path, self.mode);
        self.open(&root)
    }

    /// Open (or return the already open) index for `root`
    pub fn open(&self, root: &Path) -> Result<Arc<Project>> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        // Check with read lock first
        {
            let projects = self.read_projects()?;
            if let Some(project) = projects.get(&root) {
                let project = Arc::clone(project);
                drop(projects);
                self.touch(&root)?;
                return Ok(project);
            }
        }

        let mut projects = self
            .projects
            .write()
            .map_err(|_| anyhow!("project registry lock poisoned"))?;

        // Double-check after acquiring write lock
        if let Some(project) = projects.get(&root) {
            let project = Arc::clone(project);
            drop(projects);
            self.touch(&root)?;
            return Ok(project);
        }

        let dir = index_dir_in(&self.app_dir, &root)?;
        let index = IndexSet::open(&dir, &root)?;
        info!(root = %root.display(), dir = %dir.display(), "opened project");

        let project = Arc::new(Project {
            root: root.clone(),
            index: RwLock::new(index),
        });
        projects.insert(root.clone(), Arc::clone(&project));

        let mut recent = self.lock_recent()?;
        recent.push(root, ());
        self.shrink(&mut projects, &mut recent);

        Ok(project)
    }

    fn read_projects(&self) -> Result<RwLockReadGuard<'_, HashMap<PathBuf, Arc<Project>>>> {
        self.projects
            .read()
            .map_err(|_| anyhow!("project registry lock poisoned"))
    }

    fn lock_recent(&self) -> Result<MutexGuard<'_, LruCache<PathBuf, ()>>> {
        self.recent
            .lock()
            .map_err(|_| anyhow!("project registry lock poisoned"))
    }

    fn touch(&self, root: &Path) -> Result<()> {
        let mut recent = self.lock_recent()?;
        if recent.get(root).is_none() {
            recent.push(root.to_path_buf(), ());
        }
        Ok(())
    }

    /// Close least recently used projects until the registry fits its
    /// capacity. Projects still referenced outside the registry or holding
    /// uncommitted writes are skipped and keep their place in the order.
    fn shrink(
        &self,
        projects: &mut HashMap<PathBuf, Arc<Project>>,
        recent: &mut LruCache<PathBuf, ()>,
    ) {
        if projects.len() <= self.capacity {
            return;
        }
        let candidates: Vec<PathBuf> = recent.iter().rev().map(|(root, _)| root.clone()).collect();
        for root in candidates {
            if projects.len() <= self.capacity {
                break;
            }
            let Some(project) = projects.get(&root) else {
                recent.pop(&root);
                continue;
            };
            if !is_idle(project) {
                continue;
            }
            projects.remove(&root);
            recent.pop(&root);
            debug!(root = %root.display(), "closed least recently used project");
        }
        if projects.len() > self.capacity {
            warn!(
                open = projects.len(),
                capacity = self.capacity,
                "keeping busy projects open past capacity"
            );
        }
    }

    /// Roots of every open project
    pub fn open_roots(&self) -> Result<Vec<PathBuf>> {
        let mut roots: Vec<PathBuf> = self.read_projects()?.keys().cloned().collect();
        roots.sort();
        Ok(roots)
    }

    /// Commit every open project with pending changes
    pub fn commit_all(&self) -> Result<usize> {
        let projects: Vec<Arc<Project>> = self.read_projects()?.values().cloned().collect();
        let mut committed = 0;
        for project in projects {
            let mut index = project.write()?;
            if index.has_pending() {
                index.commit()?;
                committed += 1;
            }
        }
        Ok(committed)
    }
}

/// Only the registry holds the project and nothing is waiting to commit
fn is_idle(project: &Arc<Project>) -> bool {
    if Arc::strong_count(project) > 1 {
        return false;
    }
    match project.index.try_read() {
        Ok(index) => !index.has_pending(),
        Err(_) => false,
    }
}
