//! Project root discovery by walking ancestor directories.
//!
//! The nearest ancestor holding any marker of the requested kind is the
//! root, regardless of which marker it is. Without a marker the starting
//! directory is used, so code outside version control still gets an index.

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-project configuration file, also a source root marker
pub const PROJECT_CONFIG_FILE: &str = ".symdex";

/// Markers identifying the top of a source tree
pub const SOURCE_ROOT_MARKERS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".bzr",
    "_darcs",
    ".projectile",
    PROJECT_CONFIG_FILE,
];

/// Markers identifying a build directory
pub const BUILD_ROOT_MARKERS: &[&str] = &[
    "compile_commands.json",
    "build.ninja",
    "CMakeCache.txt",
    "Makefile",
    "meson-info",
];

/// Which kind of root to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RootMode {
    #[default]
    #[serde(rename = "source", alias = "source_root")]
    SourceRoot,
    #[serde(rename = "build", alias = "build_root")]
    BuildRoot,
}

impl RootMode {
    pub fn markers(&self) -> &'static [&'static str] {
        match self {
            RootMode::SourceRoot => SOURCE_ROOT_MARKERS,
            RootMode::BuildRoot => BUILD_ROOT_MARKERS,
        }
    }
}

/// Flags for [`find_ancestor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AncestorFlags(pub u8);

impl AncestorFlags {
    pub const NONE: AncestorFlags = AncestorFlags(0);
    /// Do not ascend past the nearest enclosing source root
    pub const SHALLOW: AncestorFlags = AncestorFlags(1 << 0);
    /// Treat the name as a glob pattern
    pub const WILDCARD: AncestorFlags = AncestorFlags(1 << 1);

    pub fn contains(&self, other: AncestorFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AncestorFlags {
    type Output = AncestorFlags;

    fn bitor(self, rhs: Self) -> Self {
        AncestorFlags(self.0 | rhs.0)
    }
}

/// Directory a walk starts from: `path` itself, or its parent for files
fn start_dir(path: &Path) -> PathBuf {
    let absolute = path
        .canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf());
    if absolute.is_file() {
        if let Some(parent) = absolute.parent() {
            return parent.to_path_buf();
        }
    }
    absolute
}

fn has_marker(dir: &Path, markers: &[&str]) -> bool {
    markers.iter().any(|marker| dir.join(marker).exists())
}

fn nearest_with_marker(start: &Path, markers: &[&str]) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| has_marker(dir, markers))
        .map(Path::to_path_buf)
}

/// Find the root of the project containing `path`
pub fn find_project_root(path: &Path, mode: RootMode) -> PathBuf {
    let start = start_dir(path);

    if mode == RootMode::SourceRoot {
        if let Some(root) = configured_root(&start) {
            debug!(root = %root.display(), "project root from {}", PROJECT_CONFIG_FILE);
            return root;
        }
    }

    nearest_with_marker(&start, mode.markers()).unwrap_or(start)
}

/// Find the nearest ancestor of `path` containing an entry called `name`.
///
/// With [`AncestorFlags::WILDCARD`] `name` is a glob matched against entry
/// names. With [`AncestorFlags::SHALLOW`] the walk stops at the nearest
/// source root (which is still checked).
pub fn find_ancestor(path: &Path, name: &str, flags: AncestorFlags) -> Option<PathBuf> {
    let start = start_dir(path);

    let matcher = if flags.contains(AncestorFlags::WILDCARD) {
        Some(Glob::new(name).ok()?.compile_matcher())
    } else {
        None
    };

    let boundary = if flags.contains(AncestorFlags::SHALLOW) {
        nearest_with_marker(&start, SOURCE_ROOT_MARKERS)
    } else {
        None
    };

    for dir in start.ancestors() {
        let found = match &matcher {
            Some(matcher) => dir_has_match(dir, matcher),
            None => dir.join(name).exists(),
        };
        if found {
            return Some(dir.to_path_buf());
        }
        if boundary.as_deref() == Some(dir) {
            break;
        }
    }

    None
}

fn dir_has_match(dir: &Path, matcher: &GlobMatcher) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(|entry| entry.ok())
        .any(|entry| matcher.is_match(entry.file_name()))
}

/// Parse `key: value` lines; `#` starts a comment line
fn read_config_file(path: &Path) -> Option<BTreeMap<String, String>> {
    if !path.is_file() {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    let mut values = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Some(values)
}

/// Merge every `.symdex` file from `path` upward; nearer files win
pub fn project_config(path: &Path) -> BTreeMap<String, String> {
    let start = start_dir(path);
    let mut merged = BTreeMap::new();
    for dir in start.ancestors() {
        if let Some(values) = read_config_file(&dir.join(PROJECT_CONFIG_FILE)) {
            for (key, value) in values {
                merged.entry(key).or_insert(value);
            }
        }
    }
    merged
}

/// `project:` override from the nearest config file that sets one
fn configured_root(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        let values = read_config_file(&dir.join(PROJECT_CONFIG_FILE))?;
        let project = values.get("project")?;
        if project.is_empty() {
            return None;
        }
        let root = dir.join(project);
        Some(root.canonicalize().unwrap_or(root))
    })
}
