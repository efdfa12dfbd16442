use crate::utils::host::HostAddress;
use crate::utils::path_codec::{decode_path, encode_path};
use crate::utils::project::RootMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const APP_NAME: &str = "symdex";
const CONFIG_FILE: &str = "config.json";
const INDEXES_DIR: &str = "indexes";

/// Overrides the platform data directory
pub const DATA_DIR_ENV: &str = "SYMDEX_DATA_DIR";

/// Default debounce window for file change batches in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root kind used when a command does not say
    #[serde(default)]
    pub default_root_mode: RootMode,

    /// Daemon address as `host[:port]`
    #[serde(default = "default_daemon_address")]
    pub daemon_address: String,

    /// Changes closer together than this are folded into one batch
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Compute the per-store prunes of a dirty pass on the rayon pool
    #[serde(default = "default_parallel_prune")]
    pub parallel_prune: bool,

    /// Project indexes kept open at once by a registry
    #[serde(default = "default_max_open_projects")]
    pub max_open_projects: usize,
}

fn default_daemon_address() -> String {
    HostAddress::default().to_string()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_parallel_prune() -> bool {
    true
}

fn default_max_open_projects() -> usize {
    16
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_root_mode: RootMode::default(),
            daemon_address: default_daemon_address(),
            debounce_ms: default_debounce_ms(),
            parallel_prune: default_parallel_prune(),
            max_open_projects: default_max_open_projects(),
        }
    }
}

impl AppConfig {
    /// Load config with priority: environment variables > config file > defaults
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific file, or return default if not found
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content =
                fs::read_to_string(config_path).context("Failed to read config file")?;
            let config: AppConfig =
                serde_json::from_str(&content).context("Failed to parse config file")?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("SYMDEX_DEBOUNCE_MS") {
            match val.parse() {
                Ok(ms) => self.debounce_ms = ms,
                Err(_) => warn!("ignoring SYMDEX_DEBOUNCE_MS={:?}", val),
            }
        }

        if let Ok(val) = std::env::var("SYMDEX_DAEMON") {
            self.daemon_address = val;
        }
    }

    /// Save config to the app data directory
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Parsed daemon address
    pub fn daemon(&self) -> Result<HostAddress> {
        Ok(HostAddress::parse(&self.daemon_address)?)
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory for storing indexes
pub fn get_app_data_dir() -> Result<PathBuf> {
    let app_dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base = if cfg!(target_os = "macos") {
                dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
            } else if cfg!(target_os = "windows") {
                dirs::data_local_dir()
            } else {
                // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
                dirs::data_dir()
            };
            base.context("Could not determine app data directory")?
                .join(APP_NAME)
        }
    };

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Get the index directory for a specific project root
pub fn get_index_dir(root_path: &Path) -> Result<PathBuf> {
    index_dir_in(&get_app_data_dir()?, root_path)
}

/// Index directory for `root_path` under an explicit app data directory.
///
/// The directory name is the encoded canonical root, so it can be decoded
/// back to the root without reading anything inside it.
pub fn index_dir_in(app_dir: &Path, root_path: &Path) -> Result<PathBuf> {
    let canonical = root_path
        .canonicalize()
        .unwrap_or_else(|_| root_path.to_path_buf());
    let folder_name = encode_path(&canonical)?;
    Ok(app_dir.join(INDEXES_DIR).join(folder_name))
}

/// Check if a path has an existing index
pub fn is_indexed(root_path: &Path) -> Result<bool> {
    let index_dir = get_index_dir(root_path)?;
    Ok(index_dir.join("meta.json").exists())
}

/// List all indexed projects
pub fn list_indexed_codebases() -> Result<Vec<IndexLocation>> {
    list_indexed_in(&get_app_data_dir()?)
}

pub fn list_indexed_in(app_dir: &Path) -> Result<Vec<IndexLocation>> {
    let indexes_dir = app_dir.join(INDEXES_DIR);

    if !indexes_dir.exists() {
        return Ok(Vec::new());
    }

    let mut codebases = Vec::new();

    for entry in fs::read_dir(&indexes_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_dir() || !path.join("meta.json").exists() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        codebases.push(IndexLocation {
            root_path: decode_path(&name),
            index_dir: path,
        });
    }

    codebases.sort_by(|a, b| a.root_path.cmp(&b.root_path));
    Ok(codebases)
}

/// Remove an index for a project
pub fn remove_index(root_path: &Path) -> Result<bool> {
    let index_dir = get_index_dir(root_path)?;
    if index_dir.exists() {
        fs::remove_dir_all(&index_dir)
            .with_context(|| format!("Failed to remove {}", index_dir.display()))?;
        return Ok(true);
    }
    Ok(false)
}

/// Information about an indexed project
#[derive(Debug, Clone)]
pub struct IndexLocation {
    pub root_path: PathBuf,
    pub index_dir: PathBuf,
}
