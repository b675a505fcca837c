//! Configuration for chronoverse.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CHRONOVERSE_HOME, CHRONOVERSE_LIBRARY, CHRONOVERSE_UNIVERSES)
//! 2. Config file (.chronoverse/config.yaml)
//! 3. Defaults (~/.chronoverse)
//!
//! Config file discovery:
//! - Searches current directory and parents for .chronoverse/config.yaml
//! - `home` is relative to the .chronoverse/ directory, other paths to its parent

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{IndexOptions, SyncOptions};

const CONFIG_DIR: &str = ".chronoverse";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sync: Option<SyncConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .chronoverse/)
    pub home: Option<String>,
    /// Library snapshot file (relative to project root)
    pub library: Option<String>,
    /// Universe definitions file (relative to project root)
    pub universes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    pub dry_run: Option<bool>,
    pub write_timeout_seconds: Option<u64>,
    pub parallel_index_threshold: Option<usize>,
    pub journal: Option<bool>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Engine state directory (runs live here)
    pub home: PathBuf,
    /// Library snapshot file
    pub library: PathBuf,
    /// Universe definitions file
    pub universes: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub dry_run: bool,
    pub write_timeout_seconds: u64,
    pub parallel_index_threshold: usize,
    /// Record a journal for every batch
    pub journal: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            write_timeout_seconds: 30,
            parallel_index_threshold: 5000,
            journal: true,
        }
    }
}

impl SyncSettings {
    fn from_config(config: Option<&SyncConfig>) -> Self {
        let defaults = Self::default();
        let Some(config) = config else {
            return defaults;
        };

        Self {
            dry_run: config.dry_run.unwrap_or(defaults.dry_run),
            write_timeout_seconds: config
                .write_timeout_seconds
                .unwrap_or(defaults.write_timeout_seconds),
            parallel_index_threshold: config
                .parallel_index_threshold
                .unwrap_or(defaults.parallel_index_threshold),
            journal: config.journal.unwrap_or(defaults.journal),
        }
    }

    /// Synchronizer options for these settings
    pub fn to_options(&self) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run,
            write_timeout: Duration::from_secs(self.write_timeout_seconds),
            index: IndexOptions {
                parallel_threshold: self.parallel_index_threshold,
            },
        }
    }
}

impl ResolvedConfig {
    /// Directory holding one journal directory per run
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

/// Load configuration, discovering the config file from `start`
fn load_config_from(start: &Path) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = find_config_file(start);

    let (home, library, universes, sync) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        let config_dir = config_path.parent().unwrap_or(Path::new("."));
        let base_dir = config_dir.parent().unwrap_or(Path::new("."));

        let home = env_path("CHRONOVERSE_HOME")
            .or_else(|| config.paths.home.as_deref().map(|p| resolve_path(config_dir, p)))
            .unwrap_or_else(|| default_home.clone());

        let library = env_path("CHRONOVERSE_LIBRARY")
            .or_else(|| config.paths.library.as_deref().map(|p| resolve_path(base_dir, p)))
            .unwrap_or_else(|| home.join("library.json"));

        let universes = env_path("CHRONOVERSE_UNIVERSES")
            .or_else(|| config.paths.universes.as_deref().map(|p| resolve_path(base_dir, p)))
            .unwrap_or_else(|| home.join("universes.yaml"));

        let sync = SyncSettings::from_config(config.sync.as_ref());

        (home, library, universes, sync)
    } else {
        let home = env_path("CHRONOVERSE_HOME").unwrap_or_else(|| default_home.clone());
        let library = env_path("CHRONOVERSE_LIBRARY").unwrap_or_else(|| home.join("library.json"));
        let universes =
            env_path("CHRONOVERSE_UNIVERSES").unwrap_or_else(|| home.join("universes.yaml"));

        (home, library, universes, SyncSettings::default())
    };

    Ok(ResolvedConfig {
        home,
        library,
        universes,
        config_file,
        sync,
    })
}

fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    load_config_from(&cwd)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (bypasses the cache)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the runs directory ($CHRONOVERSE_HOME/runs)
pub fn runs_dir() -> Result<PathBuf> {
    Ok(config()?.runs_dir())
}
