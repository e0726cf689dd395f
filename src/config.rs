//! Application configuration for the CLI and embedders.
//!
//! Precedence: CLI > env > config files > defaults. Config files are read in order: an explicit
//! `--config` (or `BOOKSTORE_CONFIG`), `./bookstore.toml`, then `<config dir>/bookstore.toml`;
//! a field set by an earlier file wins.

use crate::errors::DbError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "bookstore.toml";
pub const DEFAULT_COLLECTION: &str = "books";
pub const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub db_path: Option<PathBuf>,
    pub collection: String,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            collection: DEFAULT_COLLECTION.to_string(),
            log_dir: None,
            log_level: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Shape of a config file: every key optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    db_path: Option<PathBuf>,
    collection: Option<String>,
    log_dir: Option<PathBuf>,
    log_level: Option<String>,
    page_size: Option<usize>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub collection: Option<String>,
}

impl FileConfig {
    fn fill_from(&mut self, other: Self) {
        self.db_path = self.db_path.take().or(other.db_path);
        self.collection = self.collection.take().or(other.collection);
        self.log_dir = self.log_dir.take().or(other.log_dir);
        self.log_level = self.log_level.take().or(other.log_level);
        self.page_size = self.page_size.or(other.page_size);
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, DbError> {
    let s = std::fs::read_to_string(path)?;
    toml::from_str(&s).map_err(|e| DbError::Config(format!("{}: {e}", path.display())))
}

fn parse_page_size(s: &str) -> Result<usize, DbError> {
    match s.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(DbError::Config(format!("page size must be a positive integer, got {s:?}"))),
        Ok(n) => Ok(n),
    }
}

/// Candidate config files, most specific first. Only the explicit path must exist.
#[must_use]
pub fn config_paths(explicit: Option<&Path>, cwd: Option<&Path>, config_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Some(c) = cwd {
        paths.push(c.join(CONFIG_FILE_NAME));
    }
    if let Some(d) = config_dir {
        paths.push(d.join(CONFIG_FILE_NAME));
    }
    paths
}

/// Resolve configuration with an injectable environment lookup.
///
/// # Errors
/// Returns `Config` for a missing explicit config file, malformed TOML or a bad page size.
pub fn load_config_with<F>(
    overrides: &ConfigOverrides,
    env: F,
    cwd: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<AppConfig, DbError>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = overrides.config.clone().or_else(|| env("BOOKSTORE_CONFIG").map(PathBuf::from));
    if let Some(p) = &explicit
        && !p.exists()
    {
        return Err(DbError::Config(format!("config file not found: {}", p.display())));
    }
    let mut file = FileConfig::default();
    for p in config_paths(explicit.as_deref(), cwd, config_dir) {
        if p.exists() {
            log::debug!("reading config {}", p.display());
            file.fill_from(read_file_config(&p)?);
        }
    }

    let env_page_size = env("BOOKSTORE_PAGE_SIZE").map(|s| parse_page_size(&s)).transpose()?;
    if let Some(0) = file.page_size {
        return Err(DbError::Config("page_size must be positive".into()));
    }
    let defaults = AppConfig::default();
    Ok(AppConfig {
        db_path: overrides
            .db_path
            .clone()
            .or_else(|| env("BOOKSTORE_DB").map(PathBuf::from))
            .or(file.db_path),
        collection: overrides
            .collection
            .clone()
            .or_else(|| env("BOOKSTORE_COLLECTION"))
            .or(file.collection)
            .unwrap_or(defaults.collection),
        log_dir: env("BOOKSTORE_LOG_DIR").map(PathBuf::from).or(file.log_dir),
        log_level: env("BOOKSTORE_LOG_LEVEL").or(file.log_level),
        page_size: env_page_size.or(file.page_size).unwrap_or(defaults.page_size),
    })
}

/// Resolve configuration from the process environment and the usual file locations.
///
/// # Errors
/// See [`load_config_with`].
pub fn load_config(overrides: &ConfigOverrides) -> Result<AppConfig, DbError> {
    let cwd = std::env::current_dir().ok();
    let config_dir = dirs_next::config_dir();
    load_config_with(overrides, |k| std::env::var(k).ok(), cwd.as_deref(), config_dir.as_deref())
}
