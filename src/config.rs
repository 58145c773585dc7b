//! Durable settings and statistics.
//!
//! One JSON file owns both: the recognized option keys plus a nested `stats`
//! object with the hit/miss counters. The file is sparse — absent keys fall
//! back to built-in defaults at read time, so hand-edited or older files keep
//! working. Mutations mark the record dirty and [`Settings::flush`] replaces
//! the file atomically via a sibling temp file and rename.

use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub(crate) const DEFAULT_MAX_CACHE_SIZE: u64 = 16 * 1024 * 1024 * 1024;
pub(crate) const DEFAULT_CLEANUP_THRESHOLD: f64 = 0.9;
pub(crate) const DEFAULT_CLEANUP_TARGET: f64 = 0.7;
pub(crate) const DEFAULT_CLEANUP_INTERVAL: u64 = 100;

/// Overrides the default cache location. Consulted only while no `cache_dir`
/// has been persisted.
pub(crate) const CACHE_DIR_ENV: &str = "TIDYCACHE_DIR";

/// Overrides the directory holding `config.json`. Primarily for tests and CI,
/// which need isolation from the user's real configuration.
pub(crate) const CONFIG_DIR_ENV: &str = "TIDYCACHE_CONFIG_DIR";

/// Persistent counters, co-located with the settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Stats {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) invocations_since_cleanup: u64,
}

/// On-disk shape of `config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SettingsFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_cache_size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    cache_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    cleanup_threshold: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    cleanup_target: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    cleanup_interval: Option<u64>,

    stats: Stats,
}

/// A `--config` value parsed per the CLI rules: integer when purely digits,
/// float when digits with one decimal point, string otherwise.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SettingValue {
    Int(u64),
    Float(f64),
    Str(String),
}

impl SettingValue {
    pub(crate) fn parse(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = raw.parse::<u64>() {
                return Self::Int(n);
            }
        }

        if raw.matches('.').count() == 1 {
            let digits = raw.replacen('.', "", 1);
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(f) = raw.parse::<f64>() {
                    return Self::Float(f);
                }
            }
        }

        Self::Str(raw.to_string())
    }

    fn as_ratio(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::Str(_) => None,
        }
    }
}

/// Durable settings and statistics for one process.
#[derive(Debug)]
pub(crate) struct Settings {
    path: PathBuf,
    file: SettingsFile,
    dirty: bool,
}

impl Settings {
    /// Load from the default platform config location
    /// (`<config_dir>/tidycache/config.json`, or `$TIDYCACHE_CONFIG_DIR`).
    pub(crate) fn load_default() -> Result<Self> {
        Ok(Self::load(Self::default_path()?))
    }

    fn default_path() -> Result<PathBuf> {
        use etcetera::{AppStrategy, AppStrategyArgs, choose_app_strategy};

        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir).join("config.json"));
        }

        let strategy = choose_app_strategy(AppStrategyArgs {
            top_level_domain: "dev".to_string(),
            author: "tidycache".to_string(),
            app_name: "tidycache".to_string(),
        })
        .context(error::ConfigDirSnafu)?;

        Ok(strategy.config_dir().join("config.json"))
    }

    /// Load settings from `path`. A missing file is an empty record; a
    /// malformed one is discarded with a warning rather than wedging every
    /// invocation.
    pub(crate) fn load(path: PathBuf) -> Self {
        let file = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!("Ignoring malformed settings file {}: {e}", path.display());
                    SettingsFile::default()
                }
            },
            Err(_) => SettingsFile::default(),
        };

        Self {
            path,
            file,
            dirty: false,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn max_cache_size(&self) -> u64 {
        self.file.max_cache_size.unwrap_or(DEFAULT_MAX_CACHE_SIZE)
    }

    /// Effective cache directory: the persisted value, else `$TIDYCACHE_DIR`,
    /// else `~/.tidycache`.
    pub(crate) fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.file.cache_dir {
            return dir.clone();
        }
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV) {
            return PathBuf::from(dir);
        }
        default_cache_dir()
    }

    pub(crate) fn cleanup_threshold(&self) -> f64 {
        self.file
            .cleanup_threshold
            .unwrap_or(DEFAULT_CLEANUP_THRESHOLD)
    }

    pub(crate) fn cleanup_target(&self) -> f64 {
        self.file.cleanup_target.unwrap_or(DEFAULT_CLEANUP_TARGET)
    }

    pub(crate) fn cleanup_interval(&self) -> u64 {
        self.file
            .cleanup_interval
            .unwrap_or(DEFAULT_CLEANUP_INTERVAL)
            .max(1)
    }

    pub(crate) fn stats(&self) -> Stats {
        self.file.stats
    }

    pub(crate) fn inc_hits(&mut self) {
        self.file.stats.hits += 1;
        self.dirty = true;
    }

    pub(crate) fn inc_misses(&mut self) {
        self.file.stats.misses += 1;
        self.dirty = true;
    }

    pub(crate) fn inc_invocations_since_cleanup(&mut self) {
        self.file.stats.invocations_since_cleanup += 1;
        self.dirty = true;
    }

    pub(crate) fn reset_invocations_since_cleanup(&mut self) {
        self.file.stats.invocations_since_cleanup = 0;
        self.dirty = true;
    }

    /// Reset the hit/miss counters, as `--clear` requires.
    pub(crate) fn reset_hit_miss_counters(&mut self) {
        self.file.stats.hits = 0;
        self.file.stats.misses = 0;
        self.dirty = true;
    }

    /// Read one recognized key, rendered for display.
    pub(crate) fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "max_cache_size" => self.max_cache_size().to_string(),
            "cache_dir" => self.cache_dir().display().to_string(),
            "cleanup_threshold" => self.cleanup_threshold().to_string(),
            "cleanup_target" => self.cleanup_target().to_string(),
            "cleanup_interval" => self.cleanup_interval().to_string(),
            _ => return error::UnknownConfigKeySnafu { key }.fail(),
        };
        Ok(value)
    }

    /// Set one recognized key, enforcing each key's type and the eviction
    /// ratio invariant `0 < cleanup_target < cleanup_threshold <= 1`.
    pub(crate) fn set(&mut self, key: &str, value: SettingValue) -> Result<()> {
        match key {
            "max_cache_size" => {
                let SettingValue::Int(bytes) = value else {
                    return error::InvalidConfigValueSnafu {
                        key,
                        reason: "expected a byte count",
                    }
                    .fail();
                };
                self.file.max_cache_size = Some(bytes);
            }

            "cache_dir" => {
                let SettingValue::Str(raw) = value else {
                    return error::InvalidConfigValueSnafu {
                        key,
                        reason: "expected a directory path",
                    }
                    .fail();
                };
                let expanded = shellexpand::tilde(&raw);
                self.file.cache_dir = Some(PathBuf::from(expanded.as_ref()));
            }

            "cleanup_threshold" => {
                let Some(threshold) = value.as_ratio() else {
                    return error::InvalidConfigValueSnafu {
                        key,
                        reason: "expected a ratio",
                    }
                    .fail();
                };
                if !(threshold > 0.0 && threshold <= 1.0 && threshold > self.cleanup_target()) {
                    return error::InvalidConfigValueSnafu {
                        key,
                        reason: format!(
                            "must satisfy cleanup_target ({}) < cleanup_threshold <= 1",
                            self.cleanup_target()
                        ),
                    }
                    .fail();
                }
                self.file.cleanup_threshold = Some(threshold);
            }

            "cleanup_target" => {
                let Some(target) = value.as_ratio() else {
                    return error::InvalidConfigValueSnafu {
                        key,
                        reason: "expected a ratio",
                    }
                    .fail();
                };
                if !(target > 0.0 && target < self.cleanup_threshold()) {
                    return error::InvalidConfigValueSnafu {
                        key,
                        reason: format!(
                            "must satisfy 0 < cleanup_target < cleanup_threshold ({})",
                            self.cleanup_threshold()
                        ),
                    }
                    .fail();
                }
                self.file.cleanup_target = Some(target);
            }

            "cleanup_interval" => {
                let value = match value {
                    SettingValue::Int(n) if n >= 1 => n,
                    _ => {
                        return error::InvalidConfigValueSnafu {
                            key,
                            reason: "expected a count >= 1",
                        }
                        .fail();
                    }
                };
                self.file.cleanup_interval = Some(value);
            }

            _ => return error::UnknownConfigKeySnafu { key }.fail(),
        }

        self.dirty = true;
        Ok(())
    }

    /// Effective configuration with defaults filled in, for `--config` dumps.
    pub(crate) fn dump(&self) -> serde_json::Value {
        serde_json::json!({
            "max_cache_size": self.max_cache_size(),
            "cache_dir": self.cache_dir(),
            "cleanup_threshold": self.cleanup_threshold(),
            "cleanup_target": self.cleanup_target(),
            "cleanup_interval": self.cleanup_interval(),
            "stats": self.file.stats,
        })
    }

    /// Write the record out if anything changed since load or the last flush.
    ///
    /// The replacement is atomic: serialize to a sibling temp file, then
    /// rename over the live path. A failed flush leaves the in-memory state
    /// authoritative for the rest of the process.
    pub(crate) fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let parent = self
            .path
            .parent()
            .expect("settings path always has a parent directory");
        std::fs::create_dir_all(parent).with_context(|_| error::IoSnafu {
            path: parent.to_path_buf(),
        })?;

        let json = serde_json::to_vec_pretty(&self.file).context(error::JsonSnafu)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).with_context(|_| error::IoSnafu {
            path: parent.to_path_buf(),
        })?;
        tmp.write_all(&json).with_context(|_| error::IoSnafu {
            path: tmp.path().to_path_buf(),
        })?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|_| error::IoSnafu {
                path: self.path.clone(),
            })?;

        self.dirty = false;
        Ok(())
    }
}

/// `$HOME/.tidycache`, the documented default location.
fn default_cache_dir() -> PathBuf {
    home::home_dir()
        .map(|h| h.join(".tidycache"))
        .unwrap_or_else(|| PathBuf::from(".tidycache"))
}

/// Create an isolated settings fixture rooted in a [`tempfile::TempDir`],
/// with `cache_dir` pinned so tests never consult the environment.
#[cfg(test)]
pub(crate) fn create_test_env() -> (tempfile::TempDir, Settings) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::load(temp_dir.path().join("config").join("config.json"));
    settings.file.cache_dir = Some(temp_dir.path().join("cache"));
    (temp_dir, settings)
}
