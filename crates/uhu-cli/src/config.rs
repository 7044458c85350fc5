//! Configuration resolution for the `uhu` CLI.
//!
//! The persistent store itself lives in [`uhu_core::ConfigStore`]. This
//! module decides *which* file backs it and layers command-line and
//! environment overrides on top.
//!
//! # Configuration File Locations
//!
//! - `--config <path>` or `UHU_CONFIG`
//! - Unix: `~/.config/uhu/config.toml`
//! - Windows: `%APPDATA%\uhu\config\config.toml`

use std::path::{Path, PathBuf};

use thiserror::Error;
use uhu_core::{ChunkSize, ConfigStore, UhuError, DEFAULT_SECTION};

/// Entry in the `settings` section holding the tracing filter.
pub const LOG_LEVEL_ENTRY: &str = "log_level";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `--config` given and no platform config directory
    #[error("Could not determine configuration directory; pass --config")]
    NoConfigDir,

    /// Store failed to load or holds an invalid value
    #[error(transparent)]
    Store(#[from] UhuError),
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Chunk size in bytes (`UHU_CHUNK_SIZE`)
    pub chunk_size: Option<String>,
    /// Forces the `debug` log level
    pub debug: bool,
    /// Forces the `info` log level
    pub verbose: bool,
}

/// Effective settings for one invocation.
///
/// A malformed config file does not fail resolution: reads report the
/// parse error, writes start over from an empty document.
#[derive(Debug, Clone)]
pub struct Settings {
    store: ConfigStore,
    /// Parse error of the backing file, if it could not be read
    damaged: Option<String>,
    /// Chunk size given on the command line or through the environment
    pub chunk_size_override: Option<String>,
    /// Tracing filter directive
    pub log_level: String,
}

impl Settings {
    /// Load the store and apply overrides. Overrides win over stored values.
    pub fn resolve(
        custom_path: Option<&Path>,
        overrides: &CliOverrides,
    ) -> Result<Self, ConfigError> {
        let path = match custom_path {
            Some(path) => path.to_path_buf(),
            None => default_path().ok_or(ConfigError::NoConfigDir)?,
        };
        let (store, damaged) = match ConfigStore::load(&path) {
            Ok(store) => (store, None),
            Err(UhuError::ConfigParse(reason)) => {
                tracing::debug!(path = %path.display(), %reason, "Config file is malformed");
                (ConfigStore::empty(path), Some(reason))
            }
            Err(e) => return Err(e.into()),
        };

        let log_level = if overrides.debug {
            "debug".to_string()
        } else if overrides.verbose {
            "info".to_string()
        } else {
            store
                .get(LOG_LEVEL_ENTRY, DEFAULT_SECTION)
                .unwrap_or("warn")
                .to_string()
        };

        Ok(Self {
            store,
            damaged,
            chunk_size_override: overrides.chunk_size.clone(),
            log_level,
        })
    }

    /// Chunk size for every digest of this run. Resolved on use; a bad
    /// stored value must not block `config set`.
    pub fn chunk_size(&self) -> Result<ChunkSize, UhuError> {
        match self.chunk_size_override.as_deref() {
            Some(value) => value.parse(),
            None => self.store()?.chunk_size(),
        }
    }

    /// The loaded store. Fails if the backing file is malformed.
    pub fn store(&self) -> Result<&ConfigStore, UhuError> {
        match &self.damaged {
            Some(reason) => Err(UhuError::ConfigParse(reason.clone())),
            None => Ok(&self.store),
        }
    }

    /// The store, for writing. A malformed file is replaced on the next
    /// write.
    pub fn store_mut(&mut self) -> &mut ConfigStore {
        if self.damaged.take().is_some() {
            tracing::warn!(
                path = %self.store.path().display(),
                "Replacing malformed config file"
            );
        }
        &mut self.store
    }
}

/// Get default configuration file path
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "uhu", "uhu")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
