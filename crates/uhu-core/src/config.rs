//! Persistent configuration store.
//!
//! A TOML document of named sections, each a table of string entries:
//!
//! ```toml
//! [auth]
//! access_id = "..."
//! access_secret = "..."
//!
//! [settings]
//! chunk_size = "1048576"
//! ```
//!
//! The store is loaded once and flushed to disk on every write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::chunk::ChunkSize;
use crate::error::UhuError;
use crate::persist::write_atomic;

/// Section used when none is given.
pub const DEFAULT_SECTION: &str = "settings";
/// Credentials section written by [`ConfigStore::set_initial`].
pub const AUTH_SECTION: &str = "auth";
/// Server endpoint section.
pub const SERVER_SECTION: &str = "server";

/// Entry holding the chunk size in bytes, under [`DEFAULT_SECTION`].
pub const CHUNK_SIZE_ENTRY: &str = "chunk_size";
/// Chunk size used when none is configured (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

type Sections = BTreeMap<String, BTreeMap<String, String>>;

/// Sectioned key/value configuration backed by a TOML file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    sections: Sections,
}

impl ConfigStore {
    /// Load the store at `path`. A missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, UhuError> {
        let path = path.into();
        let sections: Sections = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Sections::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), sections = sections.len(), "Config loaded");
        Ok(Self { path, sections })
    }

    /// An empty store at `path`. Nothing is written until the first write,
    /// which replaces whatever the file held.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sections: Sections::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up an entry. Missing sections and entries are `None`.
    pub fn get(&self, entry: &str, section: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(entry))
            .map(String::as_str)
    }

    /// Like [`get`](Self::get), but a missing entry is an error.
    pub fn require(&self, entry: &str, section: &str) -> Result<&str, UhuError> {
        self.get(entry, section)
            .ok_or_else(|| UhuError::MissingConfigEntry {
                entry: entry.to_string(),
                section: section.to_string(),
            })
    }

    /// Set an entry and flush the whole document.
    pub fn set(
        &mut self,
        entry: impl Into<String>,
        value: impl Into<String>,
        section: &str,
    ) -> Result<(), UhuError> {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(entry.into(), value.into());
        self.flush()
    }

    /// Store the access credentials in the `auth` section.
    pub fn set_initial(&mut self, access_id: &str, access_secret: &str) -> Result<(), UhuError> {
        let auth = self.sections.entry(AUTH_SECTION.to_string()).or_default();
        auth.insert("access_id".into(), access_id.into());
        auth.insert("access_secret".into(), access_secret.into());
        self.flush()
    }

    /// Configured chunk size, or [`DEFAULT_CHUNK_SIZE`].
    pub fn chunk_size(&self) -> Result<ChunkSize, UhuError> {
        match self.get(CHUNK_SIZE_ENTRY, DEFAULT_SECTION) {
            Some(value) => value.parse(),
            None => ChunkSize::new(DEFAULT_CHUNK_SIZE),
        }
    }

    fn flush(&self) -> Result<(), UhuError> {
        let content = toml::to_string_pretty(&self.sections)?;
        write_atomic(&self.path, content.as_bytes())
    }
}
