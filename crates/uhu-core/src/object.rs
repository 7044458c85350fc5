//! Update objects.
//!
//! An object is one file bound to a mode and a validated set of option
//! values. Construction never touches the filesystem; [`Object::load`]
//! reads the file once and caches its digest.
//!
//! Objects have three serialized forms that are never mixed:
//! - [`ObjectTemplate`]: editable, hash-free, reloadable
//! - [`ObjectMetadata`]: final, hash-bearing record shipped to devices
//! - [`ObjectDescriptor`]: metadata plus chunk list, used for transfers

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chunk::{ChunkDescriptor, ChunkSize, FileDigest};
use crate::error::UhuError;
use crate::mode::Mode;
use crate::option::{OptionName, OptionValue, OptionValues};

/// Editable form of an object: mode plus every validated option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTemplate {
    pub mode: String,
    #[serde(flatten)]
    pub options: BTreeMap<String, OptionValue>,
}

/// Final metadata record of an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectMetadata {
    pub mode: String,
    pub filename: String,
    pub size: u64,
    pub sha256sum: String,
    #[serde(rename = "install-if-different", skip_serializing_if = "Option::is_none")]
    pub install_if_different: Option<serde_json::Value>,
    #[serde(flatten)]
    pub options: BTreeMap<String, OptionValue>,
}

/// Upload descriptor: object identity, chunk list, and metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDescriptor {
    pub id: String,
    pub sha256sum: String,
    pub parts: Vec<ChunkDescriptor>,
    pub metadata: ObjectMetadata,
}

#[derive(Debug, Clone)]
enum LoadState {
    NotLoaded,
    Loaded(FileDigest),
}

/// A file bound to an installation mode and validated options.
#[derive(Debug, Clone)]
pub struct Object {
    filename: String,
    mode: Mode,
    options: OptionValues,
    state: LoadState,
}

impl Object {
    /// Validate `options` for `mode` and bind them to `filename`.
    ///
    /// Any `filename` entry in `options` is replaced by the argument.
    pub fn new(
        filename: impl Into<String>,
        mode: Mode,
        options: &OptionValues,
    ) -> Result<Self, UhuError> {
        let mut raw = options.clone();
        raw.insert(OptionName::Filename, OptionValue::Text(filename.into()));
        Self::from_values(mode, &raw)
    }

    /// Validate a raw value map that already carries `filename`.
    pub fn from_values(mode: Mode, raw: &OptionValues) -> Result<Self, UhuError> {
        let options = mode.validate(raw)?;
        Self::from_validated(mode, options)
    }

    /// Rebuild an object from its template. The file is not read.
    pub fn from_template(template: &ObjectTemplate) -> Result<Self, UhuError> {
        let mode: Mode = template.mode.parse()?;
        let raw = mode.parse_options(&template.options)?;
        Self::from_values(mode, &raw)
    }

    fn from_validated(mode: Mode, options: OptionValues) -> Result<Self, UhuError> {
        let filename = options
            .get(&OptionName::Filename)
            .and_then(OptionValue::as_text)
            .map(str::to_string)
            .ok_or_else(|| UhuError::MissingRequiredOption {
                option: OptionName::Filename.to_string(),
            })?;
        Ok(Self {
            filename,
            mode,
            options,
            state: LoadState::NotLoaded,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn options(&self) -> &OptionValues {
        &self.options
    }

    pub fn option(&self, name: OptionName) -> Option<&OptionValue> {
        self.options.get(&name)
    }

    fn text(&self, name: OptionName) -> Option<&str> {
        self.option(name).and_then(OptionValue::as_text)
    }

    /// Change one option and re-validate the whole object.
    ///
    /// Other options whose requirement stops being met are dropped; a value
    /// for `name` itself with an unmet requirement is an error. Changing the
    /// filename discards any cached digest.
    pub fn set_option(&mut self, name: OptionName, value: OptionValue) -> Result<(), UhuError> {
        self.mode.option(name)?;
        let mut raw = self.options.clone();
        raw.insert(name, value);
        let updated = Self::from_validated(self.mode, self.mode.revalidate(&raw, name)?)?;

        if updated.filename != self.filename {
            self.state = LoadState::NotLoaded;
        }
        self.filename = updated.filename;
        self.options = updated.options;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, LoadState::Loaded(_))
    }

    /// Cached digest, if [`Object::load`] has succeeded.
    pub fn digest(&self) -> Option<&FileDigest> {
        match &self.state {
            LoadState::Loaded(digest) => Some(digest),
            LoadState::NotLoaded => None,
        }
    }

    /// Read the file and compute size, hash, and chunks. No-op once loaded.
    pub fn load(&mut self, chunk_size: ChunkSize) -> Result<&FileDigest, UhuError> {
        if let LoadState::NotLoaded = self.state {
            let digest = FileDigest::compute(Path::new(&self.filename), chunk_size)?;
            self.state = LoadState::Loaded(digest);
        }
        let LoadState::Loaded(digest) = &self.state else {
            unreachable!("object digest was just stored");
        };
        Ok(digest)
    }

    /// Editable representation: no size, hash, or chunks.
    pub fn template(&self) -> ObjectTemplate {
        ObjectTemplate {
            mode: self.mode.name().to_string(),
            options: self
                .options
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        }
    }

    /// Final metadata record. Loads the object if needed.
    pub fn metadata(&mut self, chunk_size: ChunkSize) -> Result<ObjectMetadata, UhuError> {
        let digest = self.load(chunk_size)?.clone();
        Ok(self.metadata_for(&digest))
    }

    /// Upload descriptor. Loads the object if needed.
    pub fn serialize(&mut self, chunk_size: ChunkSize) -> Result<ObjectDescriptor, UhuError> {
        let metadata = self.metadata(chunk_size)?;
        let parts = self
            .digest()
            .map(|digest| digest.chunks.clone())
            .unwrap_or_default();
        Ok(ObjectDescriptor {
            id: self.filename.clone(),
            sha256sum: metadata.sha256sum.clone(),
            parts,
            metadata,
        })
    }

    fn metadata_for(&self, digest: &FileDigest) -> ObjectMetadata {
        let mut options = BTreeMap::new();
        for (name, value) in &self.options {
            if *name == OptionName::Filename {
                continue;
            }
            if let Some(key) = name.spec().metadata_key {
                options.insert(key.to_string(), value.clone());
            }
        }

        ObjectMetadata {
            mode: self.mode.name().to_string(),
            filename: self.filename.clone(),
            size: digest.size,
            sha256sum: digest.hex_sha256sum(),
            install_if_different: self.install_if_different(),
            options,
        }
    }

    fn install_if_different(&self) -> Option<serde_json::Value> {
        match self.text(OptionName::InstallCondition)? {
            "content-diverges" => Some(json!("sha256sum")),
            "version-diverges" => {
                let version = self.text(OptionName::InstallConditionVersion)?;
                let pattern = match self.text(OptionName::InstallConditionPatternType)? {
                    "regexp" => json!({
                        "regexp": self.text(OptionName::InstallConditionPattern)?,
                        "seek": self.option(OptionName::InstallConditionSeek)?,
                        "buffer-size": self.option(OptionName::InstallConditionBufferSize)?,
                    }),
                    kind => json!(kind),
                };
                Some(json!({ "version": version, "pattern": pattern }))
            }
            _ => None,
        }
    }
}

/// Objects are equal when they describe the same file, mode, and options.
/// The cached digest is not part of the identity.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.mode == other.mode && self.options == other.options
    }
}

impl Eq for Object {}
