//! Error types for the package core.

use std::path::PathBuf;

use thiserror::Error;

/// Broad failure category, used by the command layer to pick an exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad, missing, or disallowed option value
    Validation,
    /// Unknown mode or option name
    Schema,
    /// Unreadable object file or misaligned installation sets
    Integrity,
    /// Removing something that is not there
    NotFound,
    /// Missing or invalid configuration
    Configuration,
    /// Reading or writing the package/config documents failed
    Persistence,
}

/// Errors that can occur while building, validating, or persisting packages.
#[derive(Debug, Error)]
pub enum UhuError {
    /// Option is required but no value (and no default) is available
    #[error("option {option} is required")]
    MissingRequiredOption { option: String },

    /// Value cannot be coerced into the option's type
    #[error("invalid value {value:?} for option {option}: {reason}")]
    InvalidOptionValue {
        option: String,
        value: String,
        reason: String,
    },

    /// Value is not one of the option's choices
    #[error("invalid value {value:?} for option {option}; choose one of: {}", choices.join(", "))]
    InvalidChoice {
        option: String,
        value: String,
        choices: Vec<String>,
    },

    /// A value was supplied for an option whose requirement is not met
    #[error("option {option} requires {requires} to be one of: {}", expected.join(", "))]
    UnmetRequirement {
        option: String,
        requires: String,
        expected: Vec<String>,
    },

    /// A symmetric option was given a per-set value
    #[error("option {option} is shared by all installation sets and cannot be set per set")]
    SymmetricOptionPerSet { option: String },

    /// Mode name is not registered
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// Option name is not registered
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// Option exists but is not legal for the mode
    #[error("option {option} is not supported by mode {mode}")]
    OptionNotInMode { option: String, mode: String },

    /// Object file could not be read while hashing
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Installation sets are misaligned or mixed
    #[error("incompatible installation set: {0}")]
    IncompatibleInstallationSet(String),

    /// Supported hardware identifier is not in the package
    #[error("supported hardware not found: {0}")]
    HardwareNotFound(String),

    /// Object index is out of range
    #[error("object not found: {0}")]
    ObjectNotFound(usize),

    /// Installation set index is out of range
    #[error("installation set not found: {0}")]
    InstallationSetNotFound(usize),

    /// Configuration entry needed by the operation is missing
    #[error("missing configuration entry {entry} in section {section}")]
    MissingConfigEntry { entry: String, section: String },

    /// Chunk size is zero or unparsable
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(String),

    /// Package field needed for metadata is not set
    #[error("package {0} is not set")]
    MissingPackageField(&'static str),

    /// Configuration document could not be parsed or written
    #[error("configuration error: {0}")]
    ConfigParse(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl UhuError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UhuError::MissingRequiredOption { .. }
            | UhuError::InvalidOptionValue { .. }
            | UhuError::InvalidChoice { .. }
            | UhuError::UnmetRequirement { .. }
            | UhuError::SymmetricOptionPerSet { .. } => ErrorKind::Validation,
            UhuError::UnknownMode(_)
            | UhuError::UnknownOption(_)
            | UhuError::OptionNotInMode { .. } => ErrorKind::Schema,
            UhuError::Unreadable { .. } | UhuError::IncompatibleInstallationSet(_) => {
                ErrorKind::Integrity
            }
            UhuError::HardwareNotFound(_)
            | UhuError::ObjectNotFound(_)
            | UhuError::InstallationSetNotFound(_) => ErrorKind::NotFound,
            UhuError::MissingConfigEntry { .. }
            | UhuError::InvalidChunkSize(_)
            | UhuError::MissingPackageField(_)
            | UhuError::ConfigParse(_) => ErrorKind::Configuration,
            UhuError::JsonError(_) | UhuError::IoError(_) => ErrorKind::Persistence,
        }
    }
}

impl From<toml::de::Error> for UhuError {
    fn from(err: toml::de::Error) -> Self {
        UhuError::ConfigParse(err.to_string())
    }
}

impl From<toml::ser::Error> for UhuError {
    fn from(err: toml::ser::Error) -> Self {
        UhuError::ConfigParse(err.to_string())
    }
}
