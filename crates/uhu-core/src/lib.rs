//! # uhu-core
//!
//! Building blocks for UHU firmware update packages.
//!
//! This crate handles:
//! - Chunked SHA-256 hashing of object files
//! - Mode and option schemas with type coercion, choices and requirements
//! - Objects and their template, metadata and upload descriptor forms
//! - Installation sets (A/B and N-way) with shared and per-set options
//! - Package documents, final package metadata and atomic persistence
//! - The sectioned configuration store
//!
//! Everything here is synchronous. Chunk size is always passed in by the
//! caller; nothing reads ambient configuration.

pub mod chunk;
pub mod config;
pub mod error;
pub mod installation_set;
pub mod mode;
pub mod object;
pub mod option;
pub mod package;
mod persist;
#[cfg(test)]
mod proptests;

// Re-export main types for convenience
pub use chunk::{Chunk, ChunkDescriptor, ChunkReader, ChunkSize, FileDigest};
pub use config::{ConfigStore, DEFAULT_CHUNK_SIZE, DEFAULT_SECTION};
pub use error::{ErrorKind, UhuError};
pub use installation_set::{InstallationSets, ObjectInputs, ObjectsTemplate, SetValue};
pub use mode::Mode;
pub use object::{Object, ObjectDescriptor, ObjectMetadata, ObjectTemplate};
pub use option::{OptionKind, OptionName, OptionSpec, OptionValue, OptionValues};
pub use package::{Package, PackageMetadata, PackageTemplate, SupportedHardware};
