//! Update packages.
//!
//! A package is an ordered, installation-set aware collection of objects
//! plus package-level data: supported hardware, version, and product UID.
//!
//! Two document forms exist:
//! - the **template** ([`PackageTemplate`]), persisted with [`Package::dump`]
//!   and read back with [`Package::from_file`]; it never carries hashes
//! - the **metadata** ([`PackageMetadata`]), generated on demand from the
//!   current file contents and shipped to devices

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chunk::ChunkSize;
use crate::error::UhuError;
use crate::installation_set::{InstallationSets, ObjectInputs, ObjectsTemplate};
use crate::mode::Mode;
use crate::object::{Object, ObjectMetadata};
use crate::persist::write_atomic;

/// Hardware identifiers a package may be installed on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportedHardware(BTreeSet<String>);

impl SupportedHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identifier. Returns `false` if it was already present.
    pub fn add(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    /// Remove an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`UhuError::HardwareNotFound`] if `name` is not present.
    pub fn remove(&mut self, name: &str) -> Result<(), UhuError> {
        if self.0.remove(name) {
            Ok(())
        } else {
            Err(UhuError::HardwareNotFound(name.to_string()))
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identifiers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Persisted package document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageTemplate {
    #[serde(default)]
    pub supported_hardware: SupportedHardware,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub product_uid: Option<String>,
    #[serde(default)]
    pub objects: ObjectsTemplate,
}

/// Final package metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageMetadata {
    pub product: String,
    pub version: String,
    /// List of identifiers, or `"any"` when the package is unrestricted
    #[serde(rename = "supported-hardware")]
    pub supported_hardware: serde_json::Value,
    /// Object metadata, always nested by installation set
    pub objects: Vec<Vec<ObjectMetadata>>,
}

/// An update package under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    objects: InstallationSets,
    supported_hardware: SupportedHardware,
    version: Option<String>,
    product: Option<String>,
}

impl Package {
    /// Empty package: no objects, single installation set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> &InstallationSets {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut InstallationSets {
        &mut self.objects
    }

    pub fn supported_hardware(&self) -> &SupportedHardware {
        &self.supported_hardware
    }

    pub fn supported_hardware_mut(&mut self) -> &mut SupportedHardware {
        &mut self.supported_hardware
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn set_product(&mut self, product: impl Into<String>) {
        self.product = Some(product.into());
    }

    /// Add an object to every installation set. See [`InstallationSets::add`].
    pub fn add_object(
        &mut self,
        mode: Mode,
        inputs: &ObjectInputs,
        installation_sets: Option<usize>,
    ) -> Result<usize, UhuError> {
        self.objects.add(mode, inputs, installation_sets)
    }

    /// Remove the object at `index` from every installation set.
    pub fn remove_object(&mut self, index: usize) -> Result<Vec<Object>, UhuError> {
        self.objects.remove(index)
    }

    /// Editable document form.
    pub fn template(&self) -> PackageTemplate {
        PackageTemplate {
            supported_hardware: self.supported_hardware.clone(),
            version: self.version.clone(),
            product_uid: self.product.clone(),
            objects: self.objects.template(),
        }
    }

    /// Rebuild from a document, re-validating every object. Objects come
    /// back unloaded.
    pub fn from_template(template: &PackageTemplate) -> Result<Self, UhuError> {
        Ok(Self {
            objects: InstallationSets::from_template(&template.objects)?,
            supported_hardware: template.supported_hardware.clone(),
            version: template.version.clone(),
            product: template.product_uid.clone(),
        })
    }

    /// Read a package document written by [`Package::dump`].
    pub fn from_file(path: &Path) -> Result<Self, UhuError> {
        let content = std::fs::read_to_string(path)?;
        let template: PackageTemplate = serde_json::from_str(&content)?;
        let package = Self::from_template(&template)?;
        tracing::debug!(
            path = %path.display(),
            objects = package.objects.len(),
            sets = package.objects.set_count(),
            "Package loaded"
        );
        Ok(package)
    }

    /// Write the template document atomically.
    pub fn dump(&self, path: &Path) -> Result<(), UhuError> {
        let content = serde_json::to_string_pretty(&self.template())?;
        write_atomic(path, content.as_bytes())?;
        tracing::debug!(path = %path.display(), "Package dumped");
        Ok(())
    }

    /// Final metadata. Every object is loaded (hashed) first.
    ///
    /// # Errors
    ///
    /// - [`UhuError::MissingPackageField`] if product or version is unset
    /// - [`UhuError::Unreadable`] if an object file cannot be read
    pub fn metadata(&mut self, chunk_size: ChunkSize) -> Result<PackageMetadata, UhuError> {
        let product = self
            .product
            .clone()
            .ok_or(UhuError::MissingPackageField("product"))?;
        let version = self
            .version
            .clone()
            .ok_or(UhuError::MissingPackageField("version"))?;

        let supported_hardware = if self.supported_hardware.is_empty() {
            json!("any")
        } else {
            json!(self.supported_hardware.iter().collect::<Vec<_>>())
        };

        Ok(PackageMetadata {
            product,
            version,
            supported_hardware,
            objects: self.objects.metadata(chunk_size)?,
        })
    }

    /// Generate the metadata and write it atomically to `path`.
    pub fn export_metadata(&mut self, path: &Path, chunk_size: ChunkSize) -> Result<(), UhuError> {
        let metadata = self.metadata(chunk_size)?;
        let content = serde_json::to_string_pretty(&metadata)?;
        write_atomic(path, content.as_bytes())
    }
}
