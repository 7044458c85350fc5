//! Installation sets.
//!
//! A package holds either one flat list of objects or N parallel lists, one
//! per installation set (A/B partition schemes and the like). The object at
//! index `i` is the same logical object in every set: same mode, same
//! values for symmetric options, possibly different values for per-set
//! options.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkSize;
use crate::error::UhuError;
use crate::mode::Mode;
use crate::object::{Object, ObjectMetadata, ObjectTemplate};
use crate::option::{OptionName, OptionValue, OptionValues};

/// Value supplied for one option when adding an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetValue {
    /// One value, used as-is for every installation set.
    Shared(OptionValue),
    /// Exactly one value per installation set, in set order.
    PerSet(Vec<OptionValue>),
}

impl SetValue {
    fn for_set(&self, set: usize) -> Option<&OptionValue> {
        match self {
            SetValue::Shared(value) => Some(value),
            SetValue::PerSet(values) => values.get(set),
        }
    }
}

impl From<OptionValue> for SetValue {
    fn from(value: OptionValue) -> Self {
        SetValue::Shared(value)
    }
}

/// Raw option input for a new object, before per-set expansion.
pub type ObjectInputs = BTreeMap<OptionName, SetValue>;

/// Persisted layout of the object collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectsTemplate {
    Flat(Vec<ObjectTemplate>),
    Sets(Vec<Vec<ObjectTemplate>>),
}

impl Default for ObjectsTemplate {
    fn default() -> Self {
        ObjectsTemplate::Flat(Vec::new())
    }
}

/// Objects of a package, aligned across installation sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationSets {
    sets: Vec<Vec<Object>>,
}

impl Default for InstallationSets {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallationSets {
    /// Empty collection with a single installation set.
    pub fn new() -> Self {
        Self {
            sets: vec![Vec::new()],
        }
    }

    /// Number of installation sets.
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// Exactly one installation set; callers need not ask which set.
    pub fn is_single(&self) -> bool {
        self.sets.len() == 1
    }

    /// Number of logical objects (the length of every set).
    pub fn len(&self) -> usize {
        self.sets.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter_sets(&self) -> impl Iterator<Item = &[Object]> {
        self.sets.iter().map(Vec::as_slice)
    }

    pub fn set(&self, set: usize) -> Result<&[Object], UhuError> {
        self.sets
            .get(set)
            .map(Vec::as_slice)
            .ok_or(UhuError::InstallationSetNotFound(set))
    }

    pub fn get(&self, set: usize, index: usize) -> Result<&Object, UhuError> {
        self.set(set)?
            .get(index)
            .ok_or(UhuError::ObjectNotFound(index))
    }

    /// Add one logical object to every set.
    ///
    /// `count` fixes the number of installation sets when the collection is
    /// empty; on a non-empty collection it must match the current count.
    /// `None` broadcasts to the current sets. Returns the new object index.
    ///
    /// # Errors
    ///
    /// - [`UhuError::IncompatibleInstallationSet`] on a count mismatch or a
    ///   per-set value list of the wrong length
    /// - [`UhuError::SymmetricOptionPerSet`] when a shared option is given
    ///   different values per set
    /// - any validation error of the resulting objects
    pub fn add(
        &mut self,
        mode: Mode,
        inputs: &ObjectInputs,
        count: Option<usize>,
    ) -> Result<usize, UhuError> {
        let count = match count {
            Some(0) => {
                return Err(UhuError::IncompatibleInstallationSet(
                    "at least one installation set is required".into(),
                ))
            }
            Some(n) if !self.is_empty() && n != self.set_count() => {
                return Err(UhuError::IncompatibleInstallationSet(format!(
                    "package has {} installation sets, got {n}",
                    self.set_count()
                )))
            }
            Some(n) => n,
            None => self.set_count(),
        };

        let objects = resolve(mode, inputs, count)?;
        if self.is_empty() {
            self.sets = vec![Vec::new(); count];
        }
        for (set, object) in self.sets.iter_mut().zip(objects) {
            set.push(object);
        }

        tracing::debug!(
            mode = %mode,
            index = self.len() - 1,
            sets = self.set_count(),
            "Object added"
        );
        Ok(self.len() - 1)
    }

    /// Remove the object at `index` from every set.
    pub fn remove(&mut self, index: usize) -> Result<Vec<Object>, UhuError> {
        if index >= self.len() {
            return Err(UhuError::ObjectNotFound(index));
        }
        Ok(self.sets.iter_mut().map(|set| set.remove(index)).collect())
    }

    /// Change an option of the object at `index`.
    ///
    /// Symmetric options change in every set and reject an explicit `set`
    /// when there is more than one. Per-set options need `set` unless the
    /// collection has a single set. Nothing changes if validation fails in
    /// any set.
    pub fn set_option(
        &mut self,
        index: usize,
        set: Option<usize>,
        name: OptionName,
        value: OptionValue,
    ) -> Result<(), UhuError> {
        let spec = self.get(0, index)?.mode().option(name)?;

        if spec.symmetric {
            if set.is_some() && !self.is_single() {
                return Err(UhuError::SymmetricOptionPerSet {
                    option: name.to_string(),
                });
            }
            let mut updated = Vec::with_capacity(self.set_count());
            for objects in &self.sets {
                let mut object = objects[index].clone();
                object.set_option(name, value.clone())?;
                updated.push(object);
            }
            for (objects, object) in self.sets.iter_mut().zip(updated) {
                objects[index] = object;
            }
            return Ok(());
        }

        let set = match set {
            Some(set) => set,
            None if self.is_single() => 0,
            None => {
                return Err(UhuError::IncompatibleInstallationSet(format!(
                    "option {name} differs per installation set; choose a set"
                )))
            }
        };
        let mut object = self.get(set, index)?.clone();
        object.set_option(name, value)?;
        self.sets[set][index] = object;
        Ok(())
    }

    /// Metadata of every object, nested by installation set.
    pub fn metadata(&mut self, chunk_size: ChunkSize) -> Result<Vec<Vec<ObjectMetadata>>, UhuError> {
        self.sets
            .iter_mut()
            .map(|set| {
                set.iter_mut()
                    .map(|obj| obj.metadata(chunk_size))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect()
    }

    /// Persisted layout: flat for a single set, nested otherwise.
    pub fn template(&self) -> ObjectsTemplate {
        let templates = |objects: &[Object]| -> Vec<ObjectTemplate> {
            objects.iter().map(Object::template).collect()
        };
        if self.is_single() {
            ObjectsTemplate::Flat(templates(self.sets[0].as_slice()))
        } else {
            ObjectsTemplate::Sets(self.sets.iter().map(|set| templates(set.as_slice())).collect())
        }
    }

    /// Rebuild from the persisted layout, re-validating every object and
    /// the cross-set alignment.
    pub fn from_template(template: &ObjectsTemplate) -> Result<Self, UhuError> {
        let sets: Vec<Vec<Object>> = match template {
            ObjectsTemplate::Flat(objects) => vec![load_set(objects)?],
            ObjectsTemplate::Sets(sets) if sets.is_empty() => vec![Vec::new()],
            ObjectsTemplate::Sets(sets) => sets
                .iter()
                .map(|objects| load_set(objects))
                .collect::<Result<_, _>>()?,
        };

        let len = sets[0].len();
        if let Some(set) = sets.iter().position(|set| set.len() != len) {
            return Err(UhuError::IncompatibleInstallationSet(format!(
                "installation set {set} has {} objects, expected {len}",
                sets[set].len()
            )));
        }
        for index in 0..len {
            let column: Vec<&Object> = sets.iter().map(|set| &set[index]).collect();
            check_alignment(&column).map_err(|reason| {
                UhuError::IncompatibleInstallationSet(format!("object {index}: {reason}"))
            })?;
        }

        Ok(Self { sets })
    }
}

fn load_set(templates: &[ObjectTemplate]) -> Result<Vec<Object>, UhuError> {
    templates.iter().map(Object::from_template).collect()
}

/// Expand raw inputs into one validated object per installation set.
fn resolve(mode: Mode, inputs: &ObjectInputs, count: usize) -> Result<Vec<Object>, UhuError> {
    for (name, input) in inputs {
        mode.option(*name)?;
        if let SetValue::PerSet(values) = input {
            if values.len() != count {
                return Err(UhuError::IncompatibleInstallationSet(format!(
                    "option {name} has {} values for {count} installation sets",
                    values.len()
                )));
            }
        }
    }

    let mut objects = Vec::with_capacity(count);
    for set in 0..count {
        let raw: OptionValues = inputs
            .iter()
            .filter_map(|(name, input)| input.for_set(set).map(|value| (*name, value.clone())))
            .collect();
        objects.push(Object::from_values(mode, &raw)?);
    }

    let column: Vec<&Object> = objects.iter().collect();
    if let Err(option) = check_symmetric(&column) {
        return Err(UhuError::SymmetricOptionPerSet { option });
    }
    Ok(objects)
}

/// Same mode and same symmetric values across one index of every set.
fn check_alignment(column: &[&Object]) -> Result<(), String> {
    if let Some(first) = column.first() {
        if let Some(other) = column.iter().find(|obj| obj.mode() != first.mode()) {
            return Err(format!("mode {} differs from {}", other.mode(), first.mode()));
        }
    }
    check_symmetric(column).map_err(|option| format!("shared option {option} differs"))
}

fn check_symmetric(column: &[&Object]) -> Result<(), String> {
    let Some(first) = column.first() else {
        return Ok(());
    };
    for spec in first.mode().options().filter(|spec| spec.symmetric) {
        let expected = first.option(spec.name);
        if column.iter().any(|obj| obj.option(spec.name) != expected) {
            return Err(spec.name.to_string());
        }
    }
    Ok(())
}
