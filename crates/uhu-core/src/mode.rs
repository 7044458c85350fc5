//! Installation modes.
//!
//! The set of modes is closed: each variant carries its own option list and
//! the target types it can write to.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::UhuError;
use crate::option::{OptionName, OptionSpec, OptionValue, OptionValues};

/// Named installation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    Copy,
    Flash,
    Imxkobs,
    Raw,
    Tarball,
    Ubifs,
    Zephyr,
}

use OptionName as O;

const COPY_OPTIONS: &[OptionName] = &[
    O::Filename,
    O::TargetType,
    O::Target,
    O::TargetPath,
    O::Filesystem,
    O::Format,
    O::FormatOptions,
    O::MountOptions,
    O::Compressed,
    O::RequiredUncompressedSize,
    O::InstallCondition,
    O::InstallConditionPatternType,
    O::InstallConditionPattern,
    O::InstallConditionSeek,
    O::InstallConditionBufferSize,
    O::InstallConditionVersion,
];

const TARBALL_OPTIONS: &[OptionName] = &[
    O::Filename,
    O::TargetType,
    O::Target,
    O::TargetPath,
    O::Filesystem,
    O::Format,
    O::FormatOptions,
    O::MountOptions,
    O::InstallCondition,
    O::InstallConditionPatternType,
    O::InstallConditionPattern,
    O::InstallConditionSeek,
    O::InstallConditionBufferSize,
    O::InstallConditionVersion,
];

const RAW_OPTIONS: &[OptionName] = &[
    O::Filename,
    O::TargetType,
    O::Target,
    O::ChunkSize,
    O::Skip,
    O::Seek,
    O::Count,
    O::Truncate,
    O::Compressed,
    O::RequiredUncompressedSize,
    O::InstallCondition,
    O::InstallConditionPatternType,
    O::InstallConditionPattern,
    O::InstallConditionSeek,
    O::InstallConditionBufferSize,
    O::InstallConditionVersion,
];

const FLASH_OPTIONS: &[OptionName] = &[
    O::Filename,
    O::TargetType,
    O::Target,
    O::InstallCondition,
    O::InstallConditionPatternType,
    O::InstallConditionPattern,
    O::InstallConditionSeek,
    O::InstallConditionBufferSize,
    O::InstallConditionVersion,
];

const UBIFS_OPTIONS: &[OptionName] = &[
    O::Filename,
    O::TargetType,
    O::Target,
    O::Compressed,
    O::RequiredUncompressedSize,
];

const IMXKOBS_OPTIONS: &[OptionName] = &[
    O::Filename,
    O::Padding1k,
    O::SearchExponent,
    O::Chip0DevicePath,
    O::Chip1DevicePath,
    O::InstallCondition,
    O::InstallConditionPatternType,
    O::InstallConditionPattern,
    O::InstallConditionSeek,
    O::InstallConditionBufferSize,
    O::InstallConditionVersion,
];

const ZEPHYR_OPTIONS: &[OptionName] = &[O::Filename];

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::Copy,
        Mode::Flash,
        Mode::Imxkobs,
        Mode::Raw,
        Mode::Tarball,
        Mode::Ubifs,
        Mode::Zephyr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Mode::Copy => "copy",
            Mode::Flash => "flash",
            Mode::Imxkobs => "imxkobs",
            Mode::Raw => "raw",
            Mode::Tarball => "tarball",
            Mode::Ubifs => "ubifs",
            Mode::Zephyr => "zephyr",
        }
    }

    /// Registered mode names.
    pub fn names() -> impl Iterator<Item = &'static str> {
        Mode::ALL.into_iter().map(Mode::name)
    }

    /// Options legal for this mode, in validation order.
    pub fn option_names(self) -> &'static [OptionName] {
        match self {
            Mode::Copy => COPY_OPTIONS,
            Mode::Flash => FLASH_OPTIONS,
            Mode::Imxkobs => IMXKOBS_OPTIONS,
            Mode::Raw => RAW_OPTIONS,
            Mode::Tarball => TARBALL_OPTIONS,
            Mode::Ubifs => UBIFS_OPTIONS,
            Mode::Zephyr => ZEPHYR_OPTIONS,
        }
    }

    /// Values accepted by `target-type`.
    pub fn target_types(self) -> &'static [&'static str] {
        match self {
            Mode::Copy | Mode::Tarball => &["device", "ubivolume", "mtdname"],
            Mode::Raw | Mode::Flash => &["device", "mtdname"],
            Mode::Ubifs => &["ubivolume"],
            Mode::Imxkobs | Mode::Zephyr => &[],
        }
    }

    pub fn supports(self, name: OptionName) -> bool {
        self.option_names().contains(&name)
    }

    /// Option schemas for this mode; `target-type` choices come from the mode.
    pub fn options(self) -> impl Iterator<Item = OptionSpec> {
        self.option_names().iter().map(move |name| self.spec_for(*name))
    }

    /// Schema of one option within this mode.
    pub fn option(self, name: OptionName) -> Result<OptionSpec, UhuError> {
        if !self.supports(name) {
            return Err(UhuError::OptionNotInMode {
                option: name.to_string(),
                mode: self.name().to_string(),
            });
        }
        Ok(self.spec_for(name))
    }

    fn spec_for(self, name: OptionName) -> OptionSpec {
        let spec = *name.spec();
        if name == OptionName::TargetType {
            OptionSpec {
                choices: self.target_types(),
                ..spec
            }
        } else {
            spec
        }
    }

    /// Parse option names of a raw value map against this mode.
    pub fn parse_options(
        self,
        raw: &BTreeMap<String, OptionValue>,
    ) -> Result<OptionValues, UhuError> {
        raw.iter()
            .map(|(key, value)| {
                let name: OptionName = key.parse()?;
                self.option(name)?;
                Ok((name, value.clone()))
            })
            .collect()
    }

    /// Validate a full set of raw values for one object.
    ///
    /// Options are processed in declaration order so requirements always
    /// see their validated dependency. Options with unmet requirements are
    /// absent from the result; supplying a value for one is an error.
    pub fn validate(self, raw: &OptionValues) -> Result<OptionValues, UhuError> {
        self.validate_with(raw, None)
    }

    /// Like [`Mode::validate`], but silently drops stored values whose
    /// requirement is no longer met. Used when editing `edited` on an
    /// existing object; a value for `edited` itself must still have its
    /// requirement met.
    pub fn revalidate(
        self,
        raw: &OptionValues,
        edited: OptionName,
    ) -> Result<OptionValues, UhuError> {
        self.validate_with(raw, Some(edited))
    }

    fn validate_with(
        self,
        raw: &OptionValues,
        edited: Option<OptionName>,
    ) -> Result<OptionValues, UhuError> {
        if let Some(name) = raw.keys().find(|name| !self.supports(**name)) {
            return Err(UhuError::OptionNotInMode {
                option: name.to_string(),
                mode: self.name().to_string(),
            });
        }

        let mut validated = OptionValues::new();
        for spec in self.options() {
            let mut proposed = raw.get(&spec.name);
            let dependent = edited.is_some_and(|name| name != spec.name);
            if dependent && !spec.requirement_met(&validated) {
                proposed = None;
            }
            if let Some(value) = spec.validate(proposed, &validated)? {
                validated.insert(spec.name, value);
            }
        }
        Ok(validated)
    }
}

impl FromStr for Mode {
    type Err = UhuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|mode| mode.name() == name)
            .ok_or_else(|| UhuError::UnknownMode(s.to_string()))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(OptionName, &str)]) -> OptionValues {
        pairs
            .iter()
            .map(|(name, value)| (*name, OptionValue::from(*value)))
            .collect()
    }

    fn copy_defaults() -> OptionValues {
        raw(&[
            (O::Filename, "rootfs.img"),
            (O::TargetType, "device"),
            (O::Target, "/dev/sda"),
            (O::TargetPath, "/usr/bin"),
            (O::Filesystem, "ext4"),
        ])
    }

    #[test]
    fn test_lookup() {
        assert_eq!("copy".parse::<Mode>().unwrap(), Mode::Copy);
        assert_eq!("Tarball".parse::<Mode>().unwrap(), Mode::Tarball);
        assert!(matches!("zip".parse::<Mode>(), Err(UhuError::UnknownMode(m)) if m == "zip"));
        assert_eq!(Mode::names().count(), Mode::ALL.len());
    }

    #[test]
    fn test_option_lists_are_ordered() {
        for mode in Mode::ALL {
            let names = mode.option_names();
            assert!(names.windows(2).all(|w| w[0] < w[1]), "{mode}");
            assert_eq!(names[0], O::Filename);
        }
    }

    #[test]
    fn test_requirements_stay_inside_mode() {
        for mode in Mode::ALL {
            for spec in mode.options() {
                if let Some(req) = spec.requirement {
                    assert!(mode.supports(req.option), "{mode}: {}", spec.name);
                }
            }
        }
    }

    #[test]
    fn test_copy_defaults() {
        let values = Mode::Copy.validate(&copy_defaults()).unwrap();
        assert_eq!(values.get(&O::Format), Some(&OptionValue::Bool(false)));
        assert_eq!(values.get(&O::InstallCondition), Some(&"always".into()));
        assert!(!values.contains_key(&O::FormatOptions));
        assert!(!values.contains_key(&O::MountOptions));
        assert!(!values.contains_key(&O::RequiredUncompressedSize));
    }

    #[test]
    fn test_compressed_needs_no_uncompressed_size() {
        let mut input = copy_defaults();
        input.insert(O::Compressed, true.into());
        let values = Mode::Copy.validate(&input).unwrap();
        assert!(!values.contains_key(&O::RequiredUncompressedSize));

        input.insert(O::RequiredUncompressedSize, "4096".into());
        let values = Mode::Copy.validate(&input).unwrap();
        assert_eq!(
            values.get(&O::RequiredUncompressedSize),
            Some(&OptionValue::Integer(4096))
        );
    }

    #[test]
    fn test_copy_with_format() {
        let mut input = copy_defaults();
        input.insert(O::Format, true.into());
        input.insert(O::FormatOptions, "--foption".into());
        input.insert(O::MountOptions, "--moption".into());

        let values = Mode::Copy.validate(&input).unwrap();
        assert_eq!(values.get(&O::FormatOptions), Some(&"--foption".into()));
        assert_eq!(values.get(&O::MountOptions), Some(&"--moption".into()));
    }

    #[test]
    fn test_value_for_unmet_requirement_is_rejected() {
        let mut input = copy_defaults();
        input.insert(O::FormatOptions, "--foption".into());
        let err = Mode::Copy.validate(&input).unwrap_err();
        assert!(matches!(err, UhuError::UnmetRequirement { .. }));
    }

    #[test]
    fn test_revalidate_drops_unmet() {
        let mut input = copy_defaults();
        input.insert(O::Format, false.into());
        input.insert(O::FormatOptions, "--foption".into());
        let values = Mode::Copy.revalidate(&input, O::Format).unwrap();
        assert!(!values.contains_key(&O::FormatOptions));
    }

    #[test]
    fn test_revalidate_rejects_edited_option_with_unmet_requirement() {
        let mut input = copy_defaults();
        input.insert(O::FormatOptions, "--foption".into());
        let err = Mode::Copy.revalidate(&input, O::FormatOptions).unwrap_err();
        assert!(matches!(err, UhuError::UnmetRequirement { option, .. }
            if option == "format-options"));
    }

    #[test]
    fn test_target_type_choices_follow_mode() {
        let mut input = copy_defaults();
        input.insert(O::TargetType, "ubivolume".into());
        assert!(Mode::Copy.validate(&input).is_ok());

        let input = raw(&[
            (O::Filename, "image.bin"),
            (O::TargetType, "ubivolume"),
            (O::Target, "/dev/mmcblk0"),
        ]);
        let err = Mode::Raw.validate(&input).unwrap_err();
        assert!(matches!(err, UhuError::InvalidChoice { .. }));
    }

    #[test]
    fn test_option_not_in_mode() {
        let mut input = copy_defaults();
        input.insert(O::Skip, "1".into());
        assert!(matches!(
            Mode::Copy.validate(&input),
            Err(UhuError::OptionNotInMode { .. })
        ));
    }

    #[test]
    fn test_parse_options() {
        let mut input = BTreeMap::new();
        input.insert("filename".to_string(), OptionValue::from("a.bin"));
        input.insert("format?".to_string(), OptionValue::from("yes"));
        let parsed = Mode::Copy.parse_options(&input).unwrap();
        assert_eq!(parsed.len(), 2);

        input.insert("bogus".to_string(), OptionValue::from("x"));
        assert!(matches!(
            Mode::Copy.parse_options(&input),
            Err(UhuError::UnknownOption(_))
        ));
    }

    #[test]
    fn test_raw_defaults() {
        let input = raw(&[
            (O::Filename, "image.bin"),
            (O::TargetType, "device"),
            (O::Target, "/dev/mmcblk0"),
        ]);
        let values = Mode::Raw.validate(&input).unwrap();
        assert_eq!(values.get(&O::ChunkSize), Some(&OptionValue::Integer(131072)));
        assert_eq!(values.get(&O::Count), Some(&OptionValue::Integer(-1)));
        assert_eq!(values.get(&O::Truncate), Some(&OptionValue::Bool(false)));
    }

    #[test]
    fn test_version_diverges_requires_version() {
        let input = raw(&[
            (O::Filename, "uImage"),
            (O::TargetType, "device"),
            (O::Target, "/dev/mtd1"),
            (O::InstallCondition, "version-diverges"),
            (O::InstallConditionPatternType, "u-boot"),
        ]);
        let err = Mode::Flash.validate(&input).unwrap_err();
        assert!(
            matches!(err, UhuError::MissingRequiredOption { option } if option == "install-condition-version")
        );
    }

    #[test]
    fn test_zephyr_only_needs_filename() {
        let values = Mode::Zephyr.validate(&raw(&[(O::Filename, "zephyr.bin")])).unwrap();
        assert_eq!(values.len(), 1);
    }
}
