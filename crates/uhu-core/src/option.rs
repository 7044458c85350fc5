//! Object option schema and value validation.
//!
//! Every configurable field of an object is declared once in a static table.
//! Modes pick the subset they support (see [`crate::mode`]). Validation is a
//! pure function of the option, the proposed value, and the values already
//! validated for the same object.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UhuError;

/// Validated option values of one object, in declaration order.
pub type OptionValues = BTreeMap<OptionName, OptionValue>;

/// Every option known to the package format.
///
/// Variants are declared so that an option's requirement always refers to
/// an earlier variant; the derived `Ord` is the validation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionName {
    Filename,
    TargetType,
    Target,
    TargetPath,
    Filesystem,
    Format,
    FormatOptions,
    MountOptions,
    ChunkSize,
    Skip,
    Seek,
    Count,
    Truncate,
    Padding1k,
    SearchExponent,
    Chip0DevicePath,
    Chip1DevicePath,
    Compressed,
    RequiredUncompressedSize,
    InstallCondition,
    InstallConditionPatternType,
    InstallConditionPattern,
    InstallConditionSeek,
    InstallConditionBufferSize,
    InstallConditionVersion,
}

impl OptionName {
    pub const ALL: [OptionName; 25] = [
        OptionName::Filename,
        OptionName::TargetType,
        OptionName::Target,
        OptionName::TargetPath,
        OptionName::Filesystem,
        OptionName::Format,
        OptionName::FormatOptions,
        OptionName::MountOptions,
        OptionName::ChunkSize,
        OptionName::Skip,
        OptionName::Seek,
        OptionName::Count,
        OptionName::Truncate,
        OptionName::Padding1k,
        OptionName::SearchExponent,
        OptionName::Chip0DevicePath,
        OptionName::Chip1DevicePath,
        OptionName::Compressed,
        OptionName::RequiredUncompressedSize,
        OptionName::InstallCondition,
        OptionName::InstallConditionPatternType,
        OptionName::InstallConditionPattern,
        OptionName::InstallConditionSeek,
        OptionName::InstallConditionBufferSize,
        OptionName::InstallConditionVersion,
    ];

    /// Name used in templates and on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            OptionName::Filename => "filename",
            OptionName::TargetType => "target-type",
            OptionName::Target => "target",
            OptionName::TargetPath => "target-path",
            OptionName::Filesystem => "filesystem",
            OptionName::Format => "format?",
            OptionName::FormatOptions => "format-options",
            OptionName::MountOptions => "mount-options",
            OptionName::ChunkSize => "chunk-size",
            OptionName::Skip => "skip",
            OptionName::Seek => "seek",
            OptionName::Count => "count",
            OptionName::Truncate => "truncate?",
            OptionName::Padding1k => "1k_padding",
            OptionName::SearchExponent => "search-exponent",
            OptionName::Chip0DevicePath => "chip-0-device-path",
            OptionName::Chip1DevicePath => "chip-1-device-path",
            OptionName::Compressed => "compressed",
            OptionName::RequiredUncompressedSize => "required-uncompressed-size",
            OptionName::InstallCondition => "install-condition",
            OptionName::InstallConditionPatternType => "install-condition-pattern-type",
            OptionName::InstallConditionPattern => "install-condition-pattern",
            OptionName::InstallConditionSeek => "install-condition-seek",
            OptionName::InstallConditionBufferSize => "install-condition-buffer-size",
            OptionName::InstallConditionVersion => "install-condition-version",
        }
    }

    /// Schema entry for this option.
    pub fn spec(self) -> &'static OptionSpec {
        &OPTIONS[self as usize]
    }
}

impl FromStr for OptionName {
    type Err = UhuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OptionName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UhuError::UnknownOption(s.to_string()))
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete option value as stored in templates and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl OptionValue {
    /// Blank text counts as "no value".
    pub fn is_empty(&self) -> bool {
        matches!(self, OptionValue::Text(s) if s.trim().is_empty())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Integer(n) => write!(f, "{n}"),
            OptionValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Text(s)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> Self {
        OptionValue::Integer(n)
    }
}

/// Value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Text,
    Boolean,
    Integer,
}

impl OptionKind {
    pub fn name(self) -> &'static str {
        match self {
            OptionKind::Text => "text",
            OptionKind::Boolean => "boolean",
            OptionKind::Integer => "integer",
        }
    }
}

/// Compile-time value used for defaults and requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticValue {
    Bool(bool),
    Integer(i64),
    Text(&'static str),
}

impl StaticValue {
    pub fn to_value(self) -> OptionValue {
        match self {
            StaticValue::Bool(b) => OptionValue::Bool(b),
            StaticValue::Integer(n) => OptionValue::Integer(n),
            StaticValue::Text(s) => OptionValue::Text(s.to_string()),
        }
    }

    pub fn matches(self, value: &OptionValue) -> bool {
        match (self, value) {
            (StaticValue::Bool(a), OptionValue::Bool(b)) => a == *b,
            (StaticValue::Integer(a), OptionValue::Integer(b)) => a == *b,
            (StaticValue::Text(a), OptionValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for StaticValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_value(), f)
    }
}

/// "Only valid when `option` holds one of `values`."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub option: OptionName,
    pub values: &'static [StaticValue],
}

impl Requirement {
    pub fn is_met(&self, context: &OptionValues) -> bool {
        context
            .get(&self.option)
            .is_some_and(|value| self.values.iter().any(|v| v.matches(value)))
    }
}

/// Schema of a single option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: OptionName,
    pub kind: OptionKind,
    pub default: Option<StaticValue>,
    pub required: bool,
    /// Derived or internal; never prompted for.
    pub volatile: bool,
    /// One value shared by every installation set.
    pub symmetric: bool,
    pub choices: &'static [&'static str],
    /// Key in the metadata record; `None` when the option is folded into
    /// another metadata entry.
    pub metadata_key: Option<&'static str>,
    pub requirement: Option<Requirement>,
    /// Human readable label, used by prompts and listings.
    pub verbose_name: &'static str,
}

impl OptionSpec {
    const fn new(name: OptionName, kind: OptionKind, verbose_name: &'static str) -> Self {
        Self {
            name,
            kind,
            default: None,
            required: false,
            volatile: false,
            symmetric: true,
            choices: &[],
            metadata_key: Some(name.as_str()),
            requirement: None,
            verbose_name,
        }
    }

    const fn text(name: OptionName, verbose_name: &'static str) -> Self {
        Self::new(name, OptionKind::Text, verbose_name)
    }

    const fn boolean(name: OptionName, verbose_name: &'static str) -> Self {
        Self::new(name, OptionKind::Boolean, verbose_name)
    }

    const fn integer(name: OptionName, verbose_name: &'static str) -> Self {
        Self::new(name, OptionKind::Integer, verbose_name)
    }

    const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    const fn volatile(self) -> Self {
        Self {
            volatile: true,
            ..self
        }
    }

    const fn per_set(self) -> Self {
        Self {
            symmetric: false,
            ..self
        }
    }

    const fn default(self, value: StaticValue) -> Self {
        Self {
            default: Some(value),
            ..self
        }
    }

    const fn choices(self, choices: &'static [&'static str]) -> Self {
        Self { choices, ..self }
    }

    const fn requires(self, option: OptionName, values: &'static [StaticValue]) -> Self {
        Self {
            requirement: Some(Requirement { option, values }),
            ..self
        }
    }

    const fn folded(self) -> Self {
        Self {
            metadata_key: None,
            ..self
        }
    }

    /// Whether the option applies given the values validated so far.
    pub fn requirement_met(&self, context: &OptionValues) -> bool {
        self.requirement.map_or(true, |req| req.is_met(context))
    }

    /// Validate a proposed value.
    ///
    /// Returns `Ok(None)` when the option is absent from the final value
    /// set: either its requirement is unmet, or it is optional with no
    /// value and no default.
    ///
    /// # Errors
    ///
    /// - [`UhuError::UnmetRequirement`] if a value is supplied for an
    ///   option whose requirement is unmet
    /// - [`UhuError::InvalidOptionValue`] if the value cannot be coerced
    /// - [`UhuError::InvalidChoice`] if the value is not an allowed choice
    /// - [`UhuError::MissingRequiredOption`] if a required option ends up
    ///   without a value
    pub fn validate(
        &self,
        proposed: Option<&OptionValue>,
        context: &OptionValues,
    ) -> Result<Option<OptionValue>, UhuError> {
        let proposed = proposed.filter(|v| !v.is_empty());

        if let Some(req) = self.requirement {
            if !req.is_met(context) {
                return match proposed {
                    Some(_) => Err(UhuError::UnmetRequirement {
                        option: self.name.to_string(),
                        requires: req.option.to_string(),
                        expected: req.values.iter().map(|v| v.to_string()).collect(),
                    }),
                    None => Ok(None),
                };
            }
        }

        let value = match proposed {
            Some(value) => {
                let value = self.coerce(value)?;
                self.check_choice(&value)?;
                Some(value)
            }
            None => self.default.map(StaticValue::to_value),
        };

        if value.is_none() && self.required {
            return Err(UhuError::MissingRequiredOption {
                option: self.name.to_string(),
            });
        }
        Ok(value)
    }

    fn coerce(&self, value: &OptionValue) -> Result<OptionValue, UhuError> {
        let invalid = |reason: &str| UhuError::InvalidOptionValue {
            option: self.name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match (self.kind, value) {
            (OptionKind::Boolean, OptionValue::Bool(b)) => Ok(OptionValue::Bool(*b)),
            (OptionKind::Boolean, OptionValue::Text(s)) => parse_bool(s)
                .map(OptionValue::Bool)
                .ok_or_else(|| invalid("expected yes or no")),
            (OptionKind::Integer, OptionValue::Integer(n)) => Ok(OptionValue::Integer(*n)),
            (OptionKind::Integer, OptionValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(OptionValue::Integer)
                .map_err(|_| invalid("expected an integer")),
            (OptionKind::Text, OptionValue::Text(s)) => Ok(OptionValue::Text(s.trim().to_string())),
            (OptionKind::Text, OptionValue::Integer(n)) => Ok(OptionValue::Text(n.to_string())),
            (OptionKind::Boolean, _) => Err(invalid("expected yes or no")),
            (OptionKind::Integer, _) => Err(invalid("expected an integer")),
            (OptionKind::Text, _) => Err(invalid("expected text")),
        }
    }

    fn check_choice(&self, value: &OptionValue) -> Result<(), UhuError> {
        if self.choices.is_empty() {
            return Ok(());
        }
        let text = value.to_string();
        if self.choices.contains(&text.as_str()) {
            return Ok(());
        }
        Err(UhuError::InvalidChoice {
            option: self.name.to_string(),
            value: text,
            choices: self.choices.iter().map(|c| c.to_string()).collect(),
        })
    }
}

/// Case-insensitive yes/no parsing.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => Some(true),
        "n" | "no" | "false" => Some(false),
        _ => None,
    }
}

const FILESYSTEMS: &[&str] = &[
    "btrfs", "ext2", "ext3", "ext4", "f2fs", "jffs2", "ubifs", "vfat", "xfs",
];

const TRUE: &[StaticValue] = &[StaticValue::Bool(true)];
const VERSION_DIVERGES: &[StaticValue] = &[StaticValue::Text("version-diverges")];
const REGEXP: &[StaticValue] = &[StaticValue::Text("regexp")];

// Indexed by `OptionName as usize`.
static OPTIONS: [OptionSpec; 25] = [
    OptionSpec::text(OptionName::Filename, "filename").required(),
    OptionSpec::text(OptionName::TargetType, "target type").required(),
    OptionSpec::text(OptionName::Target, "target").required().per_set(),
    OptionSpec::text(OptionName::TargetPath, "target path").required(),
    OptionSpec::text(OptionName::Filesystem, "filesystem")
        .required()
        .choices(FILESYSTEMS),
    OptionSpec::boolean(OptionName::Format, "format device").default(StaticValue::Bool(false)),
    OptionSpec::text(OptionName::FormatOptions, "format options")
        .requires(OptionName::Format, TRUE),
    OptionSpec::text(OptionName::MountOptions, "mount options")
        .requires(OptionName::Format, TRUE),
    OptionSpec::integer(OptionName::ChunkSize, "chunk size").default(StaticValue::Integer(131072)),
    OptionSpec::integer(OptionName::Skip, "skip").default(StaticValue::Integer(0)),
    OptionSpec::integer(OptionName::Seek, "seek").default(StaticValue::Integer(0)),
    OptionSpec::integer(OptionName::Count, "count").default(StaticValue::Integer(-1)),
    OptionSpec::boolean(OptionName::Truncate, "truncate").default(StaticValue::Bool(false)),
    OptionSpec::boolean(OptionName::Padding1k, "1k padding").default(StaticValue::Bool(false)),
    OptionSpec::integer(OptionName::SearchExponent, "search exponent")
        .default(StaticValue::Integer(1)),
    OptionSpec::text(OptionName::Chip0DevicePath, "chip 0 device path")
        .required()
        .per_set(),
    OptionSpec::text(OptionName::Chip1DevicePath, "chip 1 device path")
        .required()
        .per_set(),
    OptionSpec::boolean(OptionName::Compressed, "compressed"),
    OptionSpec::integer(OptionName::RequiredUncompressedSize, "required uncompressed size")
        .volatile()
        .requires(OptionName::Compressed, TRUE),
    OptionSpec::text(OptionName::InstallCondition, "install condition")
        .default(StaticValue::Text("always"))
        .choices(&["always", "content-diverges", "version-diverges"])
        .folded(),
    OptionSpec::text(OptionName::InstallConditionPatternType, "version pattern type")
        .required()
        .choices(&["linux-kernel", "u-boot", "regexp"])
        .requires(OptionName::InstallCondition, VERSION_DIVERGES)
        .folded(),
    OptionSpec::text(OptionName::InstallConditionPattern, "version regular expression")
        .required()
        .requires(OptionName::InstallConditionPatternType, REGEXP)
        .folded(),
    OptionSpec::integer(OptionName::InstallConditionSeek, "version pattern seek")
        .default(StaticValue::Integer(0))
        .requires(OptionName::InstallConditionPatternType, REGEXP)
        .folded(),
    OptionSpec::integer(OptionName::InstallConditionBufferSize, "version pattern buffer size")
        .default(StaticValue::Integer(1024))
        .requires(OptionName::InstallConditionPatternType, REGEXP)
        .folded(),
    OptionSpec::text(OptionName::InstallConditionVersion, "installed version")
        .required()
        .requires(OptionName::InstallCondition, VERSION_DIVERGES)
        .folded(),
];
