//! Output formatting for CLI results
//!
//! Three output formats are supported:
//! - Table: Human-readable tables (default)
//! - JSON: Structured JSON for scripting and automation
//! - Quiet: Minimal output, exit codes only

use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use uhu_core::{Mode, OptionName, OptionSpec, OptionValue, Package};

use crate::ExitCode;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for scripting
    Json,
    /// Minimal output - exit codes only
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// Standard JSON response wrapper for consistent schema
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    /// Whether the operation was successful
    pub success: bool,
    /// The response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit status (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// ISO 8601 timestamp
    pub timestamp: String,
    /// Command that was executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    /// Create a successful response with command context
    pub fn success(data: T, command: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            exit_code: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: Some(command.to_string()),
        }
    }
}

impl JsonResponse<()> {
    /// Create an error response carrying the exit status
    pub fn error(message: &str, code: ExitCode) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            exit_code: Some(code.into()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }
}

/// Formats output for different modes
pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Get the current output format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    /// Format package summary and object listing
    pub fn format_package(&self, package: &Package) -> String {
        match self.format {
            OutputFormat::Table => package_table(package),
            OutputFormat::Json => self.to_json_response(&package.template(), "package show"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format the mode registry
    pub fn format_modes(&self) -> String {
        match self.format {
            OutputFormat::Table => modes_table(),
            OutputFormat::Json => {
                let modes: Vec<ModeOutput> = Mode::ALL.into_iter().map(ModeOutput::from).collect();
                self.to_json_response(&modes, "modes")
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format a generic success result; tables print their own messages
    pub fn format_success<T: Serialize>(&self, data: &T, command: &str) -> String {
        match self.format {
            OutputFormat::Json => self.to_json_response(data, command),
            OutputFormat::Table | OutputFormat::Quiet => String::new(),
        }
    }

    /// Format error with exit code context
    pub fn format_error_with_code(&self, error: &str, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table if self.verbose => {
                format!("Error: {error}\n  {}: {}", code.name(), code.description())
            }
            OutputFormat::Table => format!("Error: {error}"),
            OutputFormat::Json => self.to_json(&JsonResponse::error(error, code)),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format progress message (only shown in verbose mode)
    pub fn progress(&self, message: &str) {
        if self.verbose && self.format == OutputFormat::Table {
            eprintln!("... {message}");
        }
    }

    /// Format success message
    pub fn success(&self, message: &str) {
        if self.format == OutputFormat::Table {
            println!("✓ {message}");
        }
    }

    /// Format warning message
    pub fn warning(&self, message: &str) {
        if self.format == OutputFormat::Table {
            eprintln!("⚠ {message}");
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    /// Format data with consistent JSON response wrapper
    fn to_json_response<T: Serialize>(&self, value: &T, command: &str) -> String {
        self.to_json(&JsonResponse::success(value, command))
    }
}

fn package_table(package: &Package) -> String {
    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL);
    summary.set_header(vec!["Property", "Value"]);
    summary.add_row(vec!["Product", package.product().unwrap_or("-")]);
    summary.add_row(vec!["Version", package.version().unwrap_or("-")]);
    let hardware = package.supported_hardware();
    let hardware = if hardware.is_empty() {
        "any".to_string()
    } else {
        hardware.iter().collect::<Vec<_>>().join(", ")
    };
    summary.add_row(vec!["Supported Hardware", &hardware]);
    summary.add_row(vec![
        "Installation Sets",
        &package.objects().set_count().to_string(),
    ]);

    if package.objects().is_empty() {
        return format!("{summary}\nNo objects.");
    }

    let mut objects = Table::new();
    objects.load_preset(UTF8_FULL);
    objects.set_header(vec!["Index", "Set", "Mode", "Filename", "Target", "Options"]);
    for (set, entries) in package.objects().iter_sets().enumerate() {
        for (index, object) in entries.iter().enumerate() {
            let target = object
                .option(OptionName::Target)
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string());
            let options = object
                .options()
                .iter()
                .filter(|(name, _)| {
                    !matches!(name, OptionName::Filename | OptionName::Target)
                })
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("\n");
            objects.add_row(vec![
                index.to_string(),
                set.to_string(),
                object.mode().to_string(),
                object.filename().to_string(),
                target,
                options,
            ]);
        }
    }
    format!("{summary}\n{objects}")
}

fn modes_table() -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Mode", "Target Types", "Options"]);
    for mode in Mode::ALL {
        let target_types = match mode.target_types() {
            [] => "-".to_string(),
            types => types.join(", "),
        };
        let options = mode
            .options()
            .filter(|spec| !spec.volatile)
            .map(|spec| option_label(&spec))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![mode.to_string(), target_types, options]);
    }
    table.to_string()
}

fn option_label(spec: &OptionSpec) -> String {
    let mut label = format!("{} ({})", spec.name, spec.kind.name());
    if spec.required {
        label.push_str(" required");
    }
    if let Some(default) = spec.default {
        label.push_str(&format!(" [default: {default}]"));
    }
    if !spec.symmetric {
        label.push_str(" per-set");
    }
    label
}

// JSON output structures

#[derive(Serialize)]
struct ModeOutput {
    name: &'static str,
    target_types: &'static [&'static str],
    options: Vec<OptionOutput>,
}

impl From<Mode> for ModeOutput {
    fn from(mode: Mode) -> Self {
        Self {
            name: mode.name(),
            target_types: mode.target_types(),
            options: mode.options().map(|spec| OptionOutput::from(&spec)).collect(),
        }
    }
}

#[derive(Serialize)]
struct OptionOutput {
    name: &'static str,
    label: &'static str,
    kind: &'static str,
    required: bool,
    per_set: bool,
    volatile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<OptionValue>,
    choices: &'static [&'static str],
}

impl From<&OptionSpec> for OptionOutput {
    fn from(spec: &OptionSpec) -> Self {
        Self {
            name: spec.name.as_str(),
            label: spec.verbose_name,
            kind: spec.kind.name(),
            required: spec.required,
            per_set: !spec.symmetric,
            volatile: spec.volatile,
            default: spec.default.map(|d| d.to_value()),
            choices: spec.choices,
        }
    }
}

/// Simple success message for JSON output
#[derive(Serialize)]
pub struct SuccessMessage {
    pub message: String,
}

impl SuccessMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str("table").unwrap(), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("quiet").unwrap(), OutputFormat::Quiet);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("yaml").is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Quiet.to_string(), "quiet");
    }

    #[test]
    fn test_json_response_error() {
        let response = JsonResponse::error("gone", ExitCode::NotFound);
        assert!(!response.success);
        assert_eq!(response.exit_code, Some(2));
        assert_eq!(response.error.as_deref(), Some("gone"));
    }

    #[test]
    fn test_verbose_table_error_names_exit_code() {
        let plain = OutputFormatter::new(OutputFormat::Table, false);
        assert_eq!(
            plain.format_error_with_code("gone", ExitCode::NotFound),
            "Error: gone"
        );

        let verbose = OutputFormatter::new(OutputFormat::Table, true);
        let message = verbose.format_error_with_code("gone", ExitCode::NotFound);
        assert!(message.starts_with("Error: gone\n"));
        assert!(message.contains("NOT_FOUND"));
        assert!(message.contains(ExitCode::NotFound.description()));
    }

    #[test]
    fn test_formatter_quiet_mode() {
        let formatter = OutputFormatter::new(OutputFormat::Quiet, false);
        assert!(formatter.is_quiet());
        assert_eq!(formatter.format_package(&Package::new()), "");
        assert_eq!(formatter.format_modes(), "");
    }

    #[test]
    fn test_package_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json, false);
        let mut package = Package::new();
        package.set_version("1.0");
        let output: serde_json::Value =
            serde_json::from_str(&formatter.format_package(&package)).unwrap();
        assert_eq!(output["success"], true);
        assert_eq!(output["command"], "package show");
        assert_eq!(output["data"]["version"], "1.0");
        assert_eq!(output["data"]["objects"], serde_json::json!([]));
    }

    #[test]
    fn test_modes_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json, false);
        let output: serde_json::Value = serde_json::from_str(&formatter.format_modes()).unwrap();
        let modes = output["data"].as_array().unwrap();
        assert_eq!(modes.len(), Mode::ALL.len());
        let copy = modes.iter().find(|m| m["name"] == "copy").unwrap();
        assert_eq!(
            copy["target_types"],
            serde_json::json!(["device", "ubivolume", "mtdname"])
        );
    }

    #[test]
    fn test_table_lists_modes() {
        let table = OutputFormatter::new(OutputFormat::Table, false).format_modes();
        for name in Mode::names() {
            assert!(table.contains(name));
        }
    }

    #[test]
    fn test_success_only_in_json() {
        let message = SuccessMessage::new("done");
        let table = OutputFormatter::new(OutputFormat::Table, false);
        assert_eq!(table.format_success(&message, "package new"), "");
        let json = OutputFormatter::new(OutputFormat::Json, false);
        assert!(json.format_success(&message, "package new").contains("\"done\""));
    }
}
