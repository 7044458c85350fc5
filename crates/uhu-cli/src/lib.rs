//! UHU CLI - build firmware update packages from the command line
//!
//! This crate provides a command-line interface for:
//! - Managing the package file (version, product, supported hardware)
//! - Adding, removing and editing objects across installation sets
//! - Generating the final package metadata
//! - Managing the persistent configuration store

pub mod cli;
pub mod config;
pub mod output;

#[cfg(test)]
mod proptests;

pub use cli::Cli;
pub use config::{CliOverrides, Settings};
pub use output::{JsonResponse, OutputFormat, OutputFormatter, SuccessMessage};

use uhu_core::{ErrorKind, UhuError};

/// Exit codes for CLI operations
///
/// Exit codes provide machine-readable status for scripting and automation:
/// - 0: Success - operation completed successfully
/// - 1: General error - unspecified error occurred
/// - 2: Not found - hardware, object or installation set does not exist
/// - 3: Validation failed - bad option value
/// - 4: Schema error - unknown mode or option
/// - 5: Integrity error - unreadable file or misaligned installation sets
/// - 6: Configuration error - missing or invalid configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Operation completed successfully (exit code 0)
    Success = 0,
    /// General error (exit code 1)
    GeneralError = 1,
    /// Referenced item does not exist (exit code 2)
    NotFound = 2,
    /// Option validation failed (exit code 3)
    ValidationFailed = 3,
    /// Unknown mode or option (exit code 4)
    SchemaError = 4,
    /// Unreadable object or misaligned sets (exit code 5)
    IntegrityError = 5,
    /// Configuration problem (exit code 6)
    ConfigurationError = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ErrorKind> for ExitCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => ExitCode::NotFound,
            ErrorKind::Validation => ExitCode::ValidationFailed,
            ErrorKind::Schema => ExitCode::SchemaError,
            ErrorKind::Integrity => ExitCode::IntegrityError,
            ErrorKind::Configuration => ExitCode::ConfigurationError,
            ErrorKind::Persistence => ExitCode::GeneralError,
        }
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    /// Classify a command failure. Errors not raised by the package core
    /// are general errors.
    pub fn for_error(error: &anyhow::Error) -> Self {
        if let Some(err) = error.downcast_ref::<UhuError>() {
            return err.kind().into();
        }
        if let Some(config::ConfigError::Store(err)) = error.downcast_ref::<config::ConfigError>() {
            return err.kind().into();
        }
        if error.downcast_ref::<config::ConfigError>().is_some() {
            return ExitCode::ConfigurationError;
        }
        ExitCode::GeneralError
    }

    /// Get the exit code name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::NotFound => "NOT_FOUND",
            ExitCode::ValidationFailed => "VALIDATION_FAILED",
            ExitCode::SchemaError => "SCHEMA_ERROR",
            ExitCode::IntegrityError => "INTEGRITY_ERROR",
            ExitCode::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    /// Get a human-readable description of the exit code
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::NotFound => "The referenced item does not exist",
            ExitCode::ValidationFailed => "An option value is missing or invalid",
            ExitCode::SchemaError => "Unknown mode or option",
            ExitCode::IntegrityError => "Object unreadable or installation sets misaligned",
            ExitCode::ConfigurationError => "Configuration is missing or invalid",
        }
    }
}
