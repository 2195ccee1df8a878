//! CLI-specific error types
//!
//! Every CLI error ends the process with exit code 1

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::errors::OptimizerError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Knob file error
    ConfigError,
    /// Catalog file could not be read or parsed
    CatalogError,
    /// Bad command-line value
    ArgumentError,
    /// Metadata assembly failed
    OptimizerError,
    /// I/O error (files, stdout)
    IoError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "DOCPLAN_CLI_CONFIG_ERROR",
            Self::CatalogError => "DOCPLAN_CLI_CATALOG_ERROR",
            Self::ArgumentError => "DOCPLAN_CLI_ARGUMENT_ERROR",
            Self::OptimizerError => "DOCPLAN_CLI_OPTIMIZER_ERROR",
            Self::IoError => "DOCPLAN_CLI_IO_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn catalog_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::CatalogError, msg)
    }

    pub fn argument_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ArgumentError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::new(CliErrorCode::ConfigError, e.to_string())
    }
}

impl From<OptimizerError> for CliError {
    fn from(e: OptimizerError) -> Self {
        Self::new(CliErrorCode::OptimizerError, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
