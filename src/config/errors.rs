//! Knob-file loading errors

use std::io;

use thiserror::Error;

use crate::errors::OptimizerError;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failure while reading or validating a knob file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read knob file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// File is not valid knob JSON
    #[error("invalid knob JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A knob holds a value outside its domain
    #[error("invalid value for knob '{knob}': {reason}")]
    InvalidValue { knob: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(knob: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            knob,
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for OptimizerError {
    fn from(err: ConfigError) -> Self {
        OptimizerError::configuration(err.to_string())
    }
}
