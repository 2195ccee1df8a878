//! Optimizer error types
//!
//! Error codes:
//! - DOCPLAN_UNSUPPORTED_FEATURE (REJECT)
//! - DOCPLAN_BAD_VALUE (REJECT)
//! - DOCPLAN_CONFIGURATION_ERROR (FATAL)
//! - DOCPLAN_INTERNAL_INVARIANT (DEFECT)
//! - DOCPLAN_OPTIMIZER_DISABLED (REJECT)
//!
//! "No plan found" is not an error: the entry point reports it as `Ok(None)`.

use std::fmt;

/// Error class, used by the entry point to decide between fallback and surfacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Per-query rejection; an alternate planner may take over
    Reject,
    /// Deployment or configuration bug
    Fatal,
    /// Broken internal invariant
    Defect,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Reject => write!(f, "REJECT"),
            ErrorClass::Fatal => write!(f, "FATAL"),
            ErrorClass::Defect => write!(f, "DEFECT"),
        }
    }
}

/// Optimizer error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerErrorCode {
    /// Index type/option, query option or collection option not modeled
    UnsupportedFeature,
    /// Malformed user-supplied value (e.g. `$natural: 2`)
    BadValue,
    /// Unknown estimator mode, missing histogram source, invalid knob
    ConfigurationError,
    /// Defect detected while building metadata or lowering
    InternalInvariantViolation,
    /// Forced failure through the test hook
    DisabledByFailPoint,
}

impl OptimizerErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            OptimizerErrorCode::UnsupportedFeature => "DOCPLAN_UNSUPPORTED_FEATURE",
            OptimizerErrorCode::BadValue => "DOCPLAN_BAD_VALUE",
            OptimizerErrorCode::ConfigurationError => "DOCPLAN_CONFIGURATION_ERROR",
            OptimizerErrorCode::InternalInvariantViolation => "DOCPLAN_INTERNAL_INVARIANT",
            OptimizerErrorCode::DisabledByFailPoint => "DOCPLAN_OPTIMIZER_DISABLED",
        }
    }

    /// Returns the error class for this code
    pub fn class(&self) -> ErrorClass {
        match self {
            OptimizerErrorCode::UnsupportedFeature
            | OptimizerErrorCode::BadValue
            | OptimizerErrorCode::DisabledByFailPoint => ErrorClass::Reject,
            OptimizerErrorCode::ConfigurationError => ErrorClass::Fatal,
            OptimizerErrorCode::InternalInvariantViolation => ErrorClass::Defect,
        }
    }

    /// Whether the caller may retry the query on an alternate planning path
    pub fn falls_back(&self) -> bool {
        matches!(
            self,
            OptimizerErrorCode::UnsupportedFeature
                | OptimizerErrorCode::InternalInvariantViolation
                | OptimizerErrorCode::DisabledByFailPoint
        )
    }
}

impl fmt::Display for OptimizerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Optimizer error with diagnostic context
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerError {
    code: OptimizerErrorCode,
    message: String,
    context: Option<String>,
}

impl OptimizerError {
    /// Create an error with an explicit code
    pub fn new(code: OptimizerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Create an unsupported feature error
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::new(OptimizerErrorCode::UnsupportedFeature, what)
    }

    /// Create a bad value error
    pub fn bad_value(reason: impl Into<String>) -> Self {
        Self::new(OptimizerErrorCode::BadValue, reason)
    }

    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::new(OptimizerErrorCode::ConfigurationError, reason)
    }

    /// Create an internal invariant violation
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(OptimizerErrorCode::InternalInvariantViolation, reason)
    }

    /// Create the fail-point error
    pub fn disabled() -> Self {
        Self::new(
            OptimizerErrorCode::DisabledByFailPoint,
            "attempting to use the optimizer while it is disabled",
        )
    }

    /// Attach diagnostic context (collection, index name, node id, ...)
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> OptimizerErrorCode {
        self.code
    }

    /// Returns the error class
    pub fn class(&self) -> ErrorClass {
        self.code.class()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the diagnostic context if any
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Whether the caller may fall back to an alternate planner
    pub fn falls_back(&self) -> bool {
        self.code.falls_back()
    }
}

impl fmt::Display for OptimizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.class(), self.code.code(), self.message)?;
        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for OptimizerError {}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;
