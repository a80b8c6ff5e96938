//! Error types for PolicyGate operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error code carried by every [`FilterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// An operand resolved to a type the filter cannot work with
    ParameterValueTypeInvalid,
    /// The configuration asks for something the engine does not implement
    UnsupportedOperation,
    /// An external operand provider failed to produce its expression
    OperandResolutionFailed,
    /// The evaluation context was cancelled mid-resolution
    Cancelled,
}

impl ErrorCode {
    /// Stable string form of the code, identical to its serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ParameterValueTypeInvalid => "parameter_value_type_invalid",
            ErrorCode::UnsupportedOperation => "unsupported_operation",
            ErrorCode::OperandResolutionFailed => "operand_resolution_failed",
            ErrorCode::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single domain error produced while building or evaluating predicates.
///
/// Build-time and evaluation-time failures share this shape, so a caller
/// translating errors into responses never needs to know which phase failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Parameter value type invalid for '{parameter}' in {schema_key}: {reason}")]
    ParameterValueTypeInvalid {
        schema_key: String,
        parameter: String,
        reason: String,
    },

    #[error("Unsupported operation in {schema_key}: {operation}")]
    UnsupportedOperation { schema_key: String, operation: String },

    #[error("Operand resolution failed in {schema_key}: {reason}")]
    OperandResolutionFailed { schema_key: String, reason: String },

    #[error("Resolution cancelled in {schema_key}")]
    Cancelled { schema_key: String },
}

impl FilterError {
    pub fn type_invalid(
        schema_key: impl Into<String>,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        FilterError::ParameterValueTypeInvalid {
            schema_key: schema_key.into(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(schema_key: impl Into<String>, operation: impl Into<String>) -> Self {
        FilterError::UnsupportedOperation {
            schema_key: schema_key.into(),
            operation: operation.into(),
        }
    }

    pub fn operand_failed(schema_key: impl Into<String>, reason: impl Into<String>) -> Self {
        FilterError::OperandResolutionFailed {
            schema_key: schema_key.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            FilterError::ParameterValueTypeInvalid { .. } => ErrorCode::ParameterValueTypeInvalid,
            FilterError::UnsupportedOperation { .. } => ErrorCode::UnsupportedOperation,
            FilterError::OperandResolutionFailed { .. } => ErrorCode::OperandResolutionFailed,
            FilterError::Cancelled { .. } => ErrorCode::Cancelled,
        }
    }

    /// Human-readable detail. Same text as `Display`.
    pub fn detail(&self) -> String {
        self.to_string()
    }

    /// Schema reference key of the filter or operand that raised the error.
    pub fn schema_key(&self) -> &str {
        match self {
            FilterError::ParameterValueTypeInvalid { schema_key, .. }
            | FilterError::UnsupportedOperation { schema_key, .. }
            | FilterError::OperandResolutionFailed { schema_key, .. }
            | FilterError::Cancelled { schema_key } => schema_key,
        }
    }
}

/// Engine configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration could not be parsed: {reason}")]
    Malformed { reason: String },
}

/// Result type alias for filter construction and evaluation.
pub type FilterResult<T> = Result<T, FilterError>;

// =============================================================================
// TESTS
// =============================================================================
