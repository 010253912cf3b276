//! Error types for check dispatching

use std::fmt;

/// Diagnostic reported when a composite key does not parse
pub const INVALID_KEY_FORMAT: &str = "Invalid item key format.";

/// Message reported when a check fails without saying why
pub const UNKNOWN_ERROR: &str = "Unknown error.";

/// Result type alias for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur while dispatching a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The metric key is not in the registry
    UnsupportedMetric(String),

    /// The composite key could not be parsed, the check was never invoked
    InvalidKeyFormat,

    /// The check routine reported failure
    CheckFailed(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::UnsupportedMetric(key) => write!(f, "Unsupported metric {key}"),
            DispatchError::InvalidKeyFormat => f.write_str(INVALID_KEY_FORMAT),
            DispatchError::CheckFailed(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for DispatchError {}
