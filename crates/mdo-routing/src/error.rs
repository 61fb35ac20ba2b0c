//! Error types for MDO routing

use std::fmt;

use thiserror::Error;

/// MDO routing error types
#[derive(Error, Debug)]
pub enum MdoError {
    /// Malformed loudspeaker configuration file or payload
    #[error("Config parse error: {0}")]
    ConfigParse(String),

    /// JSON decode failure
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown control command or malformed argument list
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Object list is not a sequence
    #[error("Invalid object list: {0}")]
    InvalidObjectList(String),
}

/// Result type for MDO operations
pub type MdoResult<T> = Result<T, MdoError>;

/// A field that failed coercion and was replaced by its default.
///
/// Warnings never abort processing; they are logged and handed back to the
/// caller so a host can surface them.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWarning {
    /// What the field belongs to, e.g. `loudspeaker 5` or `object 12`
    pub target: String,
    /// Field name as it appeared in the payload
    pub field: String,
    /// Offending value, rendered as JSON
    pub value: String,
    /// What was expected instead
    pub expected: &'static str,
}

impl FieldWarning {
    pub fn new(
        target: impl Into<String>,
        field: impl Into<String>,
        value: &serde_json::Value,
        expected: &'static str,
    ) -> Self {
        Self {
            target: target.into(),
            field: field.into(),
            value: value.to_string(),
            expected,
        }
    }

    /// Log this warning through the `log` facade
    pub fn report(&self) {
        log::warn!("{}", self);
    }
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: field '{}' = {} is not a valid {}, using default",
            self.target, self.field, self.value, self.expected
        )
    }
}
