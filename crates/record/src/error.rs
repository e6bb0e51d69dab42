//! Error types for the record crate.

use crate::types::FieldType;
use thiserror::Error;

/// Errors raised while building or converting fields.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Field '{field}' declared as {expected} but value is {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: FieldType,
    },

    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("Cannot convert {value} to {target}")]
    Conversion { value: String, target: FieldType },

    #[error("Unknown conflict resolution policy: {0}")]
    UnknownConflictPolicy(String),
}

/// Result type alias for record operations.
pub type Result<T> = std::result::Result<T, RecordError>;
