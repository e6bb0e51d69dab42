//! Error types for the codec crate.

use thiserror::Error;

/// Errors that can occur while encoding or decoding records.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Protobuf encoding error: {0}")]
    ProtobufEncode(String),

    #[error("Protobuf decoding error: {0}")]
    ProtobufDecode(String),

    #[error("Nesting deeper than {limit} levels")]
    TooDeep { limit: u32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp: seconds={seconds}, nanos={nanos}")]
    InvalidTimestamp { seconds: i64, nanos: u32 },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for type '{field_type}': {message}")]
    InvalidValue { field_type: String, message: String },
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
