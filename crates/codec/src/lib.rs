//! Record serializers for logpipe transports.
//!
//! Two encodings round-trip every field type exactly:
//!
//! - [`ProtoSerializer`] - compact protobuf wire encoding of the fixed
//!   record schema (see [`proto`] for the field numbers)
//! - [`JsonSerializer`] - self-describing JSON where every value carries
//!   its type tag
//!
//! [`BytesSerializer`] passes the raw payload through and is what the
//! `none` selector resolves to. Selection happens once per channel through
//! [`SerializerKind::from_config`]; unknown selector strings fall back to
//! JSON.

mod error;
pub mod json;
pub mod proto;
mod raw;

#[cfg(test)]
mod tests;

use logpipe_record::Record;
use std::fmt;
use std::sync::Arc;

pub use error::{CodecError, Result};
pub use json::JsonSerializer;
pub use proto::ProtoSerializer;
pub use raw::BytesSerializer;

/// Converts records to and from transport payloads.
///
/// Implementations are stateless and side-effect free.
pub trait RecordSerializer: Send + Sync {
    /// Selector name of this encoding.
    fn name(&self) -> &'static str;

    fn serialize(&self, record: &Record) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Record>;
}

/// Encoding chosen for an input, output or error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerKind {
    Json,
    Proto,
    /// Raw payloads; on an input channel records come from a parser stage.
    None,
}

impl SerializerKind {
    /// Selector values understood by [`SerializerKind::from_config`].
    pub const ALLOWABLE_VALUES: [&'static str; 3] = ["json", "proto", "none"];

    /// Resolve a configured selector, falling back to JSON when unknown.
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => SerializerKind::Json,
            "proto" | "protobuf" | "compact" => SerializerKind::Proto,
            "none" | "bytes" | "raw" => SerializerKind::None,
            other => {
                tracing::warn!("Unknown serializer '{other}', falling back to json");
                SerializerKind::Json
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SerializerKind::Json => "json",
            SerializerKind::Proto => "proto",
            SerializerKind::None => "none",
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, SerializerKind::None)
    }

    /// Instantiate the serializer for this kind.
    pub fn build(&self) -> Arc<dyn RecordSerializer> {
        match self {
            SerializerKind::Json => Arc::new(JsonSerializer),
            SerializerKind::Proto => Arc::new(ProtoSerializer),
            SerializerKind::None => Arc::new(BytesSerializer),
        }
    }
}

impl fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
