//! Field type tags.

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type tag of a [`crate::Field`].
///
/// The tag is always derived from the stored value, so a field can never
/// claim one type while holding another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Bytes,
    Array,
    Map,
    Record,
}

impl FieldType {
    /// All field types, in declaration order.
    pub const ALL: [FieldType; 10] = [
        FieldType::String,
        FieldType::Int,
        FieldType::Long,
        FieldType::Float,
        FieldType::Double,
        FieldType::Boolean,
        FieldType::Bytes,
        FieldType::Array,
        FieldType::Map,
        FieldType::Record,
    ];

    /// Lowercase name used in configuration files and the JSON encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Boolean => "boolean",
            FieldType::Bytes => "bytes",
            FieldType::Array => "array",
            FieldType::Map => "map",
            FieldType::Record => "record",
        }
    }

    /// Whether values of this type hold other values.
    pub fn is_container(&self) -> bool {
        matches!(self, FieldType::Array | FieldType::Map | FieldType::Record)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for FieldType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "string" => Ok(FieldType::String),
            "int" | "integer" => Ok(FieldType::Int),
            "long" => Ok(FieldType::Long),
            "float" => Ok(FieldType::Float),
            "double" => Ok(FieldType::Double),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "bytes" => Ok(FieldType::Bytes),
            "array" => Ok(FieldType::Array),
            "map" => Ok(FieldType::Map),
            "record" => Ok(FieldType::Record),
            _ => Err(RecordError::UnknownFieldType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("LONG".parse::<FieldType>().unwrap(), FieldType::Long);
        assert_eq!(" Boolean ".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert_eq!("integer".parse::<FieldType>().unwrap(), FieldType::Int);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "decimal".parse::<FieldType>().unwrap_err();
        assert_eq!(err, RecordError::UnknownFieldType("decimal".to_string()));
    }

    #[test]
    fn test_display_and_as_str() {
        for ty in FieldType::ALL {
            assert_eq!(ty.as_str().parse::<FieldType>().unwrap(), ty);
            assert_eq!(ty.to_string(), ty.as_str().to_uppercase());
        }
    }
}
