//! Field values.

use crate::error::{RecordError, Result};
use crate::record::Record;
use crate::types::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value held by a [`crate::Field`].
///
/// Each variant maps to exactly one [`FieldType`]. Native Rust values
/// convert through `From`, which is how [`Record::set`] picks a field type
/// from the shape of the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// UTF-8 string
    String(String),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    Long(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// Boolean value
    Boolean(bool),

    /// Binary data
    Bytes(Vec<u8>),

    /// Ordered sequence of values
    Array(Vec<FieldValue>),

    /// String-keyed mapping
    Map(HashMap<String, FieldValue>),

    /// Nested record
    Record(Box<Record>),
}

impl FieldValue {
    /// The type tag matching this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::String(_) => FieldType::String,
            Self::Int(_) => FieldType::Int,
            Self::Long(_) => FieldType::Long,
            Self::Float(_) => FieldType::Float,
            Self::Double(_) => FieldType::Double,
            Self::Boolean(_) => FieldType::Boolean,
            Self::Bytes(_) => FieldType::Bytes,
            Self::Array(_) => FieldType::Array,
            Self::Map(_) => FieldType::Map,
            Self::Record(_) => FieldType::Record,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as an i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Long(i) => Some(*i),
            Self::Int(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get this value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            Self::Float(f) => Some(*f as f64),
            _ => None,
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get this value as a slice of values.
    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            Self::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Try to get this value as a map.
    pub fn as_map(&self) -> Option<&HashMap<String, FieldValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Try to get this value as a nested record.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Render the value as plain text.
    ///
    /// Scalars use their natural representation, bytes are decoded lossily
    /// and containers are rendered as compact JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Long(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Double(f) => f.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Self::Array(_) | Self::Map(_) | Self::Record(_) => self.to_json().to_string(),
        }
    }

    /// Convert into a plain JSON value, dropping type tags.
    ///
    /// Non-finite floating point values become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Long(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f as f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Double(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
            Self::Array(values) => {
                serde_json::Value::Array(values.iter().map(FieldValue::to_json).collect())
            }
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Record(record) => record.to_json(),
        }
    }

    /// Build a value from plain JSON.
    ///
    /// Integers that fit in 32 bits become `Int`, other integers `Long`,
    /// numbers with a fraction `Double`, objects `Map`. Returns `None` for
    /// `null`; null entries inside arrays and objects are skipped.
    pub fn from_json(json: &serde_json::Value) -> Option<FieldValue> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(match i32::try_from(i) {
                        Ok(small) => Self::Int(small),
                        Err(_) => Self::Long(i),
                    })
                } else {
                    n.as_f64().map(Self::Double)
                }
            }
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Array(values) => Some(Self::Array(
                values.iter().filter_map(FieldValue::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Some(Self::Map(
                map.iter()
                    .filter_map(|(k, v)| FieldValue::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    /// Convert this value to `target`.
    ///
    /// Numeric conversions refuse to lose information: a fractional double
    /// does not become an integer and an out-of-range long does not become
    /// an int. Strings are parsed after trimming.
    pub fn convert(&self, target: FieldType) -> Result<FieldValue> {
        if self.field_type() == target {
            return Ok(self.clone());
        }

        let converted = match target {
            FieldType::String => Some(Self::String(self.to_display_string())),
            FieldType::Int => self.integral().and_then(|i| i32::try_from(i).ok()).map(Self::Int),
            FieldType::Long => self.integral().map(Self::Long),
            FieldType::Float => match self {
                Self::String(s) => s.trim().parse::<f32>().ok().map(Self::Float),
                Self::Int(i) => Some(Self::Float(*i as f32)),
                Self::Long(i) => Some(Self::Float(*i as f32)),
                Self::Double(f) => Some(Self::Float(*f as f32)),
                _ => None,
            },
            FieldType::Double => match self {
                Self::String(s) => s.trim().parse::<f64>().ok().map(Self::Double),
                Self::Int(i) => Some(Self::Double(*i as f64)),
                Self::Long(i) => Some(Self::Double(*i as f64)),
                Self::Float(f) => Some(Self::Double(*f as f64)),
                _ => None,
            },
            FieldType::Boolean => match self {
                Self::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Some(Self::Boolean(true)),
                    "false" => Some(Self::Boolean(false)),
                    _ => None,
                },
                _ => None,
            },
            FieldType::Bytes => match self {
                Self::String(s) => Some(Self::Bytes(s.as_bytes().to_vec())),
                _ => None,
            },
            FieldType::Array | FieldType::Map | FieldType::Record => None,
        };

        converted.ok_or_else(|| RecordError::Conversion {
            value: self.to_display_string(),
            target,
        })
    }

    fn integral(&self) -> Option<i64> {
        match self {
            Self::String(s) => s.trim().parse::<i64>().ok(),
            Self::Int(i) => Some(*i as i64),
            Self::Long(i) => Some(*i),
            Self::Float(f) => whole_number(*f as f64),
            Self::Double(f) => whole_number(*f),
            _ => None,
        }
    }
}

fn whole_number(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(value: Vec<FieldValue>) -> Self {
        Self::Array(value)
    }
}

impl From<HashMap<String, FieldValue>> for FieldValue {
    fn from(value: HashMap<String, FieldValue>) -> Self {
        Self::Map(value)
    }
}

impl From<Record> for FieldValue {
    fn from(value: Record) -> Self {
        Self::Record(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_native_picks_type() {
        assert_eq!(FieldValue::from("a").field_type(), FieldType::String);
        assert_eq!(FieldValue::from(1i32).field_type(), FieldType::Int);
        assert_eq!(FieldValue::from(1i64).field_type(), FieldType::Long);
        assert_eq!(FieldValue::from(1.0f32).field_type(), FieldType::Float);
        assert_eq!(FieldValue::from(1.0f64).field_type(), FieldType::Double);
        assert_eq!(FieldValue::from(true).field_type(), FieldType::Boolean);
        assert_eq!(FieldValue::from(vec![1u8]).field_type(), FieldType::Bytes);
        assert_eq!(
            FieldValue::from(vec![FieldValue::Int(1)]).field_type(),
            FieldType::Array
        );
        assert_eq!(
            FieldValue::from(HashMap::<String, FieldValue>::new()).field_type(),
            FieldType::Map
        );
        assert_eq!(
            FieldValue::from(Record::new("nested")).field_type(),
            FieldType::Record
        );
    }

    #[test]
    fn test_convert_string_to_numbers() {
        let v = FieldValue::from(" 42 ");
        assert_eq!(v.convert(FieldType::Int).unwrap(), FieldValue::Int(42));
        assert_eq!(v.convert(FieldType::Long).unwrap(), FieldValue::Long(42));
        assert_eq!(v.convert(FieldType::Double).unwrap(), FieldValue::Double(42.0));
    }

    #[test]
    fn test_convert_refuses_lossy_integer() {
        assert!(FieldValue::Double(1.5).convert(FieldType::Long).is_err());
        assert!(FieldValue::Long(i64::MAX).convert(FieldType::Int).is_err());
        assert_eq!(
            FieldValue::Double(3.0).convert(FieldType::Int).unwrap(),
            FieldValue::Int(3)
        );
    }

    #[test]
    fn test_convert_boolean() {
        assert_eq!(
            FieldValue::from("TRUE").convert(FieldType::Boolean).unwrap(),
            FieldValue::Boolean(true)
        );
        let err = FieldValue::from("yes").convert(FieldType::Boolean).unwrap_err();
        assert_eq!(
            err,
            RecordError::Conversion {
                value: "yes".to_string(),
                target: FieldType::Boolean
            }
        );
    }

    #[test]
    fn test_from_json_integer_widths() {
        let json = serde_json::json!({"small": 7, "big": 5_000_000_000i64, "ratio": 0.25, "none": null});
        let value = FieldValue::from_json(&json).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("small"), Some(&FieldValue::Int(7)));
        assert_eq!(map.get("big"), Some(&FieldValue::Long(5_000_000_000)));
        assert_eq!(map.get("ratio"), Some(&FieldValue::Double(0.25)));
        assert!(!map.contains_key("none"));
    }

    #[test]
    fn test_display_string_of_containers_is_json() {
        let value = FieldValue::Array(vec![FieldValue::Int(1), FieldValue::from("x")]);
        assert_eq!(value.to_display_string(), r#"[1,"x"]"#);
    }
}
