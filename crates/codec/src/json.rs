//! Self-describing encoding: records as tagged JSON.
//!
//! ```json
//! {
//!   "id": "5f0c…", "type": "event", "time": "2024-01-01T00:00:00.000000001Z",
//!   "fields": { "count": { "type": "long", "value": 3 } },
//!   "errors": [ { "kind": "parsing", "message": "…" } ]
//! }
//! ```
//!
//! Bytes travel as base64 strings and non-finite floats as the strings
//! `"NaN"`, `"Infinity"` and `"-Infinity"`.

use crate::error::{CodecError, Result};
use crate::RecordSerializer;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use logpipe_record::{ErrorDescriptor, ErrorKind, Field, FieldType, FieldValue, Record};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Generic JSON serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl RecordSerializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, record: &Record) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&record_to_json(record))?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Record> {
        let json: Value = serde_json::from_slice(bytes)?;
        record_from_json(&json)
    }
}

/// Convert a record to its tagged JSON form.
pub fn record_to_json(record: &Record) -> Value {
    let fields: Map<String, Value> = record
        .fields()
        .map(|field| (field.name().to_string(), value_to_json(field.value())))
        .collect();

    let errors: Vec<Value> = record
        .errors()
        .iter()
        .map(|error| {
            serde_json::json!({
                "kind": error.kind.as_str(),
                "message": error.message,
            })
        })
        .collect();

    serde_json::json!({
        "id": record.id(),
        "type": record.record_type(),
        "time": record.time().to_rfc3339_opts(SecondsFormat::Nanos, true),
        "fields": fields,
        "errors": errors,
    })
}

/// Convert a value to its tagged JSON form.
pub fn value_to_json(value: &FieldValue) -> Value {
    let inner = match value {
        FieldValue::String(s) => Value::String(s.clone()),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::Long(i) => Value::from(*i),
        FieldValue::Float(f) => float_to_json(*f as f64),
        FieldValue::Double(f) => float_to_json(*f),
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::Bytes(b) => Value::String(base64::engine::general_purpose::STANDARD.encode(b)),
        FieldValue::Array(values) => Value::Array(values.iter().map(value_to_json).collect()),
        FieldValue::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        FieldValue::Record(record) => record_to_json(record),
    };

    serde_json::json!({
        "type": value.field_type().as_str(),
        "value": inner,
    })
}

fn float_to_json(f: f64) -> Value {
    if f.is_nan() {
        Value::String("NaN".to_string())
    } else if f == f64::INFINITY {
        Value::String("Infinity".to_string())
    } else if f == f64::NEG_INFINITY {
        Value::String("-Infinity".to_string())
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn invalid(field_type: FieldType, message: impl Into<String>) -> CodecError {
    CodecError::InvalidValue {
        field_type: field_type.as_str().to_string(),
        message: message.into(),
    }
}

/// Rebuild a record from its tagged JSON form.
pub fn record_from_json(json: &Value) -> Result<Record> {
    let object = json
        .as_object()
        .ok_or_else(|| invalid(FieldType::Record, "expected a JSON object"))?;

    let id = object
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| CodecError::MissingField("id".to_string()))?;
    let record_type = object.get("type").and_then(Value::as_str).unwrap_or_default();

    let mut record = Record::with_id(id, record_type);

    if let Some(time) = object.get("time").and_then(Value::as_str) {
        let parsed = DateTime::parse_from_rfc3339(time)
            .map_err(|e| invalid(FieldType::Record, format!("invalid time '{time}': {e}")))?;
        record.set_time(parsed.with_timezone(&Utc));
    }

    if let Some(fields) = object.get("fields").and_then(Value::as_object) {
        for (name, tagged) in fields {
            record.put(Field::of(name.clone(), value_from_json(tagged)?));
        }
    }

    if let Some(errors) = object.get("errors").and_then(Value::as_array) {
        for error in errors {
            let kind = error.get("kind").and_then(Value::as_str).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            record.push_error(ErrorDescriptor::new(ErrorKind::from_name(kind), message));
        }
    }

    Ok(record)
}

/// Rebuild a value from its tagged JSON form.
pub fn value_from_json(tagged: &Value) -> Result<FieldValue> {
    let type_name = tagged
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| CodecError::MissingField("type".to_string()))?;
    let field_type: FieldType = type_name.parse().map_err(|_| CodecError::InvalidValue {
        field_type: type_name.to_string(),
        message: "unknown type".to_string(),
    })?;
    let inner = tagged
        .get("value")
        .ok_or_else(|| CodecError::MissingField("value".to_string()))?;

    let value = match field_type {
        FieldType::String => FieldValue::String(
            inner
                .as_str()
                .ok_or_else(|| invalid(field_type, "expected a string"))?
                .to_string(),
        ),
        FieldType::Int => {
            let i = inner
                .as_i64()
                .ok_or_else(|| invalid(field_type, "expected an integer"))?;
            FieldValue::Int(
                i32::try_from(i).map_err(|_| invalid(field_type, format!("{i} out of range")))?,
            )
        }
        FieldType::Long => FieldValue::Long(
            inner
                .as_i64()
                .ok_or_else(|| invalid(field_type, "expected an integer"))?,
        ),
        FieldType::Float => FieldValue::Float(float_from_json(inner, field_type)? as f32),
        FieldType::Double => FieldValue::Double(float_from_json(inner, field_type)?),
        FieldType::Boolean => FieldValue::Boolean(
            inner
                .as_bool()
                .ok_or_else(|| invalid(field_type, "expected a boolean"))?,
        ),
        FieldType::Bytes => {
            let encoded = inner
                .as_str()
                .ok_or_else(|| invalid(field_type, "expected a base64 string"))?;
            FieldValue::Bytes(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| invalid(field_type, e.to_string()))?,
            )
        }
        FieldType::Array => FieldValue::Array(
            inner
                .as_array()
                .ok_or_else(|| invalid(field_type, "expected an array"))?
                .iter()
                .map(value_from_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        FieldType::Map => {
            let object = inner
                .as_object()
                .ok_or_else(|| invalid(field_type, "expected an object"))?;
            let mut map = HashMap::with_capacity(object.len());
            for (key, value) in object {
                map.insert(key.clone(), value_from_json(value)?);
            }
            FieldValue::Map(map)
        }
        FieldType::Record => FieldValue::Record(Box::new(record_from_json(inner)?)),
    };

    Ok(value)
}

fn float_from_json(inner: &Value, field_type: FieldType) -> Result<f64> {
    match inner {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| invalid(field_type, "expected a number")),
        Value::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => Err(invalid(field_type, format!("unexpected string '{other}'"))),
        },
        _ => Err(invalid(field_type, "expected a number")),
    }
}
