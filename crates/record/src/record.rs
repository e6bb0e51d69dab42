//! The record carried through every pipeline stage.

use crate::error::Result;
use crate::field::Field;
use crate::types::FieldType;
use crate::value::FieldValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Category of a record-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Raw input could not be parsed into fields
    Parsing,
    /// A field value could not be converted to the requested type
    TypeConversion,
    /// A property expression could not be resolved for this record
    Expression,
    /// An enrichment lookup failed
    Lookup,
    /// A stage signalled a failure specific to this record
    Processing,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parsing => "parsing",
            ErrorKind::TypeConversion => "type_conversion",
            ErrorKind::Expression => "expression",
            ErrorKind::Lookup => "lookup",
            ErrorKind::Processing => "processing",
        }
    }

    /// Inverse of [`ErrorKind::as_str`]; unknown names map to `Processing`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "parsing" => ErrorKind::Parsing,
            "type_conversion" => ErrorKind::TypeConversion,
            "expression" => ErrorKind::Expression,
            "lookup" => ErrorKind::Lookup,
            _ => ErrorKind::Processing,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem attached to a record instead of being raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDescriptor {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Typed unit of data flowing between pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    record_type: String,
    time: DateTime<Utc>,
    fields: HashMap<String, Field>,
    errors: Vec<ErrorDescriptor>,
}

impl Record {
    /// New record of the given type with a generated id and the current time.
    pub fn new(record_type: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), record_type)
    }

    /// New record with an explicit id.
    pub fn with_id(id: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            record_type: record_type.into(),
            time: Utc::now(),
            fields: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn set_type(&mut self, record_type: impl Into<String>) {
        self.record_type = record_type.into();
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn set_time(&mut self, time: DateTime<Utc>) {
        self.time = time;
    }

    /// Set a field with an explicit type, replacing any field of that name.
    ///
    /// Returns the replaced field, if any.
    pub fn set_field(
        &mut self,
        name: impl Into<String>,
        field_type: FieldType,
        value: FieldValue,
    ) -> Result<Option<Field>> {
        let field = Field::new(name, field_type, value)?;
        Ok(self.put(field))
    }

    /// Set a field whose type follows the shape of the native value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Option<Field> {
        self.put(Field::of(name, value))
    }

    /// Insert an already built field, replacing any field of that name.
    pub fn put(&mut self, field: Field) -> Option<Field> {
        self.fields.insert(field.name().to_string(), field)
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Shortcut for the value of a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).map(Field::value)
    }

    /// Value of a string field.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of fields.
    pub fn size(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn errors(&self) -> &[ErrorDescriptor] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Append an error; fields are left untouched.
    pub fn add_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.errors.push(ErrorDescriptor::new(kind, message));
    }

    pub fn push_error(&mut self, error: ErrorDescriptor) {
        self.errors.push(error);
    }

    /// Fields as a plain JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(name, field)| (name.clone(), field.value().to_json()))
                .collect(),
        )
    }
}
