//! Named, typed fields.

use crate::error::{RecordError, Result};
use crate::types::FieldType;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};

/// A named value inside a [`crate::Record`].
///
/// Fields are immutable once built; replacing a value means setting a new
/// field under the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    value: FieldValue,
}

impl Field {
    /// Build a field, checking that `value` has exactly `field_type`.
    ///
    /// Numbers are not widened: use [`FieldValue::convert`] first.
    pub fn new(name: impl Into<String>, field_type: FieldType, value: FieldValue) -> Result<Self> {
        let name = name.into();
        if value.field_type() != field_type {
            return Err(RecordError::TypeMismatch {
                field: name,
                expected: field_type,
                actual: value.field_type(),
            });
        }

        Ok(Self { name, value })
    }

    /// Build a field whose type is taken from the value.
    pub fn of(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.value.field_type()
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn into_value(self) -> FieldValue {
        self.value
    }

    /// Copy of this field under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: self.value.clone(),
        }
    }
}
