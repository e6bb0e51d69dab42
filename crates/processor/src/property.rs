//! Property descriptors and resolved property values.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::duration::parse_duration;
use crate::error::ConfigurationError;
use crate::expression::contains_expression;
use crate::validators::{ValidationResult, Validator};

/// Describes one configuration knob of a component or of the engine.
///
/// Descriptors are checked at build time. Properties that support
/// expressions skip their validators when the configured value contains a
/// `${...}` placeholder; the resolved value is validated per record instead.
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: String,
    description: String,
    required: bool,
    default_value: Option<String>,
    allowable_values: Option<Vec<String>>,
    expression_support: bool,
    dynamic: bool,
    validators: Vec<Validator>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: false,
            default_value: None,
            allowable_values: None,
            expression_support: false,
            dynamic: false,
            validators: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Restrict the property to a closed set, compared case-insensitively.
    pub fn allowable_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowable_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn supports_expression(mut self) -> Self {
        self.expression_support = true;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_description(&self) -> &str {
        &self.description
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn get_default(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn get_allowable_values(&self) -> Option<&[String]> {
        self.allowable_values.as_deref()
    }

    pub fn is_expression_supported(&self) -> bool {
        self.expression_support
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Validate a raw value against this descriptor.
    pub fn validate(&self, input: &str) -> ValidationResult {
        if let Some(allowed) = &self.allowable_values {
            if !allowed.iter().any(|v| v.eq_ignore_ascii_case(input.trim())) {
                return ValidationResult::invalid(
                    &self.name,
                    Some(input),
                    format!("Given value not found in allowed set '{}'", allowed.join(", ")),
                );
            }
        }

        if self.expression_support && contains_expression(input) {
            return ValidationResult::valid(&self.name, input);
        }

        for validator in &self.validators {
            let result = validator(&self.name, input);
            if !result.valid {
                return result;
            }
        }
        ValidationResult::valid(&self.name, input)
    }

    /// Validate a value produced by expression evaluation.
    ///
    /// Unlike [`validate`](Self::validate) this never skips the validators.
    pub fn validate_resolved(&self, resolved: &str) -> ValidationResult {
        let mut literal = self.clone();
        literal.expression_support = false;
        literal.validate(resolved)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("default_value", &self.default_value)
            .field("allowable_values", &self.allowable_values)
            .field("expression_support", &self.expression_support)
            .field("dynamic", &self.dynamic)
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// Check a configuration map against a component's descriptors.
///
/// Returns every problem found plus the descriptors produced for dynamic
/// properties, so the caller can keep them for per-record re-validation.
pub fn validate_properties<F>(
    component: &str,
    descriptors: &[PropertyDescriptor],
    dynamic: F,
    properties: &HashMap<String, String>,
) -> (ConfigurationError, Vec<PropertyDescriptor>)
where
    F: Fn(&str) -> Option<PropertyDescriptor>,
{
    let mut problems = ConfigurationError::new();

    for descriptor in descriptors {
        match properties.get(descriptor.name()) {
            Some(value) => {
                let result = descriptor.validate(value);
                if !result.valid {
                    problems.push(component, descriptor.name(), result.explanation);
                }
            }
            None if descriptor.is_required() && descriptor.get_default().is_none() => {
                problems.push(component, descriptor.name(), "is required");
            }
            None => {}
        }
    }

    let mut extra: Vec<&String> = properties
        .keys()
        .filter(|name| !descriptors.iter().any(|d| d.name() == name.as_str()))
        .collect();
    extra.sort();

    let mut resolved = Vec::new();
    for name in extra {
        match dynamic(name) {
            Some(descriptor) => {
                let result = descriptor.validate(&properties[name]);
                if !result.valid {
                    problems.push(component, name.as_str(), result.explanation);
                }
                resolved.push(descriptor);
            }
            None => problems.push(component, name.as_str(), "is not a supported property"),
        }
    }

    (problems, resolved)
}

/// A property value as configured, or the descriptor default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyValue(Option<String>);

impl PropertyValue {
    pub fn new(value: Option<String>) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn as_string(&self) -> Option<String> {
        self.0.clone()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_str()
            .and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_str().and_then(|v| v.trim().parse().ok())
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_str().and_then(|v| v.trim().parse().ok())
    }

    pub fn as_duration(&self) -> Option<Duration> {
        self.as_str().and_then(|v| parse_duration(v).ok())
    }

    /// Comma separated entries, trimmed, empty entries dropped.
    pub fn as_list(&self) -> Vec<String> {
        self.as_str()
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
