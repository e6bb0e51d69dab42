//! Property validation results and the standard validators.

use logpipe_record::FieldType;
use std::sync::Arc;

use crate::duration::parse_duration;

/// Outcome of validating one property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Property name, or a description of what was checked
    pub subject: String,
    pub input: Option<String>,
    pub valid: bool,
    pub explanation: String,
}

impl ValidationResult {
    pub fn valid(subject: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            input: Some(input.into()),
            valid: true,
            explanation: String::new(),
        }
    }

    pub fn invalid(
        subject: impl Into<String>,
        input: Option<&str>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            input: input.map(str::to_string),
            valid: false,
            explanation: explanation.into(),
        }
    }
}

/// Checks a property value; arguments are the subject and the input.
pub type Validator = Arc<dyn Fn(&str, &str) -> ValidationResult + Send + Sync>;

fn check<F>(rule: F) -> Validator
where
    F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
{
    Arc::new(move |subject: &str, input: &str| match rule(input) {
        Ok(()) => ValidationResult::valid(subject, input),
        Err(explanation) => ValidationResult::invalid(subject, Some(input), explanation),
    })
}

/// Value must contain something other than whitespace.
pub fn non_empty() -> Validator {
    check(|input| {
        if input.trim().is_empty() {
            Err("must not be empty".to_string())
        } else {
            Ok(())
        }
    })
}

/// Value must be `true` or `false`.
pub fn boolean() -> Validator {
    check(|input| match input.trim().to_ascii_lowercase().as_str() {
        "true" | "false" => Ok(()),
        _ => Err(format!("'{input}' is not a valid boolean")),
    })
}

/// Value must be a signed 64-bit integer.
pub fn integer() -> Validator {
    check(|input| {
        input
            .trim()
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| format!("'{input}' is not a valid integer"))
    })
}

/// Value must be an integer greater than zero.
pub fn positive_integer() -> Validator {
    check(|input| match input.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(()),
        _ => Err(format!("'{input}' is not a positive integer")),
    })
}

/// Value must be an integer of zero or more.
pub fn non_negative_integer() -> Validator {
    check(|input| match input.trim().parse::<i64>() {
        Ok(n) if n >= 0 => Ok(()),
        _ => Err(format!("'{input}' is not a non-negative integer")),
    })
}

/// Value must be a time period such as `30s` or `5 min`.
pub fn time_period() -> Validator {
    check(|input| {
        parse_duration(input)
            .map(|_| ())
            .map_err(|e| format!("'{input}' is not a valid time period: {e}"))
    })
}

/// Value must name a field type.
pub fn field_type() -> Validator {
    check(|input| {
        input
            .parse::<FieldType>()
            .map(|_| ())
            .map_err(|_| format!("'{input}' is not a field type"))
    })
}

/// Value must be a path to an existing regular file.
pub fn file_exists() -> Validator {
    check(|input| {
        if std::path::Path::new(input.trim()).is_file() {
            Ok(())
        } else {
            Err(format!("file '{input}' does not exist"))
        }
    })
}

/// Value must be a valid regular expression.
pub fn regex() -> Validator {
    check(|input| {
        regex::Regex::new(input)
            .map(|_| ())
            .map_err(|e| format!("'{input}' is not a valid regular expression: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(validator: &Validator, input: &str) -> bool {
        validator("prop", input).valid
    }

    #[test]
    fn test_non_empty() {
        assert!(accepts(&non_empty(), "x"));
        assert!(!accepts(&non_empty(), "  "));
    }

    #[test]
    fn test_boolean() {
        assert!(accepts(&boolean(), "TRUE"));
        assert!(accepts(&boolean(), "false"));
        let result = boolean()("debug", "yes");
        assert!(!result.valid);
        assert_eq!(result.subject, "debug");
        assert_eq!(result.input.as_deref(), Some("yes"));
        assert!(result.explanation.contains("boolean"));
    }

    #[test]
    fn test_integers() {
        assert!(accepts(&integer(), "-3"));
        assert!(!accepts(&integer(), "3.5"));
        assert!(accepts(&positive_integer(), "1"));
        assert!(!accepts(&positive_integer(), "0"));
        assert!(accepts(&non_negative_integer(), "0"));
        assert!(!accepts(&non_negative_integer(), "-1"));
    }

    #[test]
    fn test_time_period() {
        assert!(accepts(&time_period(), "0 sec"));
        assert!(accepts(&time_period(), "250ms"));
        assert!(!accepts(&time_period(), "soon"));
    }

    #[test]
    fn test_field_type() {
        assert!(accepts(&field_type(), "long"));
        assert!(!accepts(&field_type(), "decimal"));
    }

    #[test]
    fn test_file_exists() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(accepts(&file_exists(), file.path().to_str().unwrap()));
        assert!(!accepts(&file_exists(), "/definitely/not/here.json"));
    }

    #[test]
    fn test_regex() {
        assert!(accepts(&regex(), "^a.*$"));
        assert!(!accepts(&regex(), "("));
    }
}
