//! `${field}` placeholders resolved against a record.

use logpipe_record::Record;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\s*([^}\s]+)\s*\}").expect("valid regex"));

/// True when `value` holds at least one `${...}` placeholder.
pub fn contains_expression(value: &str) -> bool {
    PLACEHOLDER_RE.is_match(value)
}

/// Resolve every placeholder in `template` from `record`.
///
/// Field names win; `record_id`, `record_type` and `record_time` fall back
/// to the record metadata. Every unresolved name is reported at once.
pub fn evaluate(template: &str, record: &Record) -> Result<String, String> {
    let mut missing = Vec::new();
    let resolved = PLACEHOLDER_RE.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        match lookup(name, record) {
            Some(value) => value,
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(resolved.into_owned())
    } else {
        Err(format!("Missing field(s): {}", missing.join(", ")))
    }
}

fn lookup(name: &str, record: &Record) -> Option<String> {
    if let Some(value) = record.get(name) {
        return Some(value.to_display_string());
    }
    match name {
        "record_id" => Some(record.id().to_string()),
        "record_type" => Some(record.record_type().to_string()),
        "record_time" => Some(record.time().timestamp_millis().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_expression() {
        assert!(contains_expression("${a}"));
        assert!(contains_expression("prefix-${ a }-suffix"));
        assert!(!contains_expression("$a"));
        assert!(!contains_expression("plain"));
    }

    #[test]
    fn test_evaluate_fields_and_metadata() {
        let mut record = Record::new("access");
        record.set("user", "alice");
        record.set("status", 404i32);

        assert_eq!(
            evaluate("${user}:${ status }", &record).unwrap(),
            "alice:404"
        );
        assert_eq!(evaluate("${record_type}", &record).unwrap(), "access");
        assert_eq!(evaluate("no placeholders", &record).unwrap(), "no placeholders");
    }

    #[test]
    fn test_evaluate_reports_all_missing() {
        let record = Record::new("access");
        let err = evaluate("${a}-${b}", &record).unwrap_err();
        assert_eq!(err, "Missing field(s): a, b");
    }
}
