use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logpipe_record::dictionary::{RECORD_KEY, RECORD_VALUE};
use logpipe_record::{ErrorKind, FieldValue, Record};
use serde_json::{Map, Value};
use tracing::debug;

use crate::component::{ConfigurableComponent, Parser};
use crate::context::ProcessContext;
use crate::property::PropertyDescriptor;
use crate::validators;

use super::raw_line::payload_value;

pub const RECORD_TYPE: &str = "record.type";
pub const UNWRAP_EVENT_TYPE: &str = "unwrap.event.type";
pub const REPLACE_DOTS: &str = "replace.dots";
pub const TIME_FIELD: &str = "time.field";
pub const NORMALIZE_BRO: &str = "normalize.bro.fields";
pub const DEBUG: &str = "debug";

const FIELD_TS: &str = "ts";
const FIELD_VERSION: &str = "version";

/// Parses a JSON object into typed record fields.
///
/// With `unwrap.event.type`, an object holding a single object-valued key
/// (`{"dns": {...}}`) becomes a record of type `dns` with the inner fields.
/// With `replace.dots`, dots in field names become underscores at every
/// depth, including objects nested in arrays. `normalize.bro.fields` turns a
/// fractional `ts` in seconds into epoch millis and stores `version` as a
/// string. With `debug`, the whole normalized event is kept as a map in
/// `record_value`. A payload that is not a JSON object yields a record
/// carrying the raw text in `record_value` and a parsing error.
#[derive(Debug, Default)]
pub struct JsonEventParser;

impl JsonEventParser {
    fn event_time(value: &FieldValue) -> Option<DateTime<Utc>> {
        match value {
            FieldValue::Int(ms) => DateTime::from_timestamp_millis(i64::from(*ms)),
            FieldValue::Long(ms) => DateTime::from_timestamp_millis(*ms),
            FieldValue::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }

    fn unwrap_event(object: Map<String, Value>) -> (Option<String>, Map<String, Value>) {
        if object.len() != 1 || !object.values().all(Value::is_object) {
            return (None, object);
        }
        let mut object = object;
        let name = object.keys().next().cloned().unwrap_or_default();
        match object.remove(&name) {
            Some(Value::Object(inner)) => (Some(name), inner),
            _ => (None, object),
        }
    }

    /// Field value after Bro normalization of `ts` and `version`.
    fn normalize_bro(name: &str, json: &Value) -> Option<FieldValue> {
        match (name, json) {
            (FIELD_TS, Value::Number(n)) if n.is_f64() => {
                n.as_f64().map(|seconds| FieldValue::Long((seconds * 1000.0) as i64))
            }
            (FIELD_VERSION, Value::Number(n)) => Some(FieldValue::String(n.to_string())),
            _ => None,
        }
    }
}

fn replace_dots(object: Map<String, Value>) -> Map<String, Value> {
    object
        .into_iter()
        .map(|(name, value)| (name.replace('.', "_"), replace_dots_in(value)))
        .collect()
}

fn replace_dots_in(value: Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(replace_dots(object)),
        Value::Array(items) => Value::Array(items.into_iter().map(replace_dots_in).collect()),
        other => other,
    }
}

impl ConfigurableComponent for JsonEventParser {
    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::new(RECORD_TYPE)
                .description("Type given to records unless the event type is unwrapped")
                .default_value("event")
                .validator(validators::non_empty()),
            PropertyDescriptor::new(UNWRAP_EVENT_TYPE)
                .description("Use a single top-level key as the record type")
                .default_value("false")
                .validator(validators::boolean()),
            PropertyDescriptor::new(REPLACE_DOTS)
                .description("Replace '.' with '_' in field names")
                .default_value("false")
                .validator(validators::boolean()),
            PropertyDescriptor::new(TIME_FIELD)
                .description("Field holding the event time, epoch millis or RFC 3339")
                .validator(validators::non_empty()),
            PropertyDescriptor::new(NORMALIZE_BRO)
                .description("Store 'ts' seconds as epoch millis and 'version' as a string")
                .default_value("false")
                .validator(validators::boolean()),
            PropertyDescriptor::new(DEBUG)
                .description("Keep the normalized event as a map in record_value")
                .default_value("false")
                .validator(validators::boolean()),
        ]
    }
}

#[async_trait]
impl Parser for JsonEventParser {
    async fn parse(
        &self,
        ctx: &ProcessContext,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> anyhow::Result<Vec<Record>> {
        let default_type = ctx
            .property(RECORD_TYPE)
            .as_string()
            .unwrap_or_else(|| "event".to_string());
        let unwrap = ctx.property(UNWRAP_EVENT_TYPE).as_bool().unwrap_or(false);
        let dots = ctx.property(REPLACE_DOTS).as_bool().unwrap_or(false);
        let bro = ctx.property(NORMALIZE_BRO).as_bool().unwrap_or(false);
        let debug = ctx.property(DEBUG).as_bool().unwrap_or(false);

        let mut record = Record::new(default_type.as_str());
        if let Some(key) = key {
            record.set(RECORD_KEY, payload_value(key));
        }

        let object = match serde_json::from_slice::<Value>(value) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                record.set(RECORD_VALUE, payload_value(value));
                record.add_error(
                    ErrorKind::Parsing,
                    format!("Expected a JSON object, got {}", json_kind(&other)),
                );
                return Ok(vec![record]);
            }
            Err(e) => {
                debug!("Unparsable JSON event in {}: {}", ctx.identifier(), e);
                record.set(RECORD_VALUE, payload_value(value));
                record.add_error(ErrorKind::Parsing, format!("Invalid JSON: {e}"));
                return Ok(vec![record]);
            }
        };

        let object = if dots { replace_dots(object) } else { object };
        let raw_event = if debug {
            FieldValue::from_json(&Value::Object(object.clone()))
        } else {
            None
        };

        let object = if unwrap {
            let (event_type, inner) = Self::unwrap_event(object);
            if let Some(event_type) = event_type {
                record.set_type(event_type);
            }
            inner
        } else {
            object
        };

        for (name, json) in &object {
            let normalized = if bro {
                Self::normalize_bro(name, json)
            } else {
                None
            };
            if let Some(field_value) = normalized.or_else(|| FieldValue::from_json(json)) {
                record.set(name.as_str(), field_value);
            }
        }
        if let Some(raw_event) = raw_event {
            record.set(RECORD_VALUE, raw_event);
        }

        if let Some(time_field) = ctx.property(TIME_FIELD).as_str() {
            let event_time = record.get(time_field).and_then(Self::event_time);
            if let Some(time) = event_time {
                record.set_time(time);
            }
        }
        Ok(vec![record])
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRunner;

    #[tokio::test]
    async fn test_typed_fields() {
        let stage = TestRunner::new("JsonEventParser").build().await.unwrap();
        let out = stage
            .parse(
                stage.context(),
                None,
                br#"{"user":"ada","status":200,"bytes":5000000000,"ratio":0.5,"ok":true,"tags":["a","b"],"gone":null}"#,
            )
            .await
            .unwrap();
        let record = &out[0];
        assert_eq!(record.record_type(), "event");
        assert_eq!(record.get_str("user"), Some("ada"));
        assert_eq!(record.get("status"), Some(&FieldValue::Int(200)));
        assert_eq!(record.get("bytes"), Some(&FieldValue::Long(5_000_000_000)));
        assert_eq!(record.get("ratio"), Some(&FieldValue::Double(0.5)));
        assert_eq!(record.get("ok"), Some(&FieldValue::Boolean(true)));
        assert_eq!(record.get("tags").and_then(FieldValue::as_array).map(<[_]>::len), Some(2));
        assert!(!record.has_field("gone"));
        assert!(!record.has_errors());
    }

    #[tokio::test]
    async fn test_unwrap_and_replace_dots() {
        let stage = TestRunner::new("JsonEventParser")
            .set_property(UNWRAP_EVENT_TYPE, "true")
            .set_property(REPLACE_DOTS, "true")
            .set_property(TIME_FIELD, "ts")
            .build()
            .await
            .unwrap();
        let out = stage
            .parse(
                stage.context(),
                Some(b"sensor-1".as_slice()),
                br#"{"dns":{"id.orig_h":"10.0.0.1","ts":"2024-01-02T03:04:05Z"}}"#,
            )
            .await
            .unwrap();
        let record = &out[0];
        assert_eq!(record.record_type(), "dns");
        assert_eq!(record.get_str("id_orig_h"), Some("10.0.0.1"));
        assert_eq!(record.get_str(RECORD_KEY), Some("sensor-1"));
        assert_eq!(record.time().to_rfc3339(), "2024-01-02T03:04:05+00:00");
    }

    #[tokio::test]
    async fn test_invalid_json_becomes_error_record() {
        let stage = TestRunner::new("JsonEventParser").build().await.unwrap();
        let out = stage
            .parse(stage.context(), None, b"{not json")
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get_str(RECORD_VALUE), Some("{not json"));
        assert_eq!(out[0].errors()[0].kind, ErrorKind::Parsing);

        let out = stage.parse(stage.context(), None, b"[1,2]").await.unwrap();
        assert!(out[0].errors()[0].message.contains("an array"));
    }

    #[tokio::test]
    async fn test_dots_replaced_at_every_depth() {
        let stage = TestRunner::new("JsonEventParser")
            .set_property(REPLACE_DOTS, "true")
            .build()
            .await
            .unwrap();
        let out = stage
            .parse(
                stage.context(),
                None,
                br#"{"conn":{"id.orig_h":"10.0.0.1","inner":{"a.b":1}},"hops":[{"x.y":true}]}"#,
            )
            .await
            .unwrap();
        let conn = out[0].get("conn").and_then(FieldValue::as_map).unwrap();
        assert_eq!(conn.get("id_orig_h"), Some(&FieldValue::from("10.0.0.1")));
        assert!(!conn.contains_key("id.orig_h"));
        let inner = conn.get("inner").and_then(FieldValue::as_map).unwrap();
        assert_eq!(inner.get("a_b"), Some(&FieldValue::Int(1)));

        let hops = out[0].get("hops").and_then(FieldValue::as_array).unwrap();
        let hop = hops[0].as_map().unwrap();
        assert_eq!(hop.get("x_y"), Some(&FieldValue::Boolean(true)));
    }

    #[tokio::test]
    async fn test_bro_normalization_and_debug_copy() {
        let stage = TestRunner::new("JsonEventParser")
            .set_property(UNWRAP_EVENT_TYPE, "true")
            .set_property(REPLACE_DOTS, "true")
            .set_property(NORMALIZE_BRO, "true")
            .set_property(DEBUG, "true")
            .build()
            .await
            .unwrap();
        let out = stage
            .parse(
                stage.context(),
                None,
                br#"{"ssh":{"ts":1487596886.953917,"version":2,"id.resp_p":22}}"#,
            )
            .await
            .unwrap();
        let record = &out[0];
        assert_eq!(record.record_type(), "ssh");
        assert_eq!(record.get("ts"), Some(&FieldValue::Long(1_487_596_886_953)));
        assert_eq!(record.get_str("version"), Some("2"));
        assert_eq!(record.get("id_resp_p"), Some(&FieldValue::Int(22)));

        let raw = record.get(RECORD_VALUE).and_then(FieldValue::as_map).unwrap();
        let ssh = raw.get("ssh").and_then(FieldValue::as_map).unwrap();
        assert!(ssh.contains_key("id_resp_p"));

        // Without the option, numbers keep their JSON type
        let plain = TestRunner::new("JsonEventParser").build().await.unwrap();
        let out = plain
            .parse(plain.context(), None, br#"{"ts":1.5,"version":2}"#)
            .await
            .unwrap();
        assert_eq!(out[0].get("ts"), Some(&FieldValue::Double(1.5)));
        assert_eq!(out[0].get("version"), Some(&FieldValue::Int(2)));
        assert!(!out[0].has_field(RECORD_VALUE));
    }
}
