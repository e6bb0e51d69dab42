use async_trait::async_trait;
use logpipe_record::dictionary::{RECORD_KEY, RECORD_VALUE};
use logpipe_record::{FieldValue, Record};

use crate::component::{ConfigurableComponent, Parser};
use crate::context::ProcessContext;
use crate::property::PropertyDescriptor;
use crate::validators;

pub const RECORD_TYPE: &str = "record.type";
pub const SPLIT_LINES: &str = "split.lines";

/// Wraps raw payloads in records without interpreting them.
#[derive(Debug, Default)]
pub struct RawLineParser;

/// UTF-8 text as STRING, anything else as BYTES.
pub(crate) fn payload_value(bytes: &[u8]) -> FieldValue {
    match std::str::from_utf8(bytes) {
        Ok(text) => FieldValue::String(text.to_string()),
        Err(_) => FieldValue::Bytes(bytes.to_vec()),
    }
}

impl ConfigurableComponent for RawLineParser {
    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::new(RECORD_TYPE)
                .description("Type given to every record")
                .default_value("raw_line")
                .validator(validators::non_empty()),
            PropertyDescriptor::new(SPLIT_LINES)
                .description("Emit one record per non-empty line of the payload")
                .default_value("false")
                .validator(validators::boolean()),
        ]
    }
}

#[async_trait]
impl Parser for RawLineParser {
    async fn parse(
        &self,
        ctx: &ProcessContext,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> anyhow::Result<Vec<Record>> {
        let record_type = ctx
            .property(RECORD_TYPE)
            .as_string()
            .unwrap_or_else(|| "raw_line".to_string());
        let split = ctx.property(SPLIT_LINES).as_bool().unwrap_or(false);

        let payloads: Vec<&[u8]> = if split {
            value
                .split(|b| *b == b'\n')
                .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
                .filter(|line| !line.is_empty())
                .collect()
        } else {
            vec![value]
        };

        let records = payloads
            .into_iter()
            .map(|payload| {
                let mut record = Record::new(record_type.as_str());
                if let Some(key) = key {
                    record.set(RECORD_KEY, payload_value(key));
                }
                record.set(RECORD_VALUE, payload_value(payload));
                record
            })
            .collect();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRunner;

    #[tokio::test]
    async fn test_wraps_payload() {
        let stage = TestRunner::new("RawLineParser").build().await.unwrap();
        let out = stage
            .parse(stage.context(), Some(b"k1".as_slice()), b"GET /index 200")
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].record_type(), "raw_line");
        assert_eq!(out[0].get_str(RECORD_KEY), Some("k1"));
        assert_eq!(out[0].get_str(RECORD_VALUE), Some("GET /index 200"));
    }

    #[tokio::test]
    async fn test_binary_payload_and_split() {
        let stage = TestRunner::new("RawLineParser")
            .set_property(SPLIT_LINES, "true")
            .set_property(RECORD_TYPE, "syslog")
            .build()
            .await
            .unwrap();
        let out = stage
            .parse(stage.context(), None, b"one\r\n\ntwo\n")
            .await
            .unwrap();
        let values: Vec<&str> = out.iter().filter_map(|r| r.get_str(RECORD_VALUE)).collect();
        assert_eq!(values, vec!["one", "two"]);
        assert!(!out[0].has_field(RECORD_KEY));

        let stage = TestRunner::new("RawLineParser").build().await.unwrap();
        let out = stage
            .parse(stage.context(), None, &[0xff, 0x00])
            .await
            .unwrap();
        assert_eq!(
            out[0].get(RECORD_VALUE),
            Some(&FieldValue::Bytes(vec![0xff, 0x00]))
        );
    }
}
