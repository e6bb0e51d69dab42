use crate::error::Result;
use crate::RecordSerializer;
use logpipe_record::dictionary::{DEFAULT_RECORD_TYPE, RECORD_VALUE};
use logpipe_record::{FieldValue, Record};

/// Passes raw payloads through.
///
/// Serializing writes the `record_value` field (bytes as-is, anything else
/// as text) or, when the record has no such field, its fields as plain
/// JSON. Deserializing wraps the payload in a record under `record_value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesSerializer;

impl RecordSerializer for BytesSerializer {
    fn name(&self) -> &'static str {
        "none"
    }

    fn serialize(&self, record: &Record) -> Result<Vec<u8>> {
        Ok(match record.get(RECORD_VALUE) {
            Some(FieldValue::Bytes(bytes)) => bytes.clone(),
            Some(other) => other.to_display_string().into_bytes(),
            None => serde_json::to_vec(&record.to_json())?,
        })
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Record> {
        let mut record = Record::new(DEFAULT_RECORD_TYPE);
        match std::str::from_utf8(bytes) {
            Ok(text) => record.set(RECORD_VALUE, text),
            Err(_) => record.set(RECORD_VALUE, bytes.to_vec()),
        };
        Ok(record)
    }
}
