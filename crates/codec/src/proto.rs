//! Compact encoding: records in protobuf wire format.
//!
//! The schema is fixed, so no descriptor travels with the payload:
//!
//! ```text
//! message Record { string id = 1; string type = 2; int64 time_seconds = 3;
//!                  uint32 time_nanos = 4; repeated Field fields = 5;
//!                  repeated Error errors = 6; }
//! message Field  { string name = 1; Value value = 2; }
//! message Error  { string kind = 1; string message = 2; }
//! message Value  { oneof kind { string string = 1; int32 int = 2; int64 long = 3;
//!                  float float = 4; double double = 5; bool boolean = 6;
//!                  bytes bytes = 7; Array array = 8; Map map = 9; Record record = 10; } }
//! message Array  { repeated Value values = 1; }
//! message Map    { repeated Entry entries = 1; }
//! message Entry  { string key = 1; Value value = 2; }
//! ```
//!
//! Fields are written in name order so equal records encode to equal bytes.

use crate::error::{CodecError, Result};
use crate::RecordSerializer;
use chrono::DateTime;
use logpipe_record::{ErrorDescriptor, ErrorKind, Field, FieldValue, Record};
use protobuf::{CodedInputStream, CodedOutputStream};
use std::collections::HashMap;

const RECORD_ID: u32 = 1;
const RECORD_TYPE: u32 = 2;
const RECORD_TIME_SECONDS: u32 = 3;
const RECORD_TIME_NANOS: u32 = 4;
const RECORD_FIELD: u32 = 5;
const RECORD_ERROR: u32 = 6;

const FIELD_NAME: u32 = 1;
const FIELD_VALUE: u32 = 2;

const ERROR_KIND: u32 = 1;
const ERROR_MESSAGE: u32 = 2;

const VALUE_STRING: u32 = 1;
const VALUE_INT: u32 = 2;
const VALUE_LONG: u32 = 3;
const VALUE_FLOAT: u32 = 4;
const VALUE_DOUBLE: u32 = 5;
const VALUE_BOOLEAN: u32 = 6;
const VALUE_BYTES: u32 = 7;
const VALUE_ARRAY: u32 = 8;
const VALUE_MAP: u32 = 9;
const VALUE_RECORD: u32 = 10;

/// Deepest ARRAY, MAP or RECORD nesting accepted when decoding.
pub const MAX_NESTING_DEPTH: u32 = 100;

const REPEATED_ITEM: u32 = 1;
const ENTRY_KEY: u32 = 1;
const ENTRY_VALUE: u32 = 2;

/// Schema-based compact serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtoSerializer;

impl RecordSerializer for ProtoSerializer {
    fn name(&self) -> &'static str {
        "proto"
    }

    fn serialize(&self, record: &Record) -> Result<Vec<u8>> {
        encode_record(record)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Record> {
        decode_record(bytes)
    }
}

fn encode_err(e: protobuf::Error) -> CodecError {
    CodecError::ProtobufEncode(e.to_string())
}

fn decode_err(e: protobuf::Error) -> CodecError {
    CodecError::ProtobufDecode(e.to_string())
}

/// Run `write` against a fresh stream and return the produced bytes.
fn encode_message<F>(write: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut CodedOutputStream) -> Result<()>,
{
    let mut buffer = Vec::new();
    {
        let mut stream = CodedOutputStream::vec(&mut buffer);
        write(&mut stream)?;
        stream.flush().map_err(encode_err)?;
    }
    Ok(buffer)
}

/// Encode a record to protobuf binary format.
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    encode_message(|stream| {
        stream
            .write_string(RECORD_ID, record.id())
            .map_err(encode_err)?;
        stream
            .write_string(RECORD_TYPE, record.record_type())
            .map_err(encode_err)?;
        stream
            .write_int64(RECORD_TIME_SECONDS, record.time().timestamp())
            .map_err(encode_err)?;
        stream
            .write_uint32(RECORD_TIME_NANOS, record.time().timestamp_subsec_nanos())
            .map_err(encode_err)?;

        for name in record.field_names() {
            if let Some(field) = record.get_field(name) {
                let encoded = encode_field(field)?;
                stream
                    .write_bytes(RECORD_FIELD, &encoded)
                    .map_err(encode_err)?;
            }
        }

        for error in record.errors() {
            let encoded = encode_message(|s| {
                s.write_string(ERROR_KIND, error.kind.as_str())
                    .map_err(encode_err)?;
                s.write_string(ERROR_MESSAGE, &error.message)
                    .map_err(encode_err)
            })?;
            stream
                .write_bytes(RECORD_ERROR, &encoded)
                .map_err(encode_err)?;
        }
        Ok(())
    })
}

fn encode_field(field: &Field) -> Result<Vec<u8>> {
    let value = encode_value(field.value())?;
    encode_message(|stream| {
        stream
            .write_string(FIELD_NAME, field.name())
            .map_err(encode_err)?;
        stream.write_bytes(FIELD_VALUE, &value).map_err(encode_err)
    })
}

/// Encode a single value as a `Value` message.
pub fn encode_value(value: &FieldValue) -> Result<Vec<u8>> {
    encode_message(|stream| {
        let written = match value {
            FieldValue::String(s) => stream.write_string(VALUE_STRING, s),
            // Wire type 0 (varint)
            FieldValue::Int(i) => stream.write_int32(VALUE_INT, *i),
            FieldValue::Long(i) => stream.write_int64(VALUE_LONG, *i),
            // Wire type 5 (32-bit)
            FieldValue::Float(f) => stream.write_float(VALUE_FLOAT, *f),
            // Wire type 1 (64-bit)
            FieldValue::Double(f) => stream.write_double(VALUE_DOUBLE, *f),
            FieldValue::Boolean(b) => stream.write_bool(VALUE_BOOLEAN, *b),
            FieldValue::Bytes(b) => stream.write_bytes(VALUE_BYTES, b),
            FieldValue::Array(values) => {
                let encoded = encode_message(|s| {
                    for item in values {
                        let item = encode_value(item)?;
                        s.write_bytes(REPEATED_ITEM, &item).map_err(encode_err)?;
                    }
                    Ok(())
                })?;
                stream.write_bytes(VALUE_ARRAY, &encoded)
            }
            FieldValue::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort_unstable();
                let encoded = encode_message(|s| {
                    for key in keys {
                        let entry_value = encode_value(&map[key])?;
                        let entry = encode_message(|e| {
                            e.write_string(ENTRY_KEY, key).map_err(encode_err)?;
                            e.write_bytes(ENTRY_VALUE, &entry_value)
                                .map_err(encode_err)
                        })?;
                        s.write_bytes(REPEATED_ITEM, &entry).map_err(encode_err)?;
                    }
                    Ok(())
                })?;
                stream.write_bytes(VALUE_MAP, &encoded)
            }
            FieldValue::Record(record) => {
                let encoded = encode_record(record)?;
                stream.write_bytes(VALUE_RECORD, &encoded)
            }
        };
        written.map_err(encode_err)
    })
}

/// Iterate over the `(field_number, stream)` pairs of a message.
fn read_fields<F>(data: &[u8], message: &str, mut on_field: F) -> Result<()>
where
    F: FnMut(u32, &mut CodedInputStream) -> Result<bool>,
{
    let mut stream = CodedInputStream::from_bytes(data);
    loop {
        if stream.eof().map_err(decode_err)? {
            break;
        }

        let tag = stream.read_raw_varint32().map_err(decode_err)?;
        if tag == 0 {
            break;
        }

        let field_number = tag >> 3;
        if !on_field(field_number, &mut stream)? {
            return Err(CodecError::ProtobufDecode(format!(
                "Unknown field number: {field_number} in message {message}"
            )));
        }
    }
    Ok(())
}

/// Decode a record from protobuf binary format.
pub fn decode_record(data: &[u8]) -> Result<Record> {
    decode_record_at(data, 0)
}

fn check_depth(depth: u32) -> Result<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(CodecError::TooDeep {
            limit: MAX_NESTING_DEPTH,
        });
    }
    Ok(())
}

fn decode_record_at(data: &[u8], depth: u32) -> Result<Record> {
    check_depth(depth)?;
    let mut id = None;
    let mut record_type = String::new();
    let mut seconds = 0i64;
    let mut nanos = 0u32;
    let mut fields = Vec::new();
    let mut errors = Vec::new();

    read_fields(data, "Record", |number, stream| {
        match number {
            RECORD_ID => id = Some(stream.read_string().map_err(decode_err)?),
            RECORD_TYPE => record_type = stream.read_string().map_err(decode_err)?,
            RECORD_TIME_SECONDS => seconds = stream.read_int64().map_err(decode_err)?,
            RECORD_TIME_NANOS => nanos = stream.read_uint32().map_err(decode_err)?,
            RECORD_FIELD => {
                let bytes = stream.read_bytes().map_err(decode_err)?;
                fields.push(decode_field(&bytes, depth)?);
            }
            RECORD_ERROR => {
                let bytes = stream.read_bytes().map_err(decode_err)?;
                errors.push(decode_error(&bytes)?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;

    let id = id.ok_or_else(|| CodecError::MissingField("id".to_string()))?;
    let time = DateTime::from_timestamp(seconds, nanos)
        .ok_or(CodecError::InvalidTimestamp { seconds, nanos })?;

    let mut record = Record::with_id(id, record_type);
    record.set_time(time);
    for field in fields {
        record.put(field);
    }
    for error in errors {
        record.push_error(error);
    }
    Ok(record)
}

fn decode_field(data: &[u8], depth: u32) -> Result<Field> {
    let mut name = None;
    let mut value = None;

    read_fields(data, "Field", |number, stream| {
        match number {
            FIELD_NAME => name = Some(stream.read_string().map_err(decode_err)?),
            FIELD_VALUE => {
                let bytes = stream.read_bytes().map_err(decode_err)?;
                value = Some(decode_value_at(&bytes, depth)?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;

    let name = name.ok_or_else(|| CodecError::MissingField("field.name".to_string()))?;
    let value = value.ok_or_else(|| CodecError::MissingField(format!("{name}.value")))?;
    Ok(Field::of(name, value))
}

fn decode_error(data: &[u8]) -> Result<ErrorDescriptor> {
    let mut kind = String::new();
    let mut message = String::new();

    read_fields(data, "Error", |number, stream| {
        match number {
            ERROR_KIND => kind = stream.read_string().map_err(decode_err)?,
            ERROR_MESSAGE => message = stream.read_string().map_err(decode_err)?,
            _ => return Ok(false),
        }
        Ok(true)
    })?;

    Ok(ErrorDescriptor::new(ErrorKind::from_name(&kind), message))
}

/// Decode a `Value` message.
pub fn decode_value(data: &[u8]) -> Result<FieldValue> {
    decode_value_at(data, 0)
}

fn decode_value_at(data: &[u8], depth: u32) -> Result<FieldValue> {
    check_depth(depth)?;
    let mut value = None;

    read_fields(data, "Value", |number, stream| {
        let decoded = match number {
            VALUE_STRING => FieldValue::String(stream.read_string().map_err(decode_err)?),
            VALUE_INT => FieldValue::Int(stream.read_int32().map_err(decode_err)?),
            VALUE_LONG => FieldValue::Long(stream.read_int64().map_err(decode_err)?),
            VALUE_FLOAT => FieldValue::Float(stream.read_float().map_err(decode_err)?),
            VALUE_DOUBLE => FieldValue::Double(stream.read_double().map_err(decode_err)?),
            VALUE_BOOLEAN => FieldValue::Boolean(stream.read_bool().map_err(decode_err)?),
            VALUE_BYTES => FieldValue::Bytes(stream.read_bytes().map_err(decode_err)?),
            VALUE_ARRAY => {
                let bytes = stream.read_bytes().map_err(decode_err)?;
                FieldValue::Array(decode_array(&bytes, depth + 1)?)
            }
            VALUE_MAP => {
                let bytes = stream.read_bytes().map_err(decode_err)?;
                FieldValue::Map(decode_map(&bytes, depth + 1)?)
            }
            VALUE_RECORD => {
                let bytes = stream.read_bytes().map_err(decode_err)?;
                FieldValue::Record(Box::new(decode_record_at(&bytes, depth + 1)?))
            }
            _ => return Ok(false),
        };
        value = Some(decoded);
        Ok(true)
    })?;

    value.ok_or_else(|| CodecError::MissingField("value".to_string()))
}

fn decode_array(data: &[u8], depth: u32) -> Result<Vec<FieldValue>> {
    let mut values = Vec::new();
    read_fields(data, "Array", |number, stream| {
        if number != REPEATED_ITEM {
            return Ok(false);
        }
        let bytes = stream.read_bytes().map_err(decode_err)?;
        values.push(decode_value_at(&bytes, depth)?);
        Ok(true)
    })?;
    Ok(values)
}

fn decode_map(data: &[u8], depth: u32) -> Result<HashMap<String, FieldValue>> {
    let mut map = HashMap::new();
    read_fields(data, "Map", |number, stream| {
        if number != REPEATED_ITEM {
            return Ok(false);
        }
        let bytes = stream.read_bytes().map_err(decode_err)?;
        let (key, value) = decode_entry(&bytes, depth)?;
        map.insert(key, value);
        Ok(true)
    })?;
    Ok(map)
}

fn decode_entry(data: &[u8], depth: u32) -> Result<(String, FieldValue)> {
    let mut key = None;
    let mut value = None;
    read_fields(data, "Entry", |number, stream| {
        match number {
            ENTRY_KEY => key = Some(stream.read_string().map_err(decode_err)?),
            ENTRY_VALUE => {
                let bytes = stream.read_bytes().map_err(decode_err)?;
                value = Some(decode_value_at(&bytes, depth)?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;

    let key = key.ok_or_else(|| CodecError::MissingField("entry.key".to_string()))?;
    let value = value.ok_or_else(|| CodecError::MissingField(format!("entry[{key}].value")))?;
    Ok((key, value))
}
