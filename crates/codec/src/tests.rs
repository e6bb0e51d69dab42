//! Unit tests for the codec crate.

use chrono::{TimeZone, Utc};
use logpipe_record::dictionary::RECORD_VALUE;
use logpipe_record::{ErrorKind, FieldType, FieldValue, Record};
use std::collections::HashMap;

use crate::proto::{self, MAX_NESTING_DEPTH};
use crate::{
    BytesSerializer, CodecError, JsonSerializer, ProtoSerializer, RecordSerializer,
    SerializerKind,
};

/// A record that exercises every field type, including nesting.
fn sample_record() -> Record {
    let mut inner = Record::with_id("inner-1", "lookup_response");
    inner.set("city", "Lyon");
    inner.set("zip", 69001i32);

    let mut map = HashMap::new();
    map.insert("k1".to_string(), FieldValue::Long(-1));
    map.insert(
        "k2".to_string(),
        FieldValue::Array(vec![FieldValue::from("x"), FieldValue::Boolean(true)]),
    );

    let mut record = Record::with_id("rec-1", "event");
    record.set_time(Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap());
    record.set("string", "héllo \"quoted\"");
    record.set("empty", "");
    record.set("int", i32::MIN);
    record.set("long", i64::MAX);
    record.set("float", 3.4028235e38f32);
    record.set("small_float", 1.1754944e-38f32);
    record.set("double", 0.1f64);
    record.set("tiny_double", f64::MIN_POSITIVE);
    record.set("boolean", false);
    record.set("bytes", vec![0u8, 1, 254, 255]);
    record.set("array", vec![FieldValue::Int(1), FieldValue::Array(vec![])]);
    record.set("map", map);
    record.set("record", inner);
    record.add_error(ErrorKind::TypeConversion, "cannot convert 'x' to INT");
    record
}

// ============================================================================
// Round-trip Tests
// ============================================================================

#[test]
fn test_proto_roundtrip_all_types() {
    let record = sample_record();
    let bytes = ProtoSerializer.serialize(&record).unwrap();
    let decoded = ProtoSerializer.deserialize(&bytes).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn test_json_roundtrip_all_types() {
    let record = sample_record();
    let bytes = JsonSerializer.serialize(&record).unwrap();
    let decoded = JsonSerializer.deserialize(&bytes).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn test_roundtrip_preserves_numeric_precision() {
    let doubles = [
        0.1,
        1.0 / 3.0,
        f64::MAX,
        -f64::MIN_POSITIVE,
        123_456_789.123_456_79,
    ];
    for serializer in [&JsonSerializer as &dyn RecordSerializer, &ProtoSerializer] {
        for d in doubles {
            let mut record = Record::with_id("n", "numbers");
            record.set("d", d);
            record.set("l", i64::MIN + 1);
            let decoded = serializer
                .deserialize(&serializer.serialize(&record).unwrap())
                .unwrap();
            assert_eq!(decoded.get("d"), Some(&FieldValue::Double(d)), "{}", serializer.name());
            assert_eq!(decoded.get("l"), Some(&FieldValue::Long(i64::MIN + 1)));
        }
    }
}

#[test]
fn test_non_finite_doubles_survive_both_encodings() {
    for serializer in [&JsonSerializer as &dyn RecordSerializer, &ProtoSerializer] {
        let mut record = Record::with_id("n", "numbers");
        record.set("nan", f64::NAN);
        record.set("inf", f64::INFINITY);
        record.set("neg_inf", f32::NEG_INFINITY);

        let decoded = serializer
            .deserialize(&serializer.serialize(&record).unwrap())
            .unwrap();
        assert!(decoded.get("nan").unwrap().as_f64().unwrap().is_nan());
        assert_eq!(decoded.get("inf"), Some(&FieldValue::Double(f64::INFINITY)));
        assert_eq!(
            decoded.get("neg_inf"),
            Some(&FieldValue::Float(f32::NEG_INFINITY))
        );
    }
}

#[test]
fn test_int_and_long_keep_distinct_types() {
    let mut record = Record::with_id("t", "types");
    record.set("i", 5i32);
    record.set("l", 5i64);

    for serializer in [&JsonSerializer as &dyn RecordSerializer, &ProtoSerializer] {
        let decoded = serializer
            .deserialize(&serializer.serialize(&record).unwrap())
            .unwrap();
        assert_eq!(decoded.get_field("i").unwrap().field_type(), FieldType::Int);
        assert_eq!(decoded.get_field("l").unwrap().field_type(), FieldType::Long);
    }
}

#[test]
fn test_proto_encoding_is_deterministic() {
    let record = sample_record();
    let a = ProtoSerializer.serialize(&record).unwrap();
    let b = ProtoSerializer.serialize(&record.clone()).unwrap();
    assert_eq!(a, b);
}

// ============================================================================
// Decoding Failures
// ============================================================================

#[test]
fn test_proto_rejects_unknown_field_number() {
    // Field 15, wire type 0, value 1
    let bytes = [0x78, 0x01];
    let err = ProtoSerializer.deserialize(&bytes).unwrap_err();
    assert!(matches!(err, CodecError::ProtobufDecode(_)));
    assert!(err.to_string().contains("Unknown field number: 15"));
}

#[test]
fn test_proto_requires_id() {
    let err = ProtoSerializer.deserialize(&[]).unwrap_err();
    assert!(matches!(err, CodecError::MissingField(ref f) if f == "id"));
}

/// Write `bytes` as a length-delimited field.
fn wrap(field_number: u32, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut stream = protobuf::CodedOutputStream::vec(&mut out);
        stream.write_bytes(field_number, bytes).unwrap();
        stream.flush().unwrap();
    }
    out
}

/// A `Value` holding `levels` arrays around an int, built without recursion.
fn nested_arrays(levels: usize) -> Vec<u8> {
    let mut payload = proto::encode_value(&FieldValue::Int(1)).unwrap();
    for _ in 0..levels {
        // Array.values = 1, Value.array = 8
        payload = wrap(8, &wrap(1, &payload));
    }
    payload
}

#[test]
fn test_proto_nesting_limit() {
    let limit = MAX_NESTING_DEPTH as usize;
    let mut value = proto::decode_value(&nested_arrays(limit)).unwrap();
    for _ in 0..limit {
        value = match value {
            FieldValue::Array(mut items) => items.remove(0),
            other => panic!("expected an array, got {other:?}"),
        };
    }
    assert_eq!(value, FieldValue::Int(1));

    let err = proto::decode_value(&nested_arrays(limit + 1)).unwrap_err();
    assert!(matches!(err, CodecError::TooDeep { limit: 100 }));
}

#[test]
fn test_proto_deep_payload_fails_on_small_stack() {
    let payload = nested_arrays(5_000);
    let result = std::thread::Builder::new()
        .stack_size(512 * 1024)
        .spawn(move || proto::decode_value(&payload).map(|_| ()))
        .unwrap()
        .join()
        .unwrap();
    assert!(matches!(result, Err(CodecError::TooDeep { .. })));

    // Same payload nested inside a record field
    let field = [wrap(1, b"deep"), wrap(2, &nested_arrays(5_000))].concat();
    let record = [wrap(1, b"rec-1"), wrap(5, &field)].concat();
    let result = std::thread::Builder::new()
        .stack_size(512 * 1024)
        .spawn(move || ProtoSerializer.deserialize(&record).map(|_| ()))
        .unwrap()
        .join()
        .unwrap();
    assert!(matches!(result, Err(CodecError::TooDeep { .. })));
}

#[test]
fn test_json_rejects_unknown_type_tag() {
    let payload = br#"{"id":"a","type":"t","fields":{"x":{"type":"decimal","value":"1"}}}"#;
    let err = JsonSerializer.deserialize(payload).unwrap_err();
    assert!(matches!(err, CodecError::InvalidValue { .. }));
}

#[test]
fn test_json_rejects_out_of_range_int() {
    let payload = br#"{"id":"a","type":"t","fields":{"x":{"type":"int","value":3000000000}}}"#;
    assert!(JsonSerializer.deserialize(payload).is_err());
}

#[test]
fn test_json_rejects_malformed_payload() {
    let err = JsonSerializer.deserialize(b"not json").unwrap_err();
    assert!(matches!(err, CodecError::Json(_)));
}

// ============================================================================
// Raw Payloads
// ============================================================================

#[test]
fn test_bytes_serializer_wraps_payload() {
    let record = BytesSerializer.deserialize(b"line one").unwrap();
    assert_eq!(record.get_str(RECORD_VALUE), Some("line one"));
    assert_eq!(BytesSerializer.serialize(&record).unwrap(), b"line one");

    let binary = BytesSerializer.deserialize(&[0xff, 0xfe]).unwrap();
    assert_eq!(
        binary.get(RECORD_VALUE),
        Some(&FieldValue::Bytes(vec![0xff, 0xfe]))
    );
}

#[test]
fn test_bytes_serializer_falls_back_to_plain_json() {
    let mut record = Record::new("event");
    record.set("a", 1i32);
    let bytes = BytesSerializer.serialize(&record).unwrap();
    assert_eq!(bytes, br#"{"a":1}"#);
}

// ============================================================================
// Selection Tests
// ============================================================================

#[test]
fn test_serializer_kind_selection() {
    assert_eq!(SerializerKind::from_config("JSON"), SerializerKind::Json);
    assert_eq!(SerializerKind::from_config("proto"), SerializerKind::Proto);
    assert_eq!(SerializerKind::from_config("compact"), SerializerKind::Proto);
    assert_eq!(SerializerKind::from_config("none"), SerializerKind::None);
    assert!(SerializerKind::from_config("none").is_raw());
}

#[test]
fn test_unknown_selector_falls_back_to_json() {
    let kind = SerializerKind::from_config("avro");
    assert_eq!(kind, SerializerKind::Json);
    assert_eq!(kind.build().name(), "json");
}
