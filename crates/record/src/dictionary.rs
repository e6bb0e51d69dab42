//! Well-known field names shared by parsers, processors and the engine.

/// Key of the transport message a record was parsed from.
pub const RECORD_KEY: &str = "record_key";

/// Raw payload of the transport message a record was parsed from.
pub const RECORD_VALUE: &str = "record_value";

/// Record type used when a parser is not told otherwise.
pub const DEFAULT_RECORD_TYPE: &str = "generic";
