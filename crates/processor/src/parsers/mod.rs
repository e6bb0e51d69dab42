//! Built-in parsers turning raw transport payloads into records.

pub mod json_event;
pub mod raw_line;

pub use json_event::JsonEventParser;
pub use raw_line::RawLineParser;
