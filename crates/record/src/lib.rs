//! Record and field model for logpipe.
//!
//! Every stage of a pipeline exchanges [`Record`]s: a generated identifier,
//! a type tag, an event time, a set of uniquely named [`Field`]s and an
//! ordered list of [`ErrorDescriptor`]s. A record that carries errors is
//! routed to the error channel by the engine, but its fields are kept.
//!
//! # Architecture
//!
//! ```text
//! logpipe-record (this crate)
//!    │
//!    ├─── logpipe-codec      (Record ⇄ bytes)
//!    ├─── logpipe-processor  (parsers and processors transform Records)
//!    └─── logpipe            (engine routes Records between topics)
//! ```
//!
//! # Example
//!
//! ```rust
//! use logpipe_record::{FieldType, FieldValue, Record};
//!
//! let mut record = Record::new("event");
//! record.set("user", "alice");
//! record.set_field("count", FieldType::Long, FieldValue::Long(3)).unwrap();
//!
//! assert_eq!(record.get_field("user").unwrap().field_type(), FieldType::String);
//! assert!(record.has_field("count"));
//! ```

pub mod dictionary;
pub mod error;
pub mod field;
pub mod merge;
pub mod record;
pub mod types;
pub mod value;

pub use error::{RecordError, Result};
pub use field::Field;
pub use merge::ConflictPolicy;
pub use record::{ErrorDescriptor, ErrorKind, Record};
pub use types::FieldType;
pub use value::FieldValue;
