//! Processor and parser contract for logpipe.
//!
//! A component declares [`PropertyDescriptor`]s, is validated once when the
//! pipeline is built and then transforms records partition by partition:
//!
//! - [`Processor`]: records in, records out; may read and write state
//! - [`Parser`]: one raw transport message in, zero or more records out
//!
//! Components are created by type name through a [`ComponentRegistry`] and
//! wrapped in a [`Stage`] together with their [`ProcessContext`]. Per-record
//! problems are attached to the record; an `Err` returned from a processor
//! fails the whole partition task.
//!
//! The [`listing`] module holds the watermark listing used by source stages
//! such as [`processors::ListFiles`].

pub mod component;
pub mod context;
pub mod duration;
pub mod error;
pub mod expression;
pub mod listing;
pub mod parsers;
pub mod processors;
pub mod property;
pub mod registry;
pub mod stage;
pub mod testing;
pub mod validators;

pub use component::{Component, ConfigurableComponent, Parser, Processor};
pub use context::ProcessContext;
pub use duration::parse_duration;
pub use error::{ConfigProblem, ConfigurationError, ProcessorError, Result};
pub use property::{validate_properties, PropertyDescriptor, PropertyValue};
pub use registry::{ComponentDescription, ComponentRegistry};
pub use stage::{ComponentConfig, Stage};
pub use validators::{ValidationResult, Validator};
