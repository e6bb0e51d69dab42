//! logpipe
//!
//! A partitioned micro-batch pipeline for log and event records. Records
//! are read from topic-addressed transports, pass through a chain of parser
//! and processor stages and are written to output or error topics.
//!
//! # Layout
//!
//! - `logpipe_record` - typed records and fields
//! - `logpipe_codec` - record serializers (`json`, `proto`, raw)
//! - `logpipe_state` - LOCAL and CLUSTER scoped checkpoint state
//! - `logpipe_processor` - the processor/parser contract, property
//!   validation, the component registry and the standard components
//! - this crate - pipeline documents, transports and the engine
//!
//! # Pipeline
//!
//! ```no_run
//! # async fn example() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use logpipe::{config, Engine, MemoryTransport};
//! use logpipe_processor::ComponentRegistry;
//!
//! let pipeline = config::parse_pipeline(std::path::Path::new("pipeline.yml"))?;
//! let transport = Arc::new(MemoryTransport::new());
//! let mut engine = Engine::build(&pipeline, &ComponentRegistry::standard(), transport).await?;
//! engine.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod transport;

pub use config::{EngineSettings, PipelineConfig, StreamSettings};
pub use engine::{CycleReport, Engine, EngineError, PartitionReport, Shutdown};
pub use transport::{MemoryTransport, Message, OutgoingMessage, Transport, TransportError};

#[cfg(feature = "kafka")]
pub use transport::kafka::KafkaTransport;
