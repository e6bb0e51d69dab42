//! Pipeline documents and the engine and stream settings they carry.

pub mod pipeline;
pub mod settings;

pub use pipeline::{
    parse_pipeline, parse_pipeline_str, substitute_env_vars, EngineConfig, PipelineConfig,
    StreamConfig,
};
pub use settings::{EngineSettings, StreamSettings};
