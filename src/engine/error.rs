use logpipe_processor::ConfigurationError;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Topic '{0}' does not exist and topic auto-creation is disabled")]
    MissingTopic(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Task {task} failed {failures} time(s), giving up")]
    TaskFailed {
        task: String,
        failures: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    #[error("Cluster mode needs a transport built with the 'kafka' feature")]
    KafkaUnavailable,
}

pub type Result<T> = std::result::Result<T, EngineError>;
