//! Partitioned, topic-addressed channels carrying pipeline messages.
//!
//! The engine only talks to a [`Transport`]: it makes sure topics exist,
//! fetches a bounded slice of one partition for a consumer group, publishes
//! results and commits the consumed offset once a partition task succeeded.
//! Offsets are committed after publishing, so a failed or interrupted task
//! reads the same messages again (at-least-once).

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryTransport;

/// One message read from a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    /// Position of the message in its partition
    pub offset: i64,
}

/// One message to publish; the transport picks the partition from the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl OutgoingMessage {
    pub fn new(key: Option<Vec<u8>>, payload: Vec<u8>) -> Self {
        Self { key, payload }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Topic '{0}' does not exist")]
    UnknownTopic(String),

    #[error("Topic '{topic}' has no partition {partition}")]
    UnknownPartition { topic: String, partition: i32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Transport error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Create `topic` unless it exists already.
    async fn ensure_topic(&self, topic: &str, partitions: i32, replication: i32) -> Result<()>;

    /// Partition count of `topic`, `None` when the topic does not exist.
    async fn partition_count(&self, topic: &str) -> Result<Option<i32>>;

    /// Up to `max` messages of one partition, starting at the group's
    /// committed offset.
    async fn fetch(
        &self,
        group: &str,
        topic: &str,
        partition: i32,
        max: usize,
    ) -> Result<Vec<Message>>;

    /// Store `next_offset` as the group's position in the partition.
    async fn commit(&self, group: &str, topic: &str, partition: i32, next_offset: i64)
        -> Result<()>;

    /// Append messages to `topic` and wait until they are stored.
    async fn publish(&self, topic: &str, messages: Vec<OutgoingMessage>) -> Result<()>;
}
