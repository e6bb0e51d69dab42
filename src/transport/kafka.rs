//! Kafka transport for cluster mode.
//!
//! Each `(group, topic, partition)` gets its own consumer with manual
//! assignment and auto-commit disabled. Every fetch re-assigns the
//! partition at the last committed position, so a retried task sees the
//! same messages again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message as _;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Message, OutgoingMessage, Result, Transport, TransportError};

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

type PartitionKey = (String, String, i32);

pub struct KafkaTransport {
    brokers: String,
    producer: FutureProducer,
    admin: AdminClient<DefaultClientContext>,
    consumers: Mutex<HashMap<PartitionKey, Arc<StreamConsumer>>>,
    positions: Mutex<HashMap<PartitionKey, i64>>,
}

impl KafkaTransport {
    pub fn new(brokers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()?;

        info!("Connected Kafka transport to {}", brokers);
        Ok(Self {
            brokers: brokers.to_string(),
            producer,
            admin,
            consumers: Mutex::new(HashMap::new()),
            positions: Mutex::new(HashMap::new()),
        })
    }

    async fn consumer(&self, key: &PartitionKey) -> Result<Arc<StreamConsumer>> {
        let mut consumers = self.consumers.lock().await;
        if let Some(consumer) = consumers.get(key) {
            return Ok(Arc::clone(consumer));
        }

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &key.0)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()?;
        debug!(
            "Created consumer for group '{}' on {}/{}",
            key.0, key.1, key.2
        );
        let consumer = Arc::new(consumer);
        consumers.insert(key.clone(), Arc::clone(&consumer));
        Ok(consumer)
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn ensure_topic(&self, topic: &str, partitions: i32, replication: i32) -> Result<()> {
        let new_topic = NewTopic::new(topic, partitions, TopicReplication::Fixed(replication));
        let opts = AdminOptions::new().operation_timeout(Some(METADATA_TIMEOUT));

        let results = self.admin.create_topics(&[new_topic], &opts).await?;
        for result in results {
            match result {
                Ok(topic_name) => {
                    info!("Topic '{topic_name}' created with {partitions} partition(s)");
                }
                Err((topic_name, err)) => {
                    if err.to_string().contains("already exists") {
                        debug!("Topic '{topic_name}' already exists");
                    } else {
                        return Err(TransportError::Backend(format!(
                            "Failed to create topic '{topic_name}': {err}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    async fn partition_count(&self, topic: &str) -> Result<Option<i32>> {
        let producer = self.producer.clone();
        let name = topic.to_string();
        let metadata = tokio::task::spawn_blocking(move || {
            producer.client().fetch_metadata(Some(&name), METADATA_TIMEOUT)
        })
        .await
        .map_err(|e| TransportError::Backend(format!("Metadata task failed: {e}")))??;

        Ok(metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .filter(|t| t.error().is_none() && !t.partitions().is_empty())
            .map(|t| t.partitions().len() as i32))
    }

    async fn fetch(
        &self,
        group: &str,
        topic: &str,
        partition: i32,
        max: usize,
    ) -> Result<Vec<Message>> {
        let key = (group.to_string(), topic.to_string(), partition);
        let consumer = self.consumer(&key).await?;
        let start = self.positions.lock().await.get(&key).copied();

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, start.map_or(Offset::Stored, Offset::Offset))?;
        consumer.assign(&tpl)?;

        let mut messages = Vec::new();
        while messages.len() < max {
            match tokio::time::timeout(POLL_TIMEOUT, consumer.recv()).await {
                Ok(Ok(msg)) => messages.push(Message {
                    key: msg.key().map(<[u8]>::to_vec),
                    payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                    offset: msg.offset(),
                }),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }
        Ok(messages)
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: i32,
        next_offset: i64,
    ) -> Result<()> {
        let key = (group.to_string(), topic.to_string(), partition);
        let consumer = self.consumer(&key).await?;

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, Offset::Offset(next_offset))?;
        consumer.commit(&tpl, CommitMode::Sync)?;

        self.positions.lock().await.insert(key, next_offset);
        Ok(())
    }

    async fn publish(&self, topic: &str, messages: Vec<OutgoingMessage>) -> Result<()> {
        let sends = messages.iter().map(|m| {
            let mut record = FutureRecord::<[u8], [u8]>::to(topic).payload(m.payload.as_slice());
            if let Some(key) = &m.key {
                record = record.key(key.as_slice());
            }
            self.producer.send(record, SEND_TIMEOUT)
        });
        futures::future::try_join_all(sends)
            .await
            .map_err(|(err, _)| TransportError::Kafka(err))?;
        Ok(())
    }
}
