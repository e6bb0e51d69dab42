//! In-process partitioned log used by standalone mode and tests.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{Message, OutgoingMessage, Result, Transport, TransportError};

type OffsetKey = (String, String, i32);

#[derive(Debug, Clone)]
struct StoredMessage {
    key: Option<Vec<u8>>,
    payload: Vec<u8>,
}

/// Topics are vectors of partitions; offsets are indexes into a partition.
///
/// Keyed messages always land in the same partition; unkeyed messages are
/// spread round-robin.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    topics: RwLock<HashMap<String, Vec<Vec<StoredMessage>>>>,
    offsets: RwLock<HashMap<OffsetKey, i64>>,
    next_partition: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition_for(&self, key: Option<&[u8]>, partitions: usize) -> usize {
        match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % partitions as u64) as usize
            }
            None => self.next_partition.fetch_add(1, Ordering::Relaxed) % partitions,
        }
    }

    /// Publish every non-empty line of `text` as an unkeyed message.
    pub async fn seed_lines(&self, topic: &str, partitions: i32, text: &str) -> Result<usize> {
        self.ensure_topic(topic, partitions, 1).await?;
        let messages: Vec<OutgoingMessage> = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(|line| OutgoingMessage::new(None, line.as_bytes().to_vec()))
            .collect();
        let count = messages.len();
        self.publish(topic, messages).await?;
        Ok(count)
    }

    /// Seed `topic` from a newline-delimited file.
    pub async fn seed_from_file(
        &self,
        topic: &str,
        partitions: i32,
        path: &Path,
    ) -> anyhow::Result<usize> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
        let count = self
            .seed_lines(topic, partitions, &text)
            .await
            .with_context(|| format!("Failed to seed topic '{topic}'"))?;
        info!("Seeded {} message(s) into '{}' from {}", count, topic, path.display());
        Ok(count)
    }

    /// Every message of `topic`, partition by partition.
    pub async fn messages(&self, topic: &str) -> Vec<Message> {
        let topics = self.topics.read().await;
        let Some(partitions) = topics.get(topic) else {
            return Vec::new();
        };
        partitions
            .iter()
            .flat_map(|partition| {
                partition.iter().enumerate().map(|(offset, m)| Message {
                    key: m.key.clone(),
                    payload: m.payload.clone(),
                    offset: offset as i64,
                })
            })
            .collect()
    }

    pub async fn message_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|partitions| partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Message count of every topic, sorted by topic name.
    pub async fn topic_counts(&self) -> BTreeMap<String, usize> {
        self.topics
            .read()
            .await
            .iter()
            .map(|(topic, partitions)| (topic.clone(), partitions.iter().map(Vec::len).sum()))
            .collect()
    }

    pub async fn committed(&self, group: &str, topic: &str, partition: i32) -> Option<i64> {
        self.offsets
            .read()
            .await
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_topic(&self, topic: &str, partitions: i32, _replication: i32) -> Result<()> {
        let mut topics = self.topics.write().await;
        if !topics.contains_key(topic) {
            let count = partitions.max(1) as usize;
            debug!("Creating in-memory topic '{}' with {} partition(s)", topic, count);
            topics.insert(topic.to_string(), vec![Vec::new(); count]);
        }
        Ok(())
    }

    async fn partition_count(&self, topic: &str) -> Result<Option<i32>> {
        Ok(self
            .topics
            .read()
            .await
            .get(topic)
            .map(|partitions| partitions.len() as i32))
    }

    async fn fetch(
        &self,
        group: &str,
        topic: &str,
        partition: i32,
        max: usize,
    ) -> Result<Vec<Message>> {
        let start = self.committed(group, topic, partition).await.unwrap_or(0);
        let topics = self.topics.read().await;
        let partitions = topics
            .get(topic)
            .ok_or_else(|| TransportError::UnknownTopic(topic.to_string()))?;
        let messages = usize::try_from(partition)
            .ok()
            .and_then(|index| partitions.get(index))
            .ok_or_else(|| TransportError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })?;

        Ok(messages
            .iter()
            .enumerate()
            .skip(start.max(0) as usize)
            .take(max)
            .map(|(offset, m)| Message {
                key: m.key.clone(),
                payload: m.payload.clone(),
                offset: offset as i64,
            })
            .collect())
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: i32,
        next_offset: i64,
    ) -> Result<()> {
        self.offsets.write().await.insert(
            (group.to_string(), topic.to_string(), partition),
            next_offset,
        );
        Ok(())
    }

    async fn publish(&self, topic: &str, messages: Vec<OutgoingMessage>) -> Result<()> {
        let mut topics = self.topics.write().await;
        let partitions = topics
            .get_mut(topic)
            .ok_or_else(|| TransportError::UnknownTopic(topic.to_string()))?;
        let count = partitions.len();
        for message in messages {
            let index = self.partition_for(message.key.as_deref(), count);
            partitions[index].push(StoredMessage {
                key: message.key,
                payload: message.payload,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_respects_committed_offset_per_group() {
        let transport = MemoryTransport::new();
        transport.seed_lines("logs", 1, "a\nb\n\nc\n").await.unwrap();

        let batch = transport.fetch("g1", "logs", 0, 2).await.unwrap();
        let payloads: Vec<&[u8]> = batch.iter().map(|m| m.payload.as_slice()).collect();
        assert_eq!(payloads, vec![b"a".as_slice(), b"b".as_slice()]);

        // Nothing committed yet: the same slice comes back.
        assert_eq!(transport.fetch("g1", "logs", 0, 2).await.unwrap(), batch);

        transport.commit("g1", "logs", 0, 2).await.unwrap();
        let rest = transport.fetch("g1", "logs", 0, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].offset, 2);

        // Another group starts from the beginning.
        assert_eq!(transport.fetch("g2", "logs", 0, 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_keyed_messages_share_a_partition() {
        let transport = MemoryTransport::new();
        transport.ensure_topic("events", 4, 1).await.unwrap();
        let messages = (0..8)
            .map(|i| OutgoingMessage::new(Some(b"host-1".to_vec()), vec![i]))
            .collect();
        transport.publish("events", messages).await.unwrap();

        let mut non_empty = 0;
        for partition in 0..4 {
            if !transport.fetch("g", "events", partition, 100).await.unwrap().is_empty() {
                non_empty += 1;
            }
        }
        assert_eq!(non_empty, 1);
        assert_eq!(transport.message_count("events").await, 8);
    }

    #[tokio::test]
    async fn test_unknown_topic_and_partition() {
        let transport = MemoryTransport::new();
        assert_eq!(transport.partition_count("missing").await.unwrap(), None);
        assert!(matches!(
            transport.fetch("g", "missing", 0, 1).await,
            Err(TransportError::UnknownTopic(_))
        ));
        transport.ensure_topic("logs", 2, 1).await.unwrap();
        transport.ensure_topic("logs", 8, 1).await.unwrap();
        assert_eq!(transport.partition_count("logs").await.unwrap(), Some(2));
        assert!(matches!(
            transport.fetch("g", "logs", 5, 1).await,
            Err(TransportError::UnknownPartition { partition: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_seed_from_file_and_counts() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("seed.log");
        std::fs::write(&path, "one\r\ntwo\nthree\n").unwrap();

        let transport = MemoryTransport::new();
        let seeded = transport.seed_from_file("raw", 2, &path).await.unwrap();
        assert_eq!(seeded, 3);
        transport.ensure_topic("empty", 1, 1).await.unwrap();

        let counts = transport.topic_counts().await;
        assert_eq!(counts.get("raw"), Some(&3));
        assert_eq!(counts.get("empty"), Some(&0));
        assert!(transport
            .seed_from_file("raw", 2, &dir.path().join("missing.log"))
            .await
            .is_err());
    }
}
