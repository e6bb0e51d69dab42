//! One configured stream: its stages, channels and the partition transform.

use std::sync::Arc;

use anyhow::Context;
use logpipe_codec::RecordSerializer;
use logpipe_processor::{ConfigurationError, Stage};
use logpipe_record::dictionary::{DEFAULT_RECORD_TYPE, RECORD_KEY, RECORD_VALUE};
use logpipe_record::{ErrorKind, FieldValue, Record};
use tracing::{debug, info};

use crate::config::settings::{StreamSettings, INPUT_SERIALIZER};
use crate::transport::{Message, OutgoingMessage, Transport};

/// Worker identity of the single task a source stream runs per cycle.
pub const SOURCE_WORKER: &str = "source";

/// What a partition task reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskInput {
    /// One partition of an input topic.
    Partition { topic: String, partition: i32 },
    /// No input: the first stage produces the records.
    Source,
}

impl TaskInput {
    /// Worker id used for LOCAL state and in logs.
    pub fn worker(&self) -> String {
        match self {
            TaskInput::Partition { topic, partition } => format!("{topic}-{partition}"),
            TaskInput::Source => SOURCE_WORKER.to_string(),
        }
    }
}

/// Outcome of one partition task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    pub stream: String,
    pub worker: String,
    pub input: usize,
    pub output: usize,
    pub errors: usize,
    /// A stage asked to back off
    pub yielded: bool,
}

/// Stages and channels of one stream block.
pub struct StreamPipeline {
    name: String,
    settings: StreamSettings,
    stages: Vec<Stage>,
    input: Arc<dyn RecordSerializer>,
    output: Arc<dyn RecordSerializer>,
    error: Arc<dyn RecordSerializer>,
}

impl StreamPipeline {
    /// Assemble a stream, checking that its stage kinds fit its input.
    ///
    /// A raw input (`input.serializer: none`) starts with a parser; parsers
    /// are accepted nowhere else.
    pub fn new(
        name: impl Into<String>,
        settings: StreamSettings,
        stages: Vec<Stage>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let mut problems = ConfigurationError::new();

        if stages.is_empty() {
            problems.push(&name, "processors", "a stream needs at least one stage");
        }
        let raw_input = !settings.is_source() && settings.input_serializer.is_raw();
        for (position, stage) in stages.iter().enumerate() {
            let parser_expected = position == 0 && raw_input;
            if stage.is_parser() && !parser_expected {
                let explanation = if settings.is_source() {
                    "a source stream cannot start with a parser".to_string()
                } else if position == 0 {
                    format!(
                        "parser '{}' needs raw input, set {} to none",
                        stage.name(),
                        INPUT_SERIALIZER
                    )
                } else {
                    format!("parser '{}' must be the first stage", stage.name())
                };
                problems.push(&name, "processors", explanation);
            } else if !stage.is_parser() && parser_expected {
                problems.push(
                    &name,
                    "processors",
                    format!(
                        "raw input must be parsed first, '{}' is a {}",
                        stage.name(),
                        stage.kind()
                    ),
                );
            }
        }
        problems.into_result()?;

        Ok(Self {
            input: settings.input_serializer.build(),
            output: settings.output_serializer.build(),
            error: settings.error_serializer.build(),
            name,
            settings,
            stages,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Turn fetched messages into records, through the parser stage for raw
    /// input or the input serializer otherwise.
    ///
    /// Returns the records and the index of the first stage still to run.
    async fn decode(
        &self,
        messages: &[Message],
        worker: &str,
    ) -> anyhow::Result<(Vec<Record>, usize)> {
        let Some(first) = self.stages.first() else {
            return Ok((Vec::new(), 0));
        };

        if first.is_parser() {
            let ctx = first.context().for_worker(worker);
            let mut records = Vec::new();
            for message in messages {
                let parsed = first
                    .parse(&ctx, message.key.as_deref(), &message.payload)
                    .await
                    .with_context(|| format!("Parser '{}' failed", first.identifier()))?;
                records.extend(parsed);
            }
            return Ok((records, 1));
        }

        let records = messages
            .iter()
            .map(|message| match self.input.deserialize(&message.payload) {
                Ok(record) => record,
                Err(e) => {
                    let mut record = Record::new(DEFAULT_RECORD_TYPE);
                    if let Some(key) = &message.key {
                        record.set(RECORD_KEY, FieldValue::Bytes(key.clone()));
                    }
                    record.set(RECORD_VALUE, FieldValue::Bytes(message.payload.clone()));
                    record.add_error(
                        ErrorKind::Parsing,
                        format!("Cannot decode {} message: {e}", self.input.name()),
                    );
                    record
                }
            })
            .collect();
        Ok((records, 0))
    }

    /// Run the chain over one partition's micro-batch and publish the result.
    ///
    /// Offsets are committed only after every record was published.
    pub async fn run_partition(
        &self,
        transport: &dyn Transport,
        group: &str,
        input: &TaskInput,
        max_records: usize,
    ) -> anyhow::Result<PartitionReport> {
        let worker = input.worker();
        let messages = match input {
            TaskInput::Partition { topic, partition } => transport
                .fetch(group, topic, *partition, max_records)
                .await
                .with_context(|| format!("Failed to fetch {topic}/{partition}"))?,
            TaskInput::Source => Vec::new(),
        };

        let mut report = PartitionReport {
            stream: self.name.clone(),
            worker: worker.clone(),
            input: messages.len(),
            ..Default::default()
        };
        if messages.is_empty() && matches!(input, TaskInput::Partition { .. }) {
            return Ok(report);
        }

        let (mut records, start) = self.decode(&messages, &worker).await?;
        for stage in &self.stages[start..] {
            let ctx = stage.context().for_worker(&worker);
            records = stage
                .process(&ctx, records)
                .await
                .with_context(|| format!("Processor '{}' failed", stage.identifier()))?;
            if ctx.has_yielded() {
                debug!("Stage {} yielded on {}", stage.identifier(), worker);
                report.yielded = true;
            }
        }

        let (failed, succeeded): (Vec<Record>, Vec<Record>) =
            records.into_iter().partition(Record::has_errors);
        let mut outgoing = Vec::with_capacity(succeeded.len());
        let mut rejected = Vec::new();
        for mut record in succeeded {
            match self.output.serialize(&record) {
                Ok(payload) => outgoing.push(OutgoingMessage::new(record_key(&record), payload)),
                Err(e) => {
                    record.add_error(
                        ErrorKind::Processing,
                        format!("Cannot encode {} message: {e}", self.output.name()),
                    );
                    rejected.push(record);
                }
            }
        }

        let mut errors = Vec::new();
        for record in failed.iter().chain(&rejected) {
            let payload = self
                .error
                .serialize(record)
                .with_context(|| format!("Cannot encode error record {}", record.id()))?;
            errors.push(OutgoingMessage::new(record_key(record), payload));
        }

        report.output = outgoing.len();
        report.errors = errors.len();
        publish(transport, &self.settings.output_topics, outgoing).await?;
        publish(transport, &self.settings.error_topics, errors).await?;

        if let (TaskInput::Partition { topic, partition }, Some(last)) = (input, messages.last()) {
            transport
                .commit(group, topic, *partition, last.offset + 1)
                .await
                .with_context(|| format!("Failed to commit {topic}/{partition}"))?;
        }

        info!(
            "Stream {} [{}]: {} in, {} out, {} errors",
            self.name, worker, report.input, report.output, report.errors
        );
        Ok(report)
    }
}

async fn publish(
    transport: &dyn Transport,
    topics: &[String],
    messages: Vec<OutgoingMessage>,
) -> anyhow::Result<()> {
    if messages.is_empty() {
        return Ok(());
    }
    let sends = topics.iter().map(|topic| {
        let messages = messages.clone();
        async move {
            transport
                .publish(topic, messages)
                .await
                .with_context(|| format!("Failed to publish to '{topic}'"))
        }
    });
    futures::future::try_join_all(sends).await?;
    Ok(())
}

/// Partitioning key of an outgoing record.
fn record_key(record: &Record) -> Option<Vec<u8>> {
    match record.get(RECORD_KEY)? {
        FieldValue::Bytes(bytes) => Some(bytes.clone()),
        FieldValue::String(text) => Some(text.as_bytes().to_vec()),
        other => Some(other.to_display_string().into_bytes()),
    }
}
