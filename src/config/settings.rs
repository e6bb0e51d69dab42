//! Engine and stream properties, validated like component properties.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use logpipe_codec::SerializerKind;
use logpipe_processor::{
    parse_duration, validate_properties, validators, ConfigurationError, ProcessContext,
    PropertyDescriptor, ValidationResult, Validator,
};

pub const BATCH_INTERVAL: &str = "batch.interval";
pub const MAX_RECORDS_PER_PARTITION: &str = "max.records.per.partition";
pub const TASK_MAX_FAILURES: &str = "task.max.failures";
pub const TASK_FAILURES_VALIDITY_WINDOW: &str = "task.failures.validity.window";
pub const TOPICS_AUTO_CREATE: &str = "topics.auto.create";
pub const TOPICS_DEFAULT_PARTITIONS: &str = "topics.default.partitions";
pub const TOPICS_DEFAULT_REPLICATION_FACTOR: &str = "topics.default.replication.factor";
pub const CONSUMER_GROUP: &str = "consumer.group";
pub const WORKER_THREADS: &str = "worker.threads";
pub const STATE_DIRECTORY: &str = "state.directory";
pub const TIMEOUT: &str = "timeout";
pub const KAFKA_BROKERS: &str = "kafka.brokers";

pub const INPUT_TOPICS: &str = "input.topics";
pub const OUTPUT_TOPICS: &str = "output.topics";
pub const ERROR_TOPICS: &str = "error.topics";
pub const INPUT_SERIALIZER: &str = "input.serializer";
pub const OUTPUT_SERIALIZER: &str = "output.serializer";
pub const ERROR_SERIALIZER: &str = "error.serializer";

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Descriptors of the engine block's configuration.
pub fn engine_properties() -> Vec<PropertyDescriptor> {
    vec![
        PropertyDescriptor::new(BATCH_INTERVAL)
            .description("Time between two micro-batch cycles")
            .default_value("2s")
            .validator(validators::time_period())
            .validator(positive_period()),
        PropertyDescriptor::new(MAX_RECORDS_PER_PARTITION)
            .description("Maximum number of messages read from one partition per cycle")
            .default_value("1000")
            .validator(validators::positive_integer()),
        PropertyDescriptor::new(TASK_MAX_FAILURES)
            .description("Attempts a partition task gets before the run fails")
            .default_value("4")
            .validator(validators::positive_integer()),
        PropertyDescriptor::new(TASK_FAILURES_VALIDITY_WINDOW)
            .description("Window in which task failures count towards the budget, 0 for no limit")
            .default_value("1 min")
            .validator(validators::time_period()),
        PropertyDescriptor::new(TOPICS_AUTO_CREATE)
            .description("Create missing topics on first use")
            .default_value("true")
            .validator(validators::boolean()),
        PropertyDescriptor::new(TOPICS_DEFAULT_PARTITIONS)
            .description("Partition count of auto-created topics")
            .default_value("4")
            .validator(validators::positive_integer()),
        PropertyDescriptor::new(TOPICS_DEFAULT_REPLICATION_FACTOR)
            .description("Replication factor of auto-created topics")
            .default_value("1")
            .validator(validators::positive_integer()),
        PropertyDescriptor::new(CONSUMER_GROUP)
            .description("Consumer group used to track input offsets")
            .default_value("logpipe")
            .validator(validators::non_empty()),
        PropertyDescriptor::new(WORKER_THREADS)
            .description("Partition tasks running at the same time")
            .default_value(default_worker_threads().to_string())
            .validator(validators::positive_integer()),
        PropertyDescriptor::new(STATE_DIRECTORY)
            .description("Directory of the filesystem state store, in memory when unset")
            .validator(validators::non_empty()),
        PropertyDescriptor::new(TIMEOUT)
            .description("Stop the engine after this period; runs until interrupted when unset")
            .validator(validators::time_period()),
        PropertyDescriptor::new(KAFKA_BROKERS)
            .description("Bootstrap servers, required in cluster mode")
            .validator(validators::non_empty()),
    ]
}

/// Descriptors of a stream block's configuration.
pub fn stream_properties() -> Vec<PropertyDescriptor> {
    vec![
        PropertyDescriptor::new(INPUT_TOPICS)
            .description("Comma separated input topics; a stream without input is a source stream")
            .validator(validators::non_empty()),
        PropertyDescriptor::new(OUTPUT_TOPICS)
            .description("Comma separated topics receiving records without errors")
            .required(true)
            .validator(validators::non_empty()),
        PropertyDescriptor::new(ERROR_TOPICS)
            .description("Comma separated topics receiving records with errors")
            .required(true)
            .validator(validators::non_empty()),
        PropertyDescriptor::new(INPUT_SERIALIZER)
            .description("Encoding of input messages; none hands raw bytes to a parser")
            .default_value("none"),
        PropertyDescriptor::new(OUTPUT_SERIALIZER)
            .description("Encoding of output messages")
            .default_value("json"),
        PropertyDescriptor::new(ERROR_SERIALIZER)
            .description("Encoding of error messages")
            .default_value("json"),
    ]
}

fn positive_period() -> Validator {
    Arc::new(|subject: &str, input: &str| match parse_duration(input) {
        Ok(period) if period.is_zero() => {
            ValidationResult::invalid(subject, Some(input), "must be greater than zero")
        }
        _ => ValidationResult::valid(subject, input),
    })
}

/// Validate `properties` and wrap them so typed getters see defaults.
fn resolve(
    identifier: &str,
    kind: &str,
    descriptors: Vec<PropertyDescriptor>,
    properties: &HashMap<String, String>,
) -> Result<ProcessContext, ConfigurationError> {
    let (problems, _) = validate_properties(identifier, &descriptors, |_| None, properties);
    problems.into_result()?;
    Ok(ProcessContext::new(
        identifier,
        kind,
        descriptors,
        Vec::new(),
        properties.clone(),
    ))
}

/// Validated engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub batch_interval: Duration,
    pub max_records_per_partition: usize,
    pub task_max_failures: usize,
    pub task_failures_validity_window: Duration,
    pub topics_auto_create: bool,
    pub topics_default_partitions: i32,
    pub topics_default_replication_factor: i32,
    pub consumer_group: String,
    pub worker_threads: usize,
    pub state_directory: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub kafka_brokers: Option<String>,
}

impl EngineSettings {
    /// Validate an engine block's configuration map.
    pub fn from_properties(
        engine: &str,
        properties: &HashMap<String, String>,
    ) -> Result<Self, ConfigurationError> {
        let ctx = resolve(engine, "Engine", engine_properties(), properties)?;
        Ok(Self {
            batch_interval: ctx
                .property(BATCH_INTERVAL)
                .as_duration()
                .unwrap_or(Duration::from_secs(2)),
            max_records_per_partition: ctx
                .property(MAX_RECORDS_PER_PARTITION)
                .as_usize()
                .unwrap_or(1000),
            task_max_failures: ctx.property(TASK_MAX_FAILURES).as_usize().unwrap_or(4),
            task_failures_validity_window: ctx
                .property(TASK_FAILURES_VALIDITY_WINDOW)
                .as_duration()
                .unwrap_or(Duration::from_secs(60)),
            topics_auto_create: ctx.property(TOPICS_AUTO_CREATE).as_bool().unwrap_or(true),
            topics_default_partitions: ctx
                .property(TOPICS_DEFAULT_PARTITIONS)
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .unwrap_or(4),
            topics_default_replication_factor: ctx
                .property(TOPICS_DEFAULT_REPLICATION_FACTOR)
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .unwrap_or(1),
            consumer_group: ctx
                .property(CONSUMER_GROUP)
                .as_string()
                .unwrap_or_else(|| "logpipe".to_string()),
            worker_threads: ctx
                .property(WORKER_THREADS)
                .as_usize()
                .unwrap_or_else(default_worker_threads),
            state_directory: ctx.property(STATE_DIRECTORY).as_str().map(PathBuf::from),
            timeout: ctx.property(TIMEOUT).as_duration(),
            kafka_brokers: ctx.property(KAFKA_BROKERS).as_string(),
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_interval: Duration::from_secs(2),
            max_records_per_partition: 1000,
            task_max_failures: 4,
            task_failures_validity_window: Duration::from_secs(60),
            topics_auto_create: true,
            topics_default_partitions: 4,
            topics_default_replication_factor: 1,
            consumer_group: "logpipe".to_string(),
            worker_threads: default_worker_threads(),
            state_directory: None,
            timeout: None,
            kafka_brokers: None,
        }
    }
}

/// Validated stream configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub input_topics: Vec<String>,
    pub output_topics: Vec<String>,
    pub error_topics: Vec<String>,
    pub input_serializer: SerializerKind,
    pub output_serializer: SerializerKind,
    pub error_serializer: SerializerKind,
}

impl StreamSettings {
    /// Validate a stream block's configuration map.
    pub fn from_properties(
        stream: &str,
        properties: &HashMap<String, String>,
    ) -> Result<Self, ConfigurationError> {
        let ctx = resolve(stream, "Stream", stream_properties(), properties)?;
        let serializer = |name: &str, fallback: &str| {
            SerializerKind::from_config(ctx.property(name).as_str().unwrap_or(fallback))
        };
        Ok(Self {
            input_topics: ctx.property(INPUT_TOPICS).as_list(),
            output_topics: ctx.property(OUTPUT_TOPICS).as_list(),
            error_topics: ctx.property(ERROR_TOPICS).as_list(),
            input_serializer: serializer(INPUT_SERIALIZER, "none"),
            output_serializer: serializer(OUTPUT_SERIALIZER, "json"),
            error_serializer: serializer(ERROR_SERIALIZER, "json"),
        })
    }

    /// A source stream has no input topic and runs its chain once per cycle.
    pub fn is_source(&self) -> bool {
        self.input_topics.is_empty()
    }

    /// Input, output and error topics, deduplicated in declaration order.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = Vec::new();
        for topic in self
            .input_topics
            .iter()
            .chain(&self.output_topics)
            .chain(&self.error_topics)
        {
            if !topics.contains(&topic.as_str()) {
                topics.push(topic);
            }
        }
        topics
    }
}
