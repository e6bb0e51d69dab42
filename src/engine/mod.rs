//! Micro-batch scheduler.
//!
//! Every cycle the engine makes sure the topics of each stream exist, then
//! fans one task out per input partition (or a single task for a source
//! stream) onto the [`WorkerPool`]. Streams run one after another; the
//! partitions of a stream run in parallel. A task that keeps failing past
//! the retry budget fails the run.

pub mod error;
pub mod pool;
pub mod retry;
pub mod stream;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use logpipe_processor::{ComponentRegistry, ConfigurationError, Stage};
use logpipe_state::{FilesystemStateStore, MemoryStateStore, StateManager, StateStore};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::pipeline::PipelineConfig;
use crate::config::settings::{EngineSettings, StreamSettings};
use crate::transport::Transport;

pub use error::{EngineError, Result};
pub use pool::WorkerPool;
pub use retry::{FailureTracker, RetryPolicy};
pub use stream::{PartitionReport, StreamPipeline, TaskInput};

/// State worker id of the engine itself, used for CLUSTER scope.
const DRIVER_WORKER: &str = "driver";

/// Totals of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub partitions: Vec<PartitionReport>,
}

impl CycleReport {
    pub fn input(&self) -> usize {
        self.partitions.iter().map(|p| p.input).sum()
    }

    pub fn output(&self) -> usize {
        self.partitions.iter().map(|p| p.output).sum()
    }

    pub fn errors(&self) -> usize {
        self.partitions.iter().map(|p| p.errors).sum()
    }

    /// Partition reports of one stream.
    pub fn stream<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PartitionReport> {
        self.partitions.iter().filter(move |p| p.stream == name)
    }
}

/// Why [`Engine::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Timeout,
    Signal,
}

pub struct Engine {
    name: String,
    run_id: Uuid,
    settings: EngineSettings,
    transport: Arc<dyn Transport>,
    streams: Vec<Arc<StreamPipeline>>,
    pool: WorkerPool,
    known_topics: HashSet<String>,
    /// Streams that yielded last cycle and sit the next one out
    backing_off: HashSet<String>,
    cycles: u64,
}

impl Engine {
    /// Build an engine with the state store named by `state.directory`,
    /// in memory when unset.
    pub async fn build(
        config: &PipelineConfig,
        registry: &ComponentRegistry,
        transport: Arc<dyn Transport>,
    ) -> Result<Engine> {
        let settings =
            EngineSettings::from_properties(&config.engine.name, &config.engine.configuration);
        let store: Arc<dyn StateStore> = match settings
            .as_ref()
            .ok()
            .and_then(|s| s.state_directory.clone())
        {
            Some(dir) => Arc::new(FilesystemStateStore::new(dir)),
            None => Arc::new(MemoryStateStore::default()),
        };
        Self::assemble(config, settings, registry, transport, store).await
    }

    /// Build an engine over a caller-provided state store.
    pub async fn build_with_state(
        config: &PipelineConfig,
        registry: &ComponentRegistry,
        transport: Arc<dyn Transport>,
        store: Arc<dyn StateStore>,
    ) -> Result<Engine> {
        let settings =
            EngineSettings::from_properties(&config.engine.name, &config.engine.configuration);
        Self::assemble(config, settings, registry, transport, store).await
    }

    /// Validate every block and build every stage, reporting all problems at once.
    async fn assemble(
        config: &PipelineConfig,
        settings: std::result::Result<EngineSettings, ConfigurationError>,
        registry: &ComponentRegistry,
        transport: Arc<dyn Transport>,
        store: Arc<dyn StateStore>,
    ) -> Result<Engine> {
        let engine = &config.engine;
        let mut problems = ConfigurationError::new();
        let settings = match settings {
            Ok(settings) => Some(settings),
            Err(e) => {
                problems.extend(e);
                None
            }
        };

        if engine.streams.is_empty() {
            problems.push(&engine.name, "streams", "at least one stream is required");
        }

        let mut names = HashSet::new();
        let mut streams = Vec::new();
        for stream in &engine.streams {
            let stream_id = format!("{}.{}", engine.name, stream.name);
            if !names.insert(stream.name.as_str()) {
                problems.push(&stream_id, "name", "duplicate stream name");
                continue;
            }

            let stream_settings =
                match StreamSettings::from_properties(&stream_id, &stream.configuration) {
                    Ok(s) => Some(s),
                    Err(e) => {
                        problems.extend(e);
                        None
                    }
                };

            let mut stage_names = HashSet::new();
            let mut stages = Vec::new();
            for component in &stream.processors {
                let identifier = format!("{}.{}", stream_id, component.name);
                if !stage_names.insert(component.name.as_str()) {
                    problems.push(&identifier, "name", "duplicate stage name");
                    continue;
                }
                let state =
                    StateManager::new(Arc::clone(&store), identifier.clone(), DRIVER_WORKER);
                match Stage::build(component, &identifier, registry, Some(state)).await {
                    Ok(stage) => stages.push(stage),
                    Err(e) => problems.extend(e),
                }
            }

            if let Some(stream_settings) = stream_settings {
                if stages.len() == stream.processors.len() {
                    match StreamPipeline::new(stream_id, stream_settings, stages) {
                        Ok(pipeline) => streams.push(Arc::new(pipeline)),
                        Err(e) => problems.extend(e),
                    }
                }
            }
        }

        problems.into_result()?;
        let Some(settings) = settings else {
            return Err(ConfigurationError::new().into());
        };

        let run_id = Uuid::new_v4();
        info!(
            "Built engine '{}' ({} stream(s), {} transport, run {})",
            engine.name,
            streams.len(),
            transport.name(),
            run_id
        );
        let pool = WorkerPool::new(
            settings.worker_threads,
            RetryPolicy::new(
                settings.task_max_failures,
                settings.task_failures_validity_window,
            ),
        );
        Ok(Engine {
            name: engine.name.clone(),
            run_id,
            settings,
            transport,
            streams,
            pool,
            known_topics: HashSet::new(),
            backing_off: HashSet::new(),
            cycles: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn streams(&self) -> &[Arc<StreamPipeline>] {
        &self.streams
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Create missing topics, or fail when auto-creation is off.
    async fn ensure_topics(&mut self, stream: &StreamPipeline) -> Result<()> {
        for topic in stream.settings().topics() {
            if self.known_topics.contains(topic) {
                continue;
            }
            if self.transport.partition_count(topic).await?.is_none() {
                if !self.settings.topics_auto_create {
                    return Err(EngineError::MissingTopic(topic.to_string()));
                }
                info!(
                    "Creating topic '{}' with {} partition(s)",
                    topic, self.settings.topics_default_partitions
                );
                self.transport
                    .ensure_topic(
                        topic,
                        self.settings.topics_default_partitions,
                        self.settings.topics_default_replication_factor,
                    )
                    .await?;
            }
            self.known_topics.insert(topic.to_string());
        }
        Ok(())
    }

    async fn stream_inputs(&self, stream: &StreamPipeline) -> Result<Vec<TaskInput>> {
        if stream.settings().is_source() {
            return Ok(vec![TaskInput::Source]);
        }
        let mut inputs = Vec::new();
        for topic in &stream.settings().input_topics {
            let partitions = self
                .transport
                .partition_count(topic)
                .await?
                .ok_or_else(|| EngineError::MissingTopic(topic.clone()))?;
            inputs.extend((0..partitions).map(|partition| TaskInput::Partition {
                topic: topic.clone(),
                partition,
            }));
        }
        Ok(inputs)
    }

    /// Run every stream once over the next micro-batch of each partition.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycles += 1;
        let mut report = CycleReport {
            cycle: self.cycles,
            partitions: Vec::new(),
        };

        for stream in self.streams.clone() {
            if self.backing_off.remove(stream.name()) {
                debug!("Stream {} backs off this cycle", stream.name());
                continue;
            }
            self.ensure_topics(&stream).await?;

            let tasks: Vec<_> = self
                .stream_inputs(&stream)
                .await?
                .into_iter()
                .map(|input| {
                    let name = format!("{}[{}]", stream.name(), input.worker());
                    let stream = Arc::clone(&stream);
                    let transport = Arc::clone(&self.transport);
                    let group = self.settings.consumer_group.clone();
                    let max_records = self.settings.max_records_per_partition;
                    let task = move || {
                        let stream = Arc::clone(&stream);
                        let transport = Arc::clone(&transport);
                        let group = group.clone();
                        let input = input.clone();
                        async move {
                            stream
                                .run_partition(transport.as_ref(), &group, &input, max_records)
                                .await
                        }
                    };
                    (name, task)
                })
                .collect();

            let partitions = self.pool.run_all(tasks).await?;
            if !partitions.is_empty() && partitions.iter().all(|p| p.yielded) {
                self.backing_off.insert(stream.name().to_string());
            }
            report.partitions.extend(partitions);
        }

        debug!(
            "Cycle {} of engine '{}': {} in, {} out, {} errors",
            report.cycle,
            self.name,
            report.input(),
            report.output(),
            report.errors()
        );
        Ok(report)
    }

    /// Run cycles every `batch.interval` until `shutdown` resolves or the
    /// configured timeout elapses. A cycle in flight is always completed.
    pub async fn run<S>(&mut self, shutdown: S) -> Result<Shutdown>
    where
        S: Future<Output = ()>,
    {
        let deadline = self.settings.timeout.map(|t| Instant::now() + t);
        let mut interval = tokio::time::interval(self.settings.batch_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Starting engine '{}' (run {}) every {:?}",
            self.name, self.run_id, self.settings.batch_interval
        );
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping engine '{}'", self.name);
                    return Ok(Shutdown::Signal);
                }
                _ = sleep_until(deadline) => {
                    info!("Timeout reached, stopping engine '{}'", self.name);
                    return Ok(Shutdown::Timeout);
                }
            }

            let report = self.run_cycle().await?;
            if report.errors() > 0 {
                warn!(
                    "Cycle {} routed {} record(s) to error topics",
                    report.cycle,
                    report.errors()
                );
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Timeout reached, stopping engine '{}'", self.name);
                return Ok(Shutdown::Timeout);
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
