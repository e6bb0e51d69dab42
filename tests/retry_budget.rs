//! Partition task retries against the configured failure budget.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use logpipe::config::parse_pipeline_str;
use logpipe::{Engine, EngineError, MemoryTransport};
use logpipe_processor::{
    ComponentRegistry, ConfigurableComponent, ProcessContext, Processor, PropertyDescriptor,
};
use logpipe_record::Record;

/// Fails its first `failures` calls, then passes records through.
struct FlakyProcessor {
    calls: Arc<AtomicUsize>,
    failures: usize,
}

impl ConfigurableComponent for FlakyProcessor {
    fn properties(&self) -> Vec<PropertyDescriptor> {
        Vec::new()
    }
}

#[async_trait]
impl Processor for FlakyProcessor {
    async fn process(
        &self,
        _ctx: &ProcessContext,
        records: Vec<Record>,
    ) -> anyhow::Result<Vec<Record>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            anyhow::bail!("backend unavailable (call {call})");
        }
        Ok(records)
    }
}

fn pipeline(max_failures: usize) -> String {
    format!(
        r#"
engine:
  name: retries
  configuration:
    task.max.failures: {max_failures}
    topics.default.partitions: 1
  streams:
    - name: lines
      configuration:
        input.topics: raw
        output.topics: out
        error.topics: errors
      processors:
        - name: wrap
          component: RawLineParser
        - name: flaky
          component: Flaky
"#
    )
}

/// Run one cycle where the flaky stage fails `failures` times.
async fn run_with_budget(
    max_failures: usize,
    failures: usize,
) -> (Arc<MemoryTransport>, Arc<AtomicUsize>, Result<usize, EngineError>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ComponentRegistry::standard();
    let counter = Arc::clone(&calls);
    registry.register_processor("Flaky", move || FlakyProcessor {
        calls: Arc::clone(&counter),
        failures,
    });

    let transport = Arc::new(MemoryTransport::new());
    transport.seed_lines("raw", 1, "a\nb\nc\n").await.unwrap();
    let config = parse_pipeline_str(&pipeline(max_failures)).unwrap();
    let mut engine = Engine::build(&config, &registry, transport.clone())
        .await
        .unwrap();

    let result = engine.run_cycle().await.map(|report| report.output());
    (transport, calls, result)
}

#[tokio::test]
async fn test_task_succeeds_within_budget() {
    // Fails twice, succeeds on the third attempt; three attempts allowed.
    let (transport, calls, result) = run_with_budget(3, 2).await;
    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(transport.message_count("out").await, 3);
    assert_eq!(transport.committed("logpipe", "raw", 0).await, Some(3));
}

#[tokio::test]
async fn test_task_fails_when_budget_is_too_small() {
    // Needs three attempts, only two allowed.
    let (transport, calls, result) = run_with_budget(2, 2).await;
    match result {
        Err(EngineError::TaskFailed { task, failures, source }) => {
            assert_eq!(task, "retries.lines[raw-0]");
            assert_eq!(failures, 2);
            assert!(format!("{source:#}").contains("backend unavailable (call 2)"));
        }
        other => panic!("expected a task failure, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport.message_count("out").await, 0);
    assert_eq!(transport.committed("logpipe", "raw", 0).await, None);
}

#[tokio::test]
async fn test_single_attempt_budget() {
    let (_, calls, result) = run_with_budget(1, 1).await;
    assert!(matches!(result, Err(EngineError::TaskFailed { failures: 1, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let (_, _, result) = run_with_budget(1, 0).await;
    assert_eq!(result.unwrap(), 3);
}
