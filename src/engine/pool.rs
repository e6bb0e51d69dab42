//! Bounded parallel execution of partition tasks with retries.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, warn};

use super::error::{EngineError, Result};
use super::retry::RetryPolicy;

/// Runs tasks on the tokio runtime, at most `parallelism` at a time.
///
/// A task is a closure producing a fresh future per attempt. Failed or
/// panicking attempts are retried while the [`RetryPolicy`] allows; the
/// first task that exhausts its budget aborts the others.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl WorkerPool {
    pub fn new(parallelism: usize, retry: RetryPolicy) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(parallelism.max(1))),
            retry,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run every `(name, task)` pair and collect the results in completion order.
    pub async fn run_all<T, F, Fut>(&self, tasks: Vec<(String, F)>) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        let mut join_set: JoinSet<Result<T>> = JoinSet::new();

        for (name, task) in tasks {
            let semaphore = Arc::clone(&self.semaphore);
            let retry = self.retry;
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| EngineError::TaskPanicked(format!("Semaphore closed: {e}")))?;
                run_with_retry(&name, &task, retry).await
            });
        }

        let mut results = Vec::new();
        let mut first_error: Option<EngineError> = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(value)) if first_error.is_none() => results.push(value),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                        join_set.abort_all();
                    }
                }
                Err(join_err) if join_err.is_cancelled() && first_error.is_some() => {}
                Err(join_err) => {
                    join_set.abort_all();
                    return Err(EngineError::TaskPanicked(join_err.to_string()));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}

async fn run_with_retry<T, F, Fut>(name: &str, task: &F, retry: RetryPolicy) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut tracker = retry.tracker();
    loop {
        let attempt = AssertUnwindSafe(async { task().await })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(anyhow::anyhow!("panicked: {}", panic_message(&*panic)))
            });
        match attempt {
            Ok(value) => return Ok(value),
            Err(e) => {
                if tracker.record_failure(Instant::now()) {
                    warn!(
                        "Task {} failed (failure {} of {}), retrying: {:#}",
                        name,
                        tracker.failures(),
                        retry.max_failures,
                        e
                    );
                    tokio::time::sleep(retry.backoff(tracker.failures())).await;
                } else {
                    error!("Task {} failed {} time(s): {:#}", name, tracker.failures(), e);
                    return Err(EngineError::TaskFailed {
                        task: name.to_string(),
                        failures: tracker.failures(),
                        source: e,
                    });
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Attempt = futures::future::Ready<anyhow::Result<usize>>;

    /// Fails `failures_before_success` times, then returns the call number.
    fn flaky(
        failures_before_success: usize,
    ) -> (Arc<AtomicUsize>, impl Fn() -> Attempt + Send + Sync + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let task = move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= failures_before_success {
                futures::future::ready(Err(anyhow::anyhow!("attempt {call} failed")))
            } else {
                futures::future::ready(Ok(call))
            }
        };
        (calls, task)
    }

    #[tokio::test]
    async fn test_retried_within_budget() {
        let pool = WorkerPool::new(2, RetryPolicy::new(3, Duration::ZERO));
        let (calls, task) = flaky(2);
        let results = pool.run_all(vec![("p0".to_string(), task)]).await.unwrap();
        assert_eq!(results, vec![3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhausted_is_fatal() {
        let pool = WorkerPool::new(2, RetryPolicy::new(2, Duration::ZERO));
        let (calls, task) = flaky(2);
        let err = pool
            .run_all(vec![("logs/0".to_string(), task)])
            .await
            .unwrap_err();
        match err {
            EngineError::TaskFailed { task, failures, source } => {
                assert_eq!(task, "logs/0");
                assert_eq!(failures, 2);
                assert_eq!(source.to_string(), "attempt 2 failed");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_runs_every_task() {
        let pool = WorkerPool::new(1, RetryPolicy::default());
        let tasks: Vec<(String, _)> = (0..5)
            .map(|i| (format!("p{i}"), move || async move { Ok::<_, anyhow::Error>(i) }))
            .collect();
        let mut results = pool.run_all(tasks).await.unwrap();
        results.sort();
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_panic_counts_as_a_failure() {
        let pool = WorkerPool::new(1, RetryPolicy::new(2, Duration::ZERO));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let task = move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call == 1 {
                    panic!("corrupt batch");
                }
                Ok::<_, anyhow::Error>(call)
            }
        };
        let results = pool.run_all(vec![("p0".to_string(), task)]).await.unwrap();
        assert_eq!(results, vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_task_exhausts_budget() {
        let pool = WorkerPool::new(1, RetryPolicy::new(2, Duration::ZERO));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let task = move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call > 0 {
                    panic!("corrupt batch {call}");
                }
                Ok::<_, anyhow::Error>(call)
            }
        };
        let err = pool
            .run_all(vec![("logs/0".to_string(), task)])
            .await
            .unwrap_err();
        match err {
            EngineError::TaskFailed { failures, source, .. } => {
                assert_eq!(failures, 2);
                assert_eq!(source.to_string(), "panicked: corrupt batch 2");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
