//! Retry budget of partition tasks.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// How many times a partition task may fail.
///
/// `max_failures` is the number of attempts a task gets: the failure that
/// brings the count of recent failures up to it is fatal. Only failures
/// younger than `validity_window` are counted; a zero window counts all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_failures: usize,
    pub validity_window: Duration,
}

impl RetryPolicy {
    pub fn new(max_failures: usize, validity_window: Duration) -> Self {
        Self {
            max_failures: max_failures.max(1),
            validity_window,
        }
    }

    /// Delay before the next attempt after `failures` failures.
    pub fn backoff(&self, failures: usize) -> Duration {
        let exponent = failures.saturating_sub(1).min(6) as u32;
        Duration::from_millis(10 * 2u64.pow(exponent))
    }

    pub fn tracker(&self) -> FailureTracker {
        FailureTracker {
            policy: *self,
            failures: VecDeque::new(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(60))
    }
}

/// Failures of one task.
#[derive(Debug)]
pub struct FailureTracker {
    policy: RetryPolicy,
    failures: VecDeque<Instant>,
}

impl FailureTracker {
    /// Record a failure at `now`; returns whether the task may run again.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.failures.push_back(now);
        if !self.policy.validity_window.is_zero() {
            while let Some(first) = self.failures.front() {
                if now.duration_since(*first) > self.policy.validity_window {
                    self.failures.pop_front();
                } else {
                    break;
                }
            }
        }
        self.failures.len() < self.policy.max_failures
    }

    /// Failures counted against the budget.
    pub fn failures(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_number_of_attempts() {
        let mut tracker = RetryPolicy::new(3, Duration::ZERO).tracker();
        let now = Instant::now();
        assert!(tracker.record_failure(now));
        assert!(tracker.record_failure(now));
        assert!(!tracker.record_failure(now));
        assert_eq!(tracker.failures(), 3);
    }

    #[test]
    fn test_single_attempt_budget() {
        let mut tracker = RetryPolicy::new(1, Duration::from_secs(60)).tracker();
        assert!(!tracker.record_failure(Instant::now()));
    }

    #[test]
    fn test_old_failures_leave_the_window() {
        let mut tracker = RetryPolicy::new(2, Duration::from_secs(10)).tracker();
        let start = Instant::now();
        assert!(tracker.record_failure(start));
        // The first failure is outside the window by now.
        assert!(tracker.record_failure(start + Duration::from_secs(11)));
        assert_eq!(tracker.failures(), 1);
        assert!(!tracker.record_failure(start + Duration::from_secs(12)));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(50), Duration::from_millis(640));
    }
}
