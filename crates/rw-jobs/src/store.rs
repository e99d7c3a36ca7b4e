//! The Adapter contract: the sole gateway to durable job state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::record::{JobRecord, ScheduleSpec};

/// Parameters for a single claim attempt.
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Identity recorded in `locked_by`, e.g. a worker process title.
    pub process_name: String,
    /// A lock older than this is considered abandoned and reclaimable.
    pub max_runtime: chrono::Duration,
    /// Restrict the claim to one queue; `None` claims across all queues.
    pub queue: Option<String>,
}

/// The durable queue. Every mutation of job state passes through one of
/// these five operations; there is no update path outside them.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new [`JobRecord`] and return it.
    async fn schedule(&self, spec: ScheduleSpec) -> anyhow::Result<JobRecord>;

    /// Atomically claim one runnable record for `options.process_name`.
    ///
    /// Implements the claim algorithm of the adapter contract: select the
    /// highest-priority, oldest-eligible candidate, then apply the same
    /// freshness predicate in a conditional update so two concurrent
    /// callers can never both claim the same record. Returns `None` if no
    /// record is currently eligible.
    async fn find(&self, options: FindOptions) -> anyhow::Result<Option<JobRecord>>;

    /// Remove a successfully completed record from the store.
    async fn success(&self, record: &JobRecord) -> anyhow::Result<()>;

    /// Record a failure: reschedule with backoff, or mark terminally
    /// failed once `max_attempts` is exhausted.
    async fn failure(
        &self,
        record: &JobRecord,
        error: &str,
        max_attempts: i32,
    ) -> anyhow::Result<()>;

    /// Delete all records. Intended for tests and administrative resets.
    async fn clear(&self) -> anyhow::Result<()>;
}

/// `backoffMilliseconds(n) = 1000 * n^4`.
///
/// A quartic, not exponential, curve: n=1 -> 1_000ms, n=2 -> 16_000ms,
/// n=3 -> 81_000ms, n=20 -> 160_000_000ms. At the default cap of 24
/// attempts the final interval is roughly 3.8 days.
pub fn backoff_millis(attempt: i32) -> i64 {
    let n = attempt as i64;
    1000 * n * n * n * n
}

/// Compute the `run_at` a retryable failure should be rescheduled to.
pub fn backoff_run_at(now: DateTime<Utc>, attempt: i32) -> DateTime<Utc> {
    now + chrono::Duration::milliseconds(backoff_millis(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_quartic_formula() {
        assert_eq!(backoff_millis(0), 0);
        assert_eq!(backoff_millis(1), 1_000);
        assert_eq!(backoff_millis(2), 16_000);
        assert_eq!(backoff_millis(3), 81_000);
        assert_eq!(backoff_millis(20), 160_000_000);
    }

    #[test]
    fn default_cap_final_interval_is_about_3_8_days() {
        let ms = backoff_millis(24);
        let days = ms as f64 / 1000.0 / 60.0 / 60.0 / 24.0;
        assert!((3.5..4.2).contains(&days), "got {days} days");
    }

    #[test]
    fn backoff_is_strictly_increasing_across_random_attempt_counts() {
        for _ in 0..50 {
            let n = fastrand::i32(1..24);
            assert!(backoff_millis(n) < backoff_millis(n + 1));
        }
    }
}
