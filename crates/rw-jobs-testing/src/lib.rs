//! An in-memory [`JobStore`](rw_jobs::JobStore) for unit tests and local
//! development, plus small fixtures shared across `rw-jobs`'s test suites.
//!
//! Unlike [`rw_jobs_postgres::PgJobStore`](../rw_jobs_postgres/struct.PgJobStore.html),
//! which claims rows with `FOR UPDATE SKIP LOCKED`, [`MemoryStore`] claims
//! by literally performing the optimistic read-then-write steps of the
//! claim algorithm: read the best candidate, re-check it is still
//! unclaimed, then write the lock. A single [`std::sync::Mutex`] makes the
//! two steps atomic here, but the code is structured so the "check, then
//! write, retry on conflict" shape stands on its own: a second adapter
//! exercising the same contract from a different angle.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rw_jobs::{backoff_run_at, FindOptions, JobRecord, JobStore, ScheduleSpec};
use uuid::Uuid;

/// An in-process, non-durable [`JobStore`]. Data lives only as long as the
/// value does; nothing survives a process restart.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, JobRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Number of records currently held, claimed or not.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot every record, for assertions in tests.
    pub fn snapshot(&self) -> Vec<JobRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }
}

/// Pick the best claimable candidate: unfailed, eligible by `run_at`,
/// either unlocked or locked past `stale_before`, matching `queue` if
/// given; ties broken by priority then run_at then id, mirroring the
/// `ORDER BY` in the Postgres adapter's claim query.
fn best_candidate<'a>(
    records: &'a HashMap<Uuid, JobRecord>,
    now: chrono::DateTime<Utc>,
    stale_before: chrono::DateTime<Utc>,
    queue: Option<&str>,
) -> Option<&'a JobRecord> {
    records
        .values()
        .filter(|r| r.failed_at.is_none())
        .filter(|r| r.run_at.map(|at| at <= now).unwrap_or(true))
        .filter(|r| r.locked_at.map(|at| at < stale_before).unwrap_or(true))
        .filter(|r| queue.map(|q| r.queue == q).unwrap_or(true))
        .min_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.run_at.cmp(&b.run_at))
                .then(a.id.cmp(&b.id))
        })
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn schedule(&self, spec: ScheduleSpec) -> Result<JobRecord> {
        let now = Utc::now();
        let record = JobRecord {
            id: Uuid::new_v4(),
            handler: spec.handler,
            args: spec.args,
            queue: spec.queue,
            priority: spec.priority,
            run_at: Some(spec.run_at),
            locked_at: None,
            locked_by: None,
            attempts: 0,
            last_error: None,
            failed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record)
    }

    /// Step 1: read the best candidate. Step 2: re-check it is still
    /// unclaimed (under the same lock, so this can never lose a race in
    /// this single-process implementation). Step 3: write the lock and
    /// bump `attempts`. Step 4: return the claimed record, or `None` if no
    /// candidate survived the re-check.
    async fn find(&self, options: FindOptions) -> Result<Option<JobRecord>> {
        let now = Utc::now();
        let stale_before = now - options.max_runtime;

        let mut records = self.records.lock().unwrap();
        let candidate_id = match best_candidate(&records, now, stale_before, options.queue.as_deref())
        {
            Some(r) => r.id,
            None => return Ok(None),
        };

        let record = records.get_mut(&candidate_id).expect("candidate_id came from this map");
        let still_claimable = record.failed_at.is_none()
            && record.run_at.map(|at| at <= now).unwrap_or(true)
            && record.locked_at.map(|at| at < stale_before).unwrap_or(true);
        if !still_claimable {
            return Ok(None);
        }

        record.locked_at = Some(now);
        record.locked_by = Some(options.process_name);
        record.attempts += 1;
        record.updated_at = now;

        Ok(Some(record.clone()))
    }

    async fn success(&self, record: &JobRecord) -> Result<()> {
        self.records.lock().unwrap().remove(&record.id);
        Ok(())
    }

    async fn failure(&self, record: &JobRecord, error: &str, max_attempts: i32) -> Result<()> {
        let now = Utc::now();
        let mut records = self.records.lock().unwrap();
        let Some(stored) = records.get_mut(&record.id) else {
            return Ok(());
        };

        stored.last_error = Some(error.to_string());
        stored.updated_at = now;

        if record.attempts < max_attempts {
            stored.run_at = Some(backoff_run_at(now, record.attempts));
            stored.locked_at = None;
            stored.locked_by = None;
        } else {
            stored.failed_at = Some(now);
            stored.run_at = None;
            stored.locked_at = None;
            stored.locked_by = None;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.records.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(handler: &str) -> ScheduleSpec {
        ScheduleSpec {
            handler: handler.to_string(),
            args: serde_json::json!({}),
            queue: "default".to_string(),
            priority: 50,
            run_at: Utc::now(),
        }
    }

    fn options(name: &str) -> FindOptions {
        FindOptions {
            process_name: name.to_string(),
            max_runtime: chrono::Duration::hours(4),
            queue: None,
        }
    }

    #[tokio::test]
    async fn schedule_then_find_claims_the_record() {
        let store = MemoryStore::new();
        let scheduled = store.schedule(spec("Job")).await.unwrap();

        let claimed = store.find(options("worker-1")).await.unwrap().unwrap();
        assert_eq!(claimed.id, scheduled.id);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.locked_by.as_deref(), Some("worker-1"));
    }

    #[tokio::test]
    async fn find_is_empty_once_no_candidate_qualifies() {
        let store = MemoryStore::new();
        assert!(store.find(options("worker-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_does_not_reclaim_a_fresh_lock() {
        let store = MemoryStore::new();
        store.schedule(spec("Job")).await.unwrap();
        store.find(options("worker-1")).await.unwrap().unwrap();

        assert!(store.find(options("worker-2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_lock_becomes_reclaimable() {
        let store = MemoryStore::new();
        store.schedule(spec("Job")).await.unwrap();
        let short = FindOptions {
            process_name: "worker-1".to_string(),
            max_runtime: chrono::Duration::milliseconds(0),
            queue: None,
        };
        let first = store.find(short.clone()).await.unwrap().unwrap();

        let reclaimed = store
            .find(FindOptions {
                process_name: "worker-2".to_string(),
                ..short
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reclaimed.id, first.id);
        assert_eq!(reclaimed.attempts, 2);
    }

    #[tokio::test]
    async fn success_removes_the_record() {
        let store = MemoryStore::new();
        store.schedule(spec("Job")).await.unwrap();
        let claimed = store.find(options("worker-1")).await.unwrap().unwrap();

        store.success(&claimed).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failure_reschedules_until_max_attempts_then_terminates() {
        let store = MemoryStore::new();
        store.schedule(spec("Job")).await.unwrap();
        let claimed = store.find(options("worker-1")).await.unwrap().unwrap();

        store.failure(&claimed, "boom", 5).await.unwrap();
        let retried = store.snapshot().into_iter().next().unwrap();
        assert!(retried.failed_at.is_none());
        assert!(retried.run_at.unwrap() > Utc::now());

        // Drive it to its last attempt and fail terminally.
        let mut current = retried;
        for _ in 0..4 {
            current.attempts += 1;
            store.failure(&current, "boom", 5).await.unwrap();
        }
        let terminal = store.snapshot().into_iter().next().unwrap();
        assert!(terminal.failed_at.is_some());
        assert!(terminal.run_at.is_none());
    }

    #[tokio::test]
    async fn find_honors_priority_over_insertion_order() {
        let store = MemoryStore::new();
        store
            .schedule(ScheduleSpec {
                priority: 50,
                ..spec("Low")
            })
            .await
            .unwrap();
        let urgent = store
            .schedule(ScheduleSpec {
                priority: 1,
                ..spec("Urgent")
            })
            .await
            .unwrap();

        let claimed = store.find(options("worker-1")).await.unwrap().unwrap();
        assert_eq!(claimed.id, urgent.id);
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let store = MemoryStore::new();
        store.schedule(spec("A")).await.unwrap();
        store.schedule(spec("B")).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.is_empty());
    }
}
