//! The declarative per-class defaults and fluent scheduling surface user
//! job structs implement.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{LoadJobError, SchedulingError};
use crate::record::{JobRecord, ScheduleSpec};
use crate::registry::{JobConstructor, JobRegistry, RunnableJob};
use crate::scheduler;

/// A user-defined unit of deferred work.
///
/// Implementors are plain structs whose fields are the job's arguments.
/// They are serialized into `JobRecord::args` on schedule and
/// deserialized back out before `perform` runs, exactly the role `args`
/// plays in the reference job model. `handler_name` defaults to the
/// struct's type name, following the teacher's job-identity convention.
#[async_trait]
pub trait Job: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    /// Run the job body. Any `Err` causes `JobStore::failure` to be
    /// invoked with this job's `max_attempts`.
    async fn perform(&self) -> anyhow::Result<()>;

    /// Named queue workers filter on. Defaults to `"default"`.
    fn queue() -> &'static str {
        "default"
    }

    /// 1 (most urgent) through 100 (least urgent). Defaults to 50.
    fn priority() -> i32 {
        50
    }

    /// Retries allowed before a failure is terminal. Defaults to 24.
    fn max_attempts() -> i32 {
        24
    }

    /// Handler name persisted in `JobRecord::handler` and used as the
    /// `JobRegistry` lookup key. Defaults to the struct's type name.
    fn handler_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Shorthand for `Job::set(JobOptions::default()).perform_later(self)`.
    async fn perform_later(&self) -> Result<JobRecord, SchedulingError> {
        JobOptions::defaults_for::<Self>()
            .perform_later(self)
            .await
    }

    /// Instantiate and invoke in-process immediately; no adapter
    /// interaction, no persisted record.
    async fn perform_now(&self) -> anyhow::Result<()> {
        self.perform().await
    }

    /// Start a fluent builder layered over this job's class defaults.
    fn set() -> JobOptions {
        JobOptions::defaults_for::<Self>()
    }
}

/// Register `T` under its `handler_name()` so the [`Executor`](crate::executor::Executor)
/// can resolve and construct it from a claimed record's persisted args.
pub fn register_job<T: Job>(registry: &JobRegistry) {
    let constructor: JobConstructor = Arc::new(|args| {
        serde_json::from_value::<T>(args)
            .map(|job| Arc::new(TypedJob(job)) as Arc<dyn RunnableJob>)
            .map_err(|_| LoadJobError::JobExportNotFound {
                handler: T::handler_name().to_string(),
            })
    });
    registry.register(T::handler_name(), constructor);
}

struct TypedJob<T>(T);

#[async_trait]
impl<T: Job> RunnableJob for TypedJob<T> {
    async fn perform(&self, _args: serde_json::Value) -> anyhow::Result<()> {
        self.0.perform().await
    }

    fn max_attempts(&self) -> i32 {
        T::max_attempts()
    }
}

/// Layers scheduling overrides over a job class's static defaults. `wait`
/// and `waitUntil` are mutually exclusive; when both are set,
/// `wait_until` wins (see Open Questions in DESIGN.md).
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    queue: Option<String>,
    priority: Option<i32>,
    wait: Option<chrono::Duration>,
    wait_until: Option<DateTime<Utc>>,
    handler: Option<&'static str>,
}

impl JobOptions {
    fn defaults_for<T: Job>() -> Self {
        Self {
            queue: Some(T::queue().to_string()),
            priority: Some(T::priority()),
            wait: None,
            wait_until: None,
            handler: Some(T::handler_name()),
        }
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn wait(mut self, wait: chrono::Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn wait_until(mut self, at: DateTime<Utc>) -> Self {
        self.wait_until = Some(at);
        self
    }

    /// `runAt` is `wait_until` if present, else `now + wait` if present,
    /// else `now`.
    fn run_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(at) = self.wait_until {
            at
        } else if let Some(wait) = self.wait {
            now + wait
        } else {
            now
        }
    }

    /// Serialize `job`, resolve the configured adapter, and persist a new
    /// `JobRecord` reflecting this builder's overrides (or the job
    /// class's defaults for anything left unset).
    pub async fn perform_later<T: Job>(&self, job: &T) -> Result<JobRecord, SchedulingError> {
        let args = serde_json::to_value(job)
            .map_err(|e| SchedulingError(anyhow::Error::new(e)))?;
        let spec = ScheduleSpec {
            handler: self
                .handler
                .map(str::to_string)
                .unwrap_or_else(|| T::handler_name().to_string()),
            args,
            queue: self.queue.clone().unwrap_or_else(|| T::queue().to_string()),
            priority: self.priority.unwrap_or_else(T::priority),
            run_at: self.run_at(Utc::now()),
        };
        scheduler::schedule(spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JobStore;
    use async_trait::async_trait as _async_trait;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Serialize, Deserialize)]
    struct WelcomeJob {
        email: String,
    }

    #[_async_trait]
    impl Job for WelcomeJob {
        async fn perform(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        scheduled: Mutex<Vec<ScheduleSpec>>,
    }

    #[_async_trait]
    impl JobStore for RecordingStore {
        async fn schedule(&self, spec: ScheduleSpec) -> anyhow::Result<JobRecord> {
            let now = Utc::now();
            let record = JobRecord {
                id: uuid::Uuid::new_v4(),
                handler: spec.handler.clone(),
                args: spec.args.clone(),
                queue: spec.queue.clone(),
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
            self.scheduled.lock().unwrap().push(spec);
            Ok(record)
        }
        async fn find(
            &self,
            _options: crate::store::FindOptions,
        ) -> anyhow::Result<Option<JobRecord>> {
            unimplemented!()
        }
        async fn success(&self, _record: &JobRecord) -> anyhow::Result<()> {
            unimplemented!()
        }
        async fn failure(
            &self,
            _record: &JobRecord,
            _error: &str,
            _max_attempts: i32,
        ) -> anyhow::Result<()> {
            unimplemented!()
        }
        async fn clear(&self) -> anyhow::Result<()> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn perform_later_uses_class_defaults() {
        let _guard = scheduler::test_lock();
        scheduler::configure_for_test(Arc::new(RecordingStore::default()));

        let job = WelcomeJob {
            email: "a@x".to_string(),
        };
        let record = job.perform_later().await.unwrap();

        assert_eq!(record.queue, "default");
        assert_eq!(record.priority, 50);
        assert_eq!(record.attempts, 0);
        assert!(record.run_at.unwrap() <= Utc::now());
    }

    #[tokio::test]
    async fn set_overrides_queue_and_priority() {
        let _guard = scheduler::test_lock();
        scheduler::configure_for_test(Arc::new(RecordingStore::default()));

        let job = WelcomeJob {
            email: "a@x".to_string(),
        };
        let record = WelcomeJob::set()
            .queue("mailers")
            .priority(10)
            .perform_later(&job)
            .await
            .unwrap();

        assert_eq!(record.queue, "mailers");
        assert_eq!(record.priority, 10);
    }

    #[tokio::test]
    async fn wait_until_wins_over_wait_when_both_set() {
        let _guard = scheduler::test_lock();
        scheduler::configure_for_test(Arc::new(RecordingStore::default()));

        let job = WelcomeJob {
            email: "a@x".to_string(),
        };
        let far_future = Utc::now() + chrono::Duration::days(365 * 80);
        let record = WelcomeJob::set()
            .wait(chrono::Duration::seconds(5))
            .wait_until(far_future)
            .perform_later(&job)
            .await
            .unwrap();

        assert_eq!(record.run_at.unwrap(), far_future);
    }

    #[tokio::test]
    async fn wait_computes_run_at_relative_to_now() {
        let _guard = scheduler::test_lock();
        scheduler::configure_for_test(Arc::new(RecordingStore::default()));

        let before = Utc::now();
        let job = WelcomeJob {
            email: "a@x".to_string(),
        };
        let record = WelcomeJob::set()
            .wait(chrono::Duration::seconds(30))
            .perform_later(&job)
            .await
            .unwrap();

        let delta = record.run_at.unwrap() - before;
        assert!(delta.num_seconds() >= 29 && delta.num_seconds() <= 31);
    }

    #[tokio::test]
    async fn perform_now_does_not_touch_the_adapter() {
        let _guard = scheduler::test_lock();
        scheduler::configure_for_test(Arc::new(RecordingStore::default()));
        let job = WelcomeJob {
            email: "a@x".to_string(),
        };
        job.perform_now().await.unwrap();
    }
}
