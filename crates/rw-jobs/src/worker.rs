//! One Worker instance is one polling loop over a single queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::executor::Executor;
use crate::registry::JobRegistry;
use crate::store::{FindOptions, JobStore};

/// Default stale-lock threshold: how long a worker may hold a claim
/// before another worker is allowed to reclaim it.
pub const DEFAULT_MAX_RUNTIME: Duration = Duration::hours(4);
/// Default sleep between empty polls.
pub const DEFAULT_WAIT_TIME: StdDuration = StdDuration::from_secs(5);
/// Default retry cap before a job is marked terminally failed.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 24;

/// Construction parameters for a [`Worker`].
#[derive(Clone)]
pub struct WorkerConfig {
    /// Identity recorded in claimed records' `locked_by`.
    pub process_name: String,
    /// Restrict polling to one queue; `None` polls across all queues.
    pub queue: Option<String>,
    pub max_attempts: i32,
    pub max_runtime: Duration,
    pub wait_time: StdDuration,
    /// Exit once the queue is empty instead of sleeping and retrying.
    pub workoff: bool,
    /// Call `adapter.clear()` once and exit, ignoring everything else.
    pub clear: bool,
    /// Keep polling until told to stop. `workoff` overrides this once
    /// the queue drains.
    pub forever: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            process_name: "rw-jobs-worker".to_string(),
            queue: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_runtime: DEFAULT_MAX_RUNTIME,
            wait_time: DEFAULT_WAIT_TIME,
            workoff: false,
            clear: false,
            forever: true,
        }
    }
}

/// RUNNING -> (SIGINT) -> DRAINING -> STOPPED. SIGTERM short-circuits
/// straight to STOPPED without waiting for the in-flight job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Draining,
    Stopped,
}

/// A long-lived poll loop for a single queue.
///
/// Suspension points: awaiting adapter round-trips, awaiting the user's
/// `perform`, and the `wait_time` sleep between empty polls. `perform`'s
/// duration is unbounded from the engine's perspective; `max_runtime` is
/// the safety net, not a hard kill.
pub struct Worker {
    adapter: Arc<dyn JobStore>,
    registry: JobRegistry,
    config: WorkerConfig,
    forever: Arc<AtomicBool>,
    drain_notify: Arc<Notify>,
}

impl Worker {
    pub fn new(adapter: Arc<dyn JobStore>, registry: JobRegistry, config: WorkerConfig) -> Self {
        let forever = Arc::new(AtomicBool::new(config.forever));
        Self {
            adapter,
            registry,
            config,
            forever,
            drain_notify: Arc::new(Notify::new()),
        }
    }

    /// Run until the loop exits: on `clear`, after `workoff` empties the
    /// queue, or once draining finishes the in-flight job following
    /// SIGINT. SIGTERM returns immediately without waiting for any
    /// in-flight job to record an outcome.
    pub async fn run(&self) -> anyhow::Result<()> {
        if self.config.clear {
            self.adapter.clear().await?;
            return Ok(());
        }

        self.spawn_sigint_listener()?;
        let mut sigterm = signal(SignalKind::terminate())?;

        loop {
            if !self.forever.load(Ordering::SeqCst) {
                info!(process = %self.config.process_name, "draining complete, stopping");
                return Ok(());
            }

            let find_options = FindOptions {
                process_name: self.config.process_name.clone(),
                max_runtime: self.config.max_runtime,
                queue: self.config.queue.clone(),
            };

            let claimed = tokio::select! {
                biased;
                _ = sigterm.recv() => {
                    warn!(process = %self.config.process_name, "SIGTERM received, stopping immediately");
                    return Ok(());
                }
                result = self.adapter.find(find_options) => result?,
            };

            match claimed {
                Some(record) => {
                    let job_future =
                        Executor::new(self.adapter.clone(), record, self.registry.clone())
                            .with_fallback_max_attempts(self.config.max_attempts)
                            .perform();

                    tokio::select! {
                        biased;
                        _ = sigterm.recv() => {
                            warn!(process = %self.config.process_name, "SIGTERM received mid-job, stopping without recording outcome");
                            return Ok(());
                        }
                        _ = job_future => {}
                    }
                    // Back-to-back successful claims never sleep between them.
                }
                None => {
                    if self.config.workoff {
                        info!(process = %self.config.process_name, "queue empty, workoff exiting");
                        return Ok(());
                    }

                    tokio::select! {
                        biased;
                        _ = sigterm.recv() => {
                            warn!(process = %self.config.process_name, "SIGTERM received, stopping immediately");
                            return Ok(());
                        }
                        _ = self.drain_notify.notified() => {}
                        _ = tokio::time::sleep(self.config.wait_time) => {}
                    }
                }
            }
        }
    }

    fn spawn_sigint_listener(&self) -> anyhow::Result<()> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let forever = self.forever.clone();
        let notify = self.drain_notify.clone();
        let process_name = self.config.process_name.clone();
        tokio::spawn(async move {
            while sigint.recv().await.is_some() {
                info!(process = %process_name, "SIGINT received, draining after current job");
                forever.store(false, Ordering::SeqCst);
                notify.notify_waiters();
            }
        });
        Ok(())
    }

    /// Handle used by tests and supervisors to request a graceful drain
    /// without sending a real signal.
    pub fn request_drain(&self) {
        self.forever.store(false, Ordering::SeqCst);
        self.drain_notify.notify_waiters();
    }

    pub fn state(&self) -> WorkerState {
        if self.forever.load(Ordering::SeqCst) {
            WorkerState::Running
        } else {
            WorkerState::Draining
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{JobRecord, ScheduleSpec};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingStore {
        remaining: AtomicUsize,
        claims: Mutex<Vec<String>>,
    }

    impl CountingStore {
        fn with_jobs(n: usize) -> Self {
            Self {
                remaining: AtomicUsize::new(n),
                claims: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl JobStore for CountingStore {
        async fn schedule(&self, _spec: ScheduleSpec) -> anyhow::Result<JobRecord> {
            unimplemented!()
        }

        async fn find(&self, options: FindOptions) -> anyhow::Result<Option<JobRecord>> {
            self.claims
                .lock()
                .unwrap()
                .push(options.process_name.clone());
            let prev = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    if n == 0 {
                        None
                    } else {
                        Some(n - 1)
                    }
                });
            match prev {
                Ok(_) => {
                    let now = Utc::now();
                    Ok(Some(JobRecord {
                        id: uuid::Uuid::new_v4(),
                        handler: "NoopJob".to_string(),
                        args: serde_json::json!({}),
                        queue: "default".to_string(),
                        priority: 50,
                        run_at: Some(now),
                        locked_at: Some(now),
                        locked_by: Some(options.process_name),
                        attempts: 1,
                        last_error: None,
                        failed_at: None,
                        created_at: now,
                        updated_at: now,
                    }))
                }
                Err(_) => Ok(None),
            }
        }

        async fn success(&self, _record: &JobRecord) -> anyhow::Result<()> {
            Ok(())
        }

        async fn failure(
            &self,
            _record: &JobRecord,
            _error: &str,
            _max_attempts: i32,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn clear(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct NoopJob;

    #[async_trait]
    impl crate::registry::RunnableJob for NoopJob {
        async fn perform(&self, _args: serde_json::Value) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn workoff_exits_once_queue_is_empty() {
        let store = Arc::new(CountingStore::with_jobs(3));
        let registry = JobRegistry::new();
        registry.register(
            "NoopJob",
            Arc::new(|_args| Ok(Arc::new(NoopJob) as Arc<dyn crate::registry::RunnableJob>)),
        );

        let worker = Worker::new(
            store.clone(),
            registry,
            WorkerConfig {
                workoff: true,
                ..WorkerConfig::default()
            },
        );

        tokio::time::timeout(StdDuration::from_secs(5), worker.run())
            .await
            .expect("worker should exit promptly in workoff mode")
            .unwrap();

        // 3 successful claims, then one claim returning None before exit.
        assert_eq!(store.claims.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn clear_flag_calls_adapter_clear_and_returns() {
        let store = Arc::new(CountingStore::with_jobs(0));
        let registry = JobRegistry::new();
        let worker = Worker::new(
            store,
            registry,
            WorkerConfig {
                clear: true,
                ..WorkerConfig::default()
            },
        );

        tokio::time::timeout(StdDuration::from_secs(1), worker.run())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn defaults_match_spec() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_attempts, 24);
        assert_eq!(config.max_runtime, Duration::hours(4));
        assert_eq!(config.wait_time, StdDuration::from_secs(5));
    }

    #[test]
    fn request_drain_flips_state() {
        let store = Arc::new(CountingStore::with_jobs(0));
        let registry = JobRegistry::new();
        let worker = Worker::new(store, registry, WorkerConfig::default());
        assert_eq!(worker.state(), WorkerState::Running);
        worker.request_drain();
        assert_eq!(worker.state(), WorkerState::Draining);
    }
}
