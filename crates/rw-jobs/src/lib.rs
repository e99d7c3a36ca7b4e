//! # rw-jobs
//!
//! A durable, polling-based background job engine: user-defined job
//! classes are persisted as invocations in a transactional store and
//! executed with retry, backoff, locking, and priority ordering.
//!
//! ## Core concepts
//!
//! - [`record::JobRecord`]: one persisted row per scheduled invocation.
//! - [`store::JobStore`]: the Adapter, the sole gateway to durable
//!   state (`schedule`, `find`, `success`, `failure`, `clear`).
//! - [`executor::Executor`]: loads the user class for one claimed
//!   record, invokes it, and routes the outcome back through the
//!   adapter.
//! - [`worker::Worker`]: a long-lived poll loop over a single queue.
//! - [`job::Job`]: the trait user job structs implement, plus the
//!   fluent `set(...).perform_later(...)` scheduling surface.
//! - [`scheduler`]: the facade application code calls through. Resolves
//!   the process-wide configured adapter.
//!
//! ## Example
//!
//! ```ignore
//! use rw_jobs::{Job, JobRegistry, job::register_job, scheduler, Worker, WorkerConfig};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct WelcomeJob {
//!     email: String,
//! }
//!
//! #[async_trait::async_trait]
//! impl Job for WelcomeJob {
//!     async fn perform(&self) -> anyhow::Result<()> {
//!         println!("welcome, {}", self.email);
//!         Ok(())
//!     }
//! }
//!
//! # async fn run(store: Arc<dyn rw_jobs::JobStore>) -> anyhow::Result<()> {
//! scheduler::configure(store.clone());
//!
//! let registry = JobRegistry::new();
//! register_job::<WelcomeJob>(&registry);
//!
//! WelcomeJob { email: "a@x.com".into() }.perform_later().await?;
//!
//! let worker = Worker::new(store, registry, WorkerConfig::default());
//! worker.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod job;
pub mod record;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use error::{
    AdapterNotConfiguredError, ExecutorConstructionError, LoadJobError, PerformError,
    SchedulingError,
};
pub use executor::{Executor, ExecutorBuilder};
pub use job::{Job, JobOptions};
pub use record::{HandlerPayload, JobRecord, ScheduleSpec};
pub use registry::{JobConstructor, JobRegistry, RunnableJob};
pub use store::{backoff_millis, backoff_run_at, FindOptions, JobStore};
pub use worker::{Worker, WorkerConfig, WorkerState};

pub use async_trait::async_trait;
