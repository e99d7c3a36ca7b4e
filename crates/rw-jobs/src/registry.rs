//! Handler-name resolution: the core's substitute for dynamic filesystem
//! loading of user job classes (`loadJob(handler) -> JobClass`).

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::LoadJobError;

/// A user-defined unit of deferred work, resolved and invoked by the
/// [`crate::executor::Executor`].
///
/// Job structs are constructed fresh from their serialized `args` for
/// every execution; there is no persistent in-process job state.
#[async_trait]
pub trait RunnableJob: Send + Sync {
    /// Invoke the job body. Any `Err` is routed to `JobStore::failure` by
    /// the Executor; it is never re-raised to the Worker.
    async fn perform(&self, args: serde_json::Value) -> anyhow::Result<()>;

    /// Attempts allowed before a failure is terminal. Consulted by the
    /// Executor at failure time; the per-job-class value, when set,
    /// takes precedence over the Worker's own default.
    fn max_attempts(&self) -> i32 {
        24
    }
}

/// A type-erased constructor: given args, build a [`RunnableJob`] ready
/// to `perform`, or fail with `JobExportNotFound` if the args don't match
/// the shape the registered handler expects.
pub type JobConstructor =
    Arc<dyn Fn(serde_json::Value) -> Result<Arc<dyn RunnableJob>, LoadJobError> + Send + Sync>;

/// Maps handler names to constructors.
///
/// The spec describes `loadJob` as scanning a configured jobs directory;
/// Rust has no stable reflection over types on disk, so this registry is
/// populated explicitly at startup, typically by each `Job` impl
/// registering itself via [`JobRegistry::register`], analogous to the
/// teacher's `JobHandler::new` wrapping pattern.
#[derive(Clone, Default)]
pub struct JobRegistry {
    constructors: Arc<DashMap<String, JobConstructor>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `handler`. Re-registering the same
    /// name replaces the previous constructor (test hook; production
    /// startup code should register each handler exactly once).
    pub fn register(&self, handler: impl Into<String>, constructor: JobConstructor) {
        self.constructors.insert(handler.into(), constructor);
    }

    /// Resolve `handler` to a constructed job, or the load-error kinds
    /// the spec names: `JobNotFound` if nothing is registered under that
    /// name, `JobExportNotFound` if the registration exists but somehow
    /// fails to produce a job (reserved for constructors that validate
    /// their args shape before returning).
    pub fn load(&self, handler: &str) -> Result<JobConstructor, LoadJobError> {
        self.constructors
            .get(handler)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LoadJobError::JobNotFound {
                handler: handler.to_string(),
            })
    }
}
