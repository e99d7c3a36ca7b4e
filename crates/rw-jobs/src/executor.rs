//! Given one claimed [`JobRecord`], load the user class, invoke it, and
//! route the outcome back through the adapter.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::{ExecutorConstructionError, PerformError};
use crate::record::JobRecord;
use crate::registry::JobRegistry;
use crate::store::JobStore;

/// Stateless; built fresh for each claimed record.
pub struct Executor {
    adapter: Arc<dyn JobStore>,
    record: JobRecord,
    registry: JobRegistry,
    fallback_max_attempts: i32,
}

/// Builder enforcing the Executor's required collaborators at
/// construction time, mirroring the spec's `AdapterRequiredError` /
/// `JobRequiredError` programmer-error kinds rather than leaving them
/// unreachable behind Rust's type system.
#[derive(Default)]
pub struct ExecutorBuilder {
    adapter: Option<Arc<dyn JobStore>>,
    record: Option<JobRecord>,
    registry: Option<JobRegistry>,
}

impl ExecutorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adapter(mut self, adapter: Arc<dyn JobStore>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn record(mut self, record: JobRecord) -> Self {
        self.record = Some(record);
        self
    }

    pub fn registry(mut self, registry: JobRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<Executor, ExecutorConstructionError> {
        let adapter = self
            .adapter
            .ok_or(ExecutorConstructionError::AdapterRequired)?;
        let record = self.record.ok_or(ExecutorConstructionError::JobRequired)?;
        Ok(Executor {
            adapter,
            record,
            registry: self.registry.unwrap_or_default(),
            fallback_max_attempts: crate::worker::DEFAULT_MAX_ATTEMPTS,
        })
    }
}

impl Executor {
    pub fn new(adapter: Arc<dyn JobStore>, record: JobRecord, registry: JobRegistry) -> Self {
        Self {
            adapter,
            record,
            registry,
            fallback_max_attempts: crate::worker::DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the retry cap used when a record's handler can't even be
    /// resolved or constructed. There is no job instance to ask
    /// `max_attempts()` of, so the caller's worker-level default applies.
    pub fn with_fallback_max_attempts(mut self, max_attempts: i32) -> Self {
        self.fallback_max_attempts = max_attempts;
        self
    }

    /// Resolve the handler, invoke `perform`, and route the outcome back
    /// to the adapter. Never returns an `Err` to the caller: execution
    /// failures are swallowed here, exactly as the spec requires ("the
    /// Executor must swallow post-handling").
    pub async fn perform(self) {
        let handler = self.record.handler.clone();

        let constructor = match self.registry.load(&handler) {
            Ok(constructor) => constructor,
            Err(load_err) => {
                self.fail(PerformError::from_load(load_err)).await;
                return;
            }
        };

        let job = match constructor(self.record.args.clone()) {
            Ok(job) => job,
            Err(load_err) => {
                self.fail(PerformError::from_load(load_err)).await;
                return;
            }
        };

        let max_attempts = job.max_attempts();

        match job.perform(self.record.args.clone()).await {
            Ok(()) => {
                info!(handler = %handler, job_id = %self.record.id, "job succeeded");
                if let Err(e) = self.adapter.success(&self.record).await {
                    error!(handler = %handler, job_id = %self.record.id, error = %e, "failed to record success");
                }
            }
            Err(e) => {
                self.fail_with_attempts(PerformError::wrap(e), max_attempts)
                    .await;
            }
        }
    }

    async fn fail(&self, err: PerformError) {
        self.fail_with_attempts(err, self.fallback_max_attempts).await;
    }

    async fn fail_with_attempts(&self, err: PerformError, max_attempts: i32) {
        let message = err.formatted();
        error!(
            handler = %self.record.handler,
            job_id = %self.record.id,
            error = %message,
            "job failed"
        );
        if let Err(e) = self
            .adapter
            .failure(&self.record, &message, max_attempts)
            .await
        {
            error!(job_id = %self.record.id, error = %e, "failed to record failure");
        }
    }
}
