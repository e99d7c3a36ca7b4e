//! Error taxonomy for the job engine.
//!
//! Scheduling errors propagate to the caller; execution errors are
//! captured by the [`crate::executor::Executor`] and routed into
//! `JobStore::failure`, never raised to the worker loop.

use thiserror::Error;

/// Raised when `Scheduler::schedule` (or `Job::performLater`) runs with no
/// process-wide adapter configured.
#[derive(Debug, Error)]
#[error("no job store configured: call rw_jobs::scheduler::configure(store) at boot")]
pub struct AdapterNotConfiguredError;

/// Raised when an [`crate::executor::Executor`] is constructed without a
/// required collaborator. Programmer error, not a retryable condition.
#[derive(Debug, Error)]
pub enum ExecutorConstructionError {
    #[error("executor requires an adapter")]
    AdapterRequired,
    #[error("executor requires a job record")]
    JobRequired,
}

/// Raised by a [`crate::registry::JobRegistry`] when a handler name cannot
/// be resolved to a constructible job.
#[derive(Debug, Error)]
pub enum LoadJobError {
    #[error("no job registered under handler {handler:?}")]
    JobNotFound { handler: String },
    #[error("handler {handler:?} is registered but does not export a usable job constructor")]
    JobExportNotFound { handler: String },
}

/// Wraps any failure raised while running a job's `perform`, preserving
/// the original error's message and, if present, its source chain.
#[derive(Debug, Error)]
#[error("job execution failed: {message}")]
pub struct PerformError {
    pub message: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl PerformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn wrap(err: anyhow::Error) -> Self {
        Self {
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn from_load(err: LoadJobError) -> Self {
        Self {
            message: err.to_string(),
            source: Some(err.into()),
        }
    }

    /// User class was resolved but exposes no `perform` method.
    ///
    /// Rust's trait system makes this largely a compile-time concern (any
    /// `Job` impl must provide `perform`), but the kind is retained so the
    /// error taxonomy matches the dynamic-language original one-for-one;
    /// a `JobRegistry` populated with a type-erased constructor that fails
    /// to produce a usable job surfaces it here.
    pub fn perform_not_implemented(handler: &str) -> Self {
        Self::new(format!(
            "job {handler:?} does not implement perform(), nothing to invoke"
        ))
    }

    /// Render the composed message: this wrapper's header followed by the
    /// original error's message and source chain, one per line.
    pub fn formatted(&self) -> String {
        let mut out = self.message.clone();
        if let Some(source) = &self.source {
            for cause in source.chain().skip(1) {
                out.push('\n');
                out.push_str(&cause.to_string());
            }
        }
        out
    }
}

/// Raised by `Scheduler::schedule` when the underlying adapter call fails.
/// Wraps the adapter's error, preserving its message and source chain.
#[derive(Debug, Error)]
#[error("failed to schedule job: {0}")]
pub struct SchedulingError(#[from] pub anyhow::Error);

impl SchedulingError {
    pub fn formatted(&self) -> String {
        let mut out = self.0.to_string();
        for cause in self.0.chain().skip(1) {
            out.push('\n');
            out.push_str(&cause.to_string());
        }
        out
    }
}
