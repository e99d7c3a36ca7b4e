//! The persisted shape of one scheduled job invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of durable job state.
///
/// Mutated only by the four `JobStore` operations (`schedule`, `find`,
/// `success`, `failure`). There is no update path outside those.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: Uuid,
    /// The handler name and its serialized args, combined into a single
    /// persisted payload (see [`HandlerPayload`]).
    pub handler: String,
    pub args: serde_json::Value,
    pub queue: String,
    /// 1 (most urgent) through 100 (least urgent).
    pub priority: i32,
    /// Earliest moment this record is eligible to run. `None` means the
    /// job is terminally failed and will never run again.
    pub run_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    /// Completed execution attempts, including failures. Monotonically
    /// non-decreasing over the record's lifetime.
    pub attempts: i32,
    pub last_error: Option<String>,
    /// Set once `attempts` exhausts `max_attempts`. Terminal: a record
    /// with `failed_at.is_some()` always has `run_at.is_none()`.
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// True once `failed_at` is set: the record will never be claimed or
    /// rescheduled again.
    pub fn is_terminal(&self) -> bool {
        self.failed_at.is_some()
    }
}

/// The spec passed to `JobStore::schedule`: everything needed to insert a
/// new [`JobRecord`], before the store assigns an id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub handler: String,
    pub args: serde_json::Value,
    pub queue: String,
    pub priority: i32,
    pub run_at: DateTime<Utc>,
}

/// Handler name + args, the logical payload serialized into
/// `JobRecord::handler`/`args` for storage.
///
/// Spec §3 describes `handler` and `args` as a single serialized blob;
/// this repo keeps them as two columns for queryability (matching the
/// reference Postgres schema) but exposes this combined view for callers
/// that want to treat scheduling as "serialize one payload".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerPayload {
    pub handler: String,
    pub args: serde_json::Value,
}

impl From<&JobRecord> for HandlerPayload {
    fn from(record: &JobRecord) -> Self {
        Self {
            handler: record.handler.clone(),
            args: record.args.clone(),
        }
    }
}
