//! PostgreSQL implementation of the rw-jobs `JobStore` (Adapter) contract.
//!
//! # Features
//!
//! - `SELECT ... FOR UPDATE SKIP LOCKED` for the claim step, so two
//!   concurrent workers polling the same queue never block on each
//!   other and never claim the same row.
//! - Quartic backoff retry scheduling, shared with every other
//!   `JobStore` implementation via [`rw_jobs::backoff_run_at`].
//! - Stale-lock reclaim folded into the same claim query: a row whose
//!   `locked_at` predates `now - max_runtime` is treated as abandoned
//!   and is claimable again, with `attempts` still incremented.
//!
//! # Database schema
//!
//! ```sql
//! CREATE TABLE jobs (
//!     id UUID PRIMARY KEY,
//!     handler TEXT NOT NULL,
//!     args JSONB NOT NULL,
//!     queue TEXT NOT NULL DEFAULT 'default',
//!     priority INTEGER NOT NULL DEFAULT 50,
//!
//!     run_at TIMESTAMPTZ,
//!     locked_at TIMESTAMPTZ,
//!     locked_by TEXT,
//!     attempts INTEGER NOT NULL DEFAULT 0,
//!     last_error TEXT,
//!     failed_at TIMESTAMPTZ,
//!
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE INDEX idx_jobs_ready ON jobs (priority, run_at)
//!     WHERE failed_at IS NULL;
//! CREATE INDEX idx_jobs_locked_by ON jobs (locked_by);
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use rw_jobs_postgres::PgJobStore;
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/mydb").await?;
//! let store = PgJobStore::new(pool);
//! rw_jobs::scheduler::configure(std::sync::Arc::new(store));
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rw_jobs::{backoff_run_at, FindOptions, JobRecord, JobStore, ScheduleSpec};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// PostgreSQL job store implementation: the reference Adapter.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_record(row: PgRow) -> JobRecord {
    JobRecord {
        id: row.get("id"),
        handler: row.get("handler"),
        args: row.get("args"),
        queue: row.get("queue"),
        priority: row.get("priority"),
        run_at: row.get("run_at"),
        locked_at: row.get("locked_at"),
        locked_by: row.get("locked_by"),
        attempts: row.get("attempts"),
        last_error: row.get("last_error"),
        failed_at: row.get("failed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    /// Persist a new record. `attempts` starts at 0; `failed_at` is
    /// always `NULL` for a freshly scheduled record.
    async fn schedule(&self, spec: ScheduleSpec) -> Result<JobRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO jobs
                (id, handler, args, queue, priority, run_at, attempts, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $7)
            RETURNING id, handler, args, queue, priority, run_at, locked_at, locked_by,
                      attempts, last_error, failed_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&spec.handler)
        .bind(&spec.args)
        .bind(&spec.queue)
        .bind(spec.priority)
        .bind(spec.run_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_record(row))
    }

    /// Select the highest-priority, oldest-eligible candidate and claim
    /// it in a single `UPDATE ... FOR UPDATE SKIP LOCKED` statement, so a
    /// concurrent claimant either sees a different candidate or sees
    /// none at all, never the same row.
    async fn find(&self, options: FindOptions) -> Result<Option<JobRecord>> {
        let now = Utc::now();
        let stale_before = now - options.max_runtime;

        let row = sqlx::query(
            r#"
            WITH claimable AS (
                SELECT id
                FROM jobs
                WHERE failed_at IS NULL
                  AND run_at <= $1
                  AND (locked_at IS NULL OR locked_at < $2)
                  AND ($3::text IS NULL OR queue = $3)
                ORDER BY priority ASC, run_at ASC, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET locked_at = $1,
                locked_by = $4,
                attempts = attempts + 1,
                updated_at = $1
            WHERE id IN (SELECT id FROM claimable)
            RETURNING id, handler, args, queue, priority, run_at, locked_at, locked_by,
                      attempts, last_error, failed_at, created_at, updated_at
            "#,
        )
        .bind(now)
        .bind(stale_before)
        .bind(options.queue.as_deref())
        .bind(&options.process_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_record))
    }

    /// Delete the completed record; success carries no retained state.
    async fn success(&self, record: &JobRecord) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(record.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reschedule with backoff, or mark terminally failed once
    /// `max_attempts` is exhausted. `record.attempts` already reflects
    /// the increment applied at claim time.
    async fn failure(&self, record: &JobRecord, error: &str, max_attempts: i32) -> Result<()> {
        let now = Utc::now();

        if record.attempts < max_attempts {
            let run_at = backoff_run_at(now, record.attempts);
            sqlx::query(
                r#"
                UPDATE jobs
                SET run_at = $1,
                    locked_at = NULL,
                    locked_by = NULL,
                    last_error = $2,
                    updated_at = $3
                WHERE id = $4
                "#,
            )
            .bind(run_at)
            .bind(error)
            .bind(now)
            .bind(record.id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE jobs
                SET failed_at = $1,
                    run_at = NULL,
                    locked_at = NULL,
                    locked_by = NULL,
                    last_error = $2,
                    updated_at = $1
                WHERE id = $3
                "#,
            )
            .bind(now)
            .bind(error)
            .bind(record.id)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Delete all records. Intended for tests and administrative resets.
    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM jobs").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The Postgres adapter requires a live database and is exercised by
    /// the integration suite in `tests/` (see DESIGN.md); this module
    /// only covers pieces that don't need a connection.
    #[test]
    fn row_to_record_has_the_expected_signature() {
        let _: fn(PgRow) -> JobRecord = row_to_record;
    }
}
