//! PostgreSQL implementation of the proving job broker's durable store.
//!
//! This crate provides a production implementation of
//! [`broker_core::DurableStore`] — the one boundary the broker core leaves
//! to an external collaborator.
//!
//! # Database Schema
//!
//! ```sql
//! CREATE TABLE jobs (
//!     id TEXT PRIMARY KEY,
//!     class TEXT NOT NULL,
//!     epoch BIGINT NOT NULL,
//!     payload BYTEA NOT NULL
//! );
//!
//! CREATE TABLE job_results (
//!     job_id TEXT PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
//!     outcome_kind TEXT NOT NULL, -- 'success' | 'failure'
//!     success_value BYTEA,
//!     failure_reason TEXT
//! );
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use broker_store_postgres::PgStore;
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/proving").await?;
//! let store = PgStore::new(pool);
//! ```

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use broker_core::{DurableStore, Job, JobId, Outcome, ProofClass};
use sqlx::{PgPool, Row};

/// PostgreSQL-backed [`DurableStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the schema migration documented at the crate root. Intended for
    /// demos and tests against a scratch database; production deployments
    /// typically manage this with a migration tool instead.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                class TEXT NOT NULL,
                epoch BIGINT NOT NULL,
                payload BYTEA NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_results (
                job_id TEXT PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
                outcome_kind TEXT NOT NULL,
                success_value BYTEA,
                failure_reason TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn class_to_row(row: &sqlx::postgres::PgRow) -> Result<ProofClass> {
    let raw: String = row.try_get("class")?;
    ProofClass::from_str(&raw).ok_or_else(|| anyhow!("unrecognized proof class in store: {raw}"))
}

#[async_trait]
impl DurableStore for PgStore {
    /// Idempotent persist: an `enqueue` retry for the same id is a no-op
    /// update rather than a constraint violation.
    async fn add_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, class, epoch, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&job.id.0)
        .bind(job.class.as_str())
        .bind(job.epoch as i64)
        .bind(&job.payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_result(&self, id: &JobId, outcome: &Outcome) -> Result<()> {
        let (kind, success_value, failure_reason): (&str, Option<&[u8]>, Option<&str>) =
            match outcome {
                Outcome::Success { value } => ("success", Some(value.as_slice()), None),
                Outcome::Failure { reason } => ("failure", None, Some(reason.as_str())),
            };

        sqlx::query(
            r#"
            INSERT INTO job_results (job_id, outcome_kind, success_value, failure_reason)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_id) DO UPDATE SET
                outcome_kind = EXCLUDED.outcome_kind,
                success_value = EXCLUDED.success_value,
                failure_reason = EXCLUDED.failure_reason
            "#,
        )
        .bind(&id.0)
        .bind(kind)
        .bind(success_value)
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_job_and_result(&self, id: &JobId) -> Result<()> {
        // job_results cascades via ON DELETE CASCADE, but delete it
        // explicitly too in case the FK isn't present in a given deployment.
        sqlx::query("DELETE FROM job_results WHERE job_id = $1")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn iterate_all(&self) -> Result<Vec<(Job, Option<Outcome>)>> {
        let rows = sqlx::query(
            r#"
            SELECT j.id, j.class, j.epoch, j.payload,
                   r.outcome_kind, r.success_value, r.failure_reason
            FROM jobs j
            LEFT JOIN job_results r ON r.job_id = j.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let class = class_to_row(&row)?;
            let job = Job {
                id: JobId::new(row.try_get::<String, _>("id")?),
                class,
                epoch: row.try_get::<i64, _>("epoch")? as u64,
                payload: row.try_get("payload")?,
            };

            let outcome_kind: Option<String> = row.try_get("outcome_kind")?;
            let outcome = match outcome_kind.as_deref() {
                Some("success") => Some(Outcome::Success {
                    value: row.try_get("success_value")?,
                }),
                Some("failure") => Some(Outcome::Failure {
                    reason: row.try_get("failure_reason")?,
                }),
                _ => None,
            };

            out.push((job, outcome));
        }

        Ok(out)
    }
}

/// Convenience constructor returning a store behind the `Arc<dyn
/// DurableStore>` the broker expects, after running the schema migration.
pub async fn connect_and_migrate(database_url: &str) -> Result<Arc<dyn DurableStore>> {
    let pool = PgPool::connect(database_url).await?;
    let store = PgStore::new(pool);
    store.migrate().await?;
    Ok(Arc::new(store))
}
