//! The durable-store collaborator contract.
//!
//! The broker consumes storage only through this trait. It is agnostic to
//! what backs it — `broker-store-postgres` provides a production
//! implementation over `sqlx`; `broker-testing` provides an in-memory one
//! for tests and the demo.

use anyhow::Result;

use crate::job::{Job, JobId, Outcome};

/// Durable storage for jobs and their terminal outcomes.
///
/// All operations are assumed to succeed or raise a transport-level
/// failure; the broker wraps any `Err` into
/// [`crate::error::BrokerError::StoreUnavailable`] at the façade boundary.
#[async_trait::async_trait]
pub trait DurableStore: Send + Sync {
    /// Idempotently persist a job record.
    async fn add_job(&self, job: &Job) -> Result<()>;

    /// Persist a terminal outcome for a job.
    async fn set_result(&self, id: &JobId, outcome: &Outcome) -> Result<()>;

    /// Remove both the job and any result for this id. No-op if unknown.
    async fn delete_job_and_result(&self, id: &JobId) -> Result<()>;

    /// Enumerate every persisted job and its result (if settled). Used only
    /// at startup.
    async fn iterate_all(&self) -> Result<Vec<(Job, Option<Outcome>)>>;
}
