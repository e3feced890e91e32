//! Job records, terminal outcomes, and leases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::class::ProofClass;

/// A globally unique, opaque identifier for a job.
///
/// Producers are expected to derive this from the content of the job (a
/// content hash of payload + class + epoch), so that re-submitting the same
/// logical work produces the same id and `enqueue` can detect duplicates by
/// id equality rather than requiring a separate dedup index. The broker
/// itself treats the id as opaque bytes; it never inspects or derives it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable unit of proof work.
///
/// Equality is whole-record equality, which is what `enqueue` uses to
/// distinguish an idempotent re-submission from an id collision between two
/// different jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub class: ProofClass,
    /// Non-negative "block number". Lower epoch is higher priority within
    /// its class.
    pub epoch: u64,
    /// Opaque bytes supplied by the producer.
    pub payload: Vec<u8>,
}

/// The terminal outcome of a job. Once recorded, never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success { value: Vec<u8> },
    Failure { reason: String },
}

/// A lease recording that a job is currently assigned to some worker.
///
/// Present in the lease table iff the job is currently dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub started_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
}

impl Lease {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            last_heartbeat_at: now,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.last_heartbeat_at >= timeout
    }
}

/// What `status(id)` reports about a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    NotFound,
    Queued,
    InProgress,
    Resolved { value: Vec<u8> },
    Rejected { reason: String },
}
