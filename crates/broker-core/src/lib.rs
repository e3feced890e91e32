//! # broker-core
//!
//! A **proving job broker**: a central coordinator that accepts
//! proof-generation jobs from producers, distributes them to a dynamic pool
//! of remote worker agents, tracks their progress, times out stuck
//! executions, retries transient failures a bounded number of times, and
//! persists terminal outcomes.
//!
//! ## Architecture
//!
//! ```text
//! Producer                         Broker                          Worker
//!    │                                │                               │
//!    ├─ enqueue(job) ────────────────►│                               │
//!    │                                ├─ store.add_job()               │
//!    │                                ├─ index + queue                 │
//!    │                                │                               │
//!    │                                │◄──────── acquire(classes) ─────┤
//!    │                                ├─ pop highest-rank ready class   │
//!    │                                ├─ install lease                 │
//!    │                                ├──────── Job ───────────────────►
//!    │                                │                               │
//!    │                                │◄──────── heartbeat(id) ────────┤
//!    │                                │                               │
//!    │                                │◄── report_success/failure ─────┤
//!    │                                ├─ store.set_result()             │
//!    │                                ├─ result index                   │
//!    │                                │                               │
//! Timeout Sweeper ───────────────────►│ (periodic: reclaim stale leases)│
//! ```
//!
//! ## Key invariants
//!
//! 1. A settled job is always indexed.
//! 2. A leased job is indexed and not settled.
//! 3. A job id is queued at most once across all class queues.
//! 4. A leased job is not queued.
//! 5. Retry counts never exceed `max_retries`.
//! 6. The durable store reflects the in-memory indices after every
//!    finalization returns.
//!
//! ## What this crate is not
//!
//! It does not carry the transport between broker and workers, the workers
//! themselves, or the logic that originates jobs — those are external
//! collaborators (see [`store::DurableStore`] for the one boundary this
//! crate does own).

mod broker;
mod class;
mod config;
mod error;
mod job;
mod queue;
mod state;
pub mod store;
mod sweeper;


pub use broker::Broker;
pub use class::ProofClass;
pub use config::BrokerConfig;
pub use error::{BrokerError, Result};
pub use job::{Job, JobId, JobStatus, Lease, Outcome};
pub use store::DurableStore;
pub use sweeper::spawn as spawn_sweeper;
