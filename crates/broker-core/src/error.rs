//! Structured errors returned across the broker façade.
//!
//! Only two conditions are actual errors: a duplicate id whose record
//! doesn't match, and a durable-store failure. `UnknownJob` and
//! `LeaseMissing` are not errors — those are observable only through
//! return values (`NotFound`, `None`) and log output, never thrown across
//! this boundary.

use thiserror::Error;

use crate::job::JobId;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// `enqueue` was called with an id already present under a
    /// byte-different record. Caller bug; not logged as an error.
    #[error("job {id} already exists with a different record")]
    DuplicateIdConflict { id: JobId },

    /// A durable-store operation failed.
    #[error("durable store unavailable: {source}")]
    StoreUnavailable {
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, BrokerError>;
