//! The in-memory tables the broker serializes access to through a single
//! mutex. Everything here is an implementation detail of
//! [`crate::broker::Broker`]; nothing in this module is public.

use std::collections::{HashMap, HashSet};

use crate::class::ProofClass;
use crate::job::{Job, JobId, Lease, Outcome};
use crate::queue::ClassQueue;

#[derive(Default)]
pub(crate) struct BrokerState {
    pub(crate) jobs: HashMap<JobId, Job>,
    pub(crate) results: HashMap<JobId, Outcome>,
    pub(crate) leases: HashMap<JobId, Lease>,
    pub(crate) retries: HashMap<JobId, u32>,
    pub(crate) queues: HashMap<ProofClass, ClassQueue>,
    /// Ids whose terminal outcome is currently being written to the durable
    /// store. The store write happens outside the state mutex, so this
    /// set closes the gap: a duplicate report arriving while the first
    /// report's store write is in flight sees the id as already settling
    /// and is dropped, preserving "first report wins" even though
    /// the actual write is not inside the critical section.
    pub(crate) settling: HashSet<JobId>,
}

impl BrokerState {
    pub(crate) fn queue_for(&mut self, class: ProofClass) -> &mut ClassQueue {
        self.queues.entry(class).or_default()
    }
}
