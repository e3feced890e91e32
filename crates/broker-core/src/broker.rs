//! The broker façade — the public contract producers and workers
//! call against.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::class::ProofClass;
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::job::{Job, JobId, JobStatus, Lease, Outcome};
use crate::state::BrokerState;
use crate::store::DurableStore;

struct Inner {
    state: Mutex<BrokerState>,
    store: Arc<dyn DurableStore>,
    config: BrokerConfig,
}

/// The proving job broker.
///
/// Cheap to clone — internally an `Arc`, the same sharing shape
/// `seesaw-core`'s `Dispatcher<D>` uses for its `deps`. Clone freely across
/// tasks (the sweeper, the RPC layer, worker-facing handlers).
#[derive(Clone)]
pub struct Broker {
    inner: Arc<Inner>,
}

impl Broker {
    /// Build a broker over `store` with no jobs loaded yet. Call
    /// [`Broker::recover`] before serving traffic if the store may already
    /// hold jobs from a prior run.
    pub fn new(store: Arc<dyn DurableStore>, config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BrokerState::default()),
                store,
                config,
            }),
        }
    }

    pub fn config(&self) -> BrokerConfig {
        self.inner.config
    }

    /// Startup recovery. Enumerates the store, rebuilds the job
    /// index and re-queues unsettled jobs. Lease and retry state do not
    /// survive a crash — retries are forgiven across crashes.
    pub async fn recover(&self) -> Result<()> {
        let records = self
            .inner
            .store
            .iterate_all()
            .await
            .map_err(|source| BrokerError::StoreUnavailable { source })?;

        let mut state = self.inner.state.lock().await;
        for (job, result) in records {
            let class = job.class;
            let epoch = job.epoch;
            let id = job.id.clone();
            state.jobs.insert(id.clone(), job);
            match result {
                Some(outcome) => {
                    state.results.insert(id, outcome);
                }
                None => {
                    state.queue_for(class).push(id, epoch);
                }
            }
        }
        debug!(jobs = state.jobs.len(), "recovered broker state from store");
        Ok(())
    }

    /// Admission.
    pub async fn enqueue(&self, job: Job) -> Result<()> {
        {
            let state = self.inner.state.lock().await;
            if let Some(existing) = state.jobs.get(&job.id) {
                return if *existing == job {
                    debug!(id = %job.id, "enqueue: idempotent duplicate, no-op");
                    Ok(())
                } else {
                    Err(BrokerError::DuplicateIdConflict { id: job.id.clone() })
                };
            }
        }

        self.inner
            .store
            .add_job(&job)
            .await
            .map_err(|source| BrokerError::StoreUnavailable { source })?;

        let mut state = self.inner.state.lock().await;
        // A racing enqueue of the same id may have landed while we were
        // writing to the store; treat it the same way as the pre-check.
        if let Some(existing) = state.jobs.get(&job.id) {
            return if *existing == job {
                Ok(())
            } else {
                Err(BrokerError::DuplicateIdConflict { id: job.id.clone() })
            };
        }
        let class = job.class;
        let epoch = job.epoch;
        let id = job.id.clone();
        state.jobs.insert(id.clone(), job);
        state.queue_for(class).push(id, epoch);
        Ok(())
    }

    /// Unconditional removal. Safe on unknown ids.
    pub async fn cancel(&self, id: &JobId) -> Result<()> {
        {
            let mut state = self.inner.state.lock().await;
            if let Some(job) = state.jobs.remove(id) {
                if let Some(queue) = state.queues.get_mut(&job.class) {
                    queue.remove(id);
                }
            }
            state.results.remove(id);
            state.leases.remove(id);
            state.retries.remove(id);
            state.settling.remove(id);
        }

        self.inner
            .store
            .delete_job_and_result(id)
            .await
            .map_err(|source| BrokerError::StoreUnavailable { source })
    }

    /// Status query.
    pub async fn status(&self, id: &JobId) -> JobStatus {
        let state = self.inner.state.lock().await;
        if !state.jobs.contains_key(id) {
            return JobStatus::NotFound;
        }
        match state.results.get(id) {
            Some(Outcome::Success { value }) => {
                return JobStatus::Resolved {
                    value: value.clone(),
                }
            }
            Some(Outcome::Failure { reason }) => {
                return JobStatus::Rejected {
                    reason: reason.clone(),
                }
            }
            None => {}
        }
        if state.leases.contains_key(id) {
            JobStatus::InProgress
        } else {
            JobStatus::Queued
        }
    }

    /// Dispatch. `allow_list` defaults to every known class.
    pub async fn acquire(&self, allow_list: Option<&[ProofClass]>) -> Option<Job> {
        let mut classes: Vec<ProofClass> = match allow_list {
            Some(list) => list.to_vec(),
            None => ProofClass::ALL.to_vec(),
        };
        classes.sort_by_key(|c| c.rank());

        let mut state = self.inner.state.lock().await;
        let now = Utc::now();
        for class in classes {
            let Some(id) = state.queue_for(class).pop_nonblocking() else {
                continue;
            };
            let job = state
                .jobs
                .get(&id)
                .cloned()
                .expect("queued id must be present in the job index (invariant 3/4)");
            state.leases.insert(id.clone(), Lease::fresh(now));
            debug!(id = %job.id, class = %job.class, "acquired");
            return Some(job);
        }
        None
    }

    /// Heartbeat / idle-poll.
    pub async fn heartbeat(&self, id: &JobId, allow_list: Option<&[ProofClass]>) -> Option<Job> {
        {
            let mut state = self.inner.state.lock().await;
            if let Some(lease) = state.leases.get_mut(id) {
                lease.last_heartbeat_at = Utc::now();
                debug!(id = %id, "heartbeat: lease extended");
                return None;
            }
        }
        match allow_list {
            Some(list) => self.acquire(Some(list)).await,
            None => {
                warn!(id = %id, "heartbeat: lease already reclaimed, no allow_list to reassign");
                None
            }
        }
    }

    /// Finalize success.
    pub async fn report_success(&self, id: &JobId, value: Vec<u8>) -> Result<()> {
        if !self.begin_settlement(id).await {
            return Ok(());
        }

        let outcome = Outcome::Success { value };
        let store_result = self.inner.store.set_result(id, &outcome).await;

        // Clear `settling` regardless of outcome: a failed store write must
        // not leave the job permanently unsettleable, since it is still
        // queued nowhere and leased nowhere once `begin_settlement` ran.
        let mut state = self.inner.state.lock().await;
        state.settling.remove(id);
        match store_result {
            Ok(()) => {
                state.results.insert(id.clone(), outcome);
                Ok(())
            }
            Err(source) => Err(BrokerError::StoreUnavailable { source }),
        }
    }

    /// Finalize or retry a failure.
    ///
    /// The attempt counter records *failed* attempts; the first attempt is
    /// attempt 0. A job may be dispatched up to `max_retries` times total
    /// before the failure becomes terminal.
    pub async fn report_failure(
        &self,
        id: &JobId,
        reason: String,
        retry_requested: bool,
    ) -> Result<()> {
        let retry_job = {
            let mut state = self.inner.state.lock().await;
            if !state.jobs.contains_key(id) {
                warn!(id = %id, "report_failure: unknown job, dropped");
                return Ok(());
            }
            if state.results.contains_key(id) || state.settling.contains(id) {
                warn!(id = %id, "report_failure: job already settled, dropped");
                return Ok(());
            }
            // Captured before removal: only a report against a still-live
            // dispatch may re-queue the job. A duplicate retry report
            // arrives after the first one already removed the lease and
            // re-queued it, so `had_lease` is false and it's dropped below
            // rather than queuing the job a second time. The terminal
            // branch doesn't need this guard: `settling`, inserted in the
            // same critical section, already makes it re-entrant-safe, so
            // a caller retrying this same report after a `StoreUnavailable`
            // can still settle the job even though its lease is long gone.
            let had_lease = state.leases.remove(id).is_some();

            let attempts_so_far = *state.retries.get(id).unwrap_or(&0);
            let max_retries = self.inner.config.max_retries;
            if retry_requested && attempts_so_far + 1 < max_retries {
                if !had_lease {
                    debug!(
                        id = %id,
                        "report_failure: no active lease, duplicate retry report dropped"
                    );
                    return Ok(());
                }
                state.retries.insert(id.clone(), attempts_so_far + 1);
                let job = state
                    .jobs
                    .get(id)
                    .cloned()
                    .expect("checked present above");
                let class = job.class;
                let epoch = job.epoch;
                state.queue_for(class).push(id.clone(), epoch);
                Some(())
            } else {
                state.settling.insert(id.clone());
                None
            }
        };

        if retry_job.is_some() {
            debug!(id = %id, "report_failure: requeued for retry");
            return Ok(());
        }

        let outcome = Outcome::Failure { reason };
        let store_result = self.inner.store.set_result(id, &outcome).await;

        // As in `report_success`: clear `settling` whether or not the store
        // write succeeded, so a store failure doesn't wedge the job.
        let mut state = self.inner.state.lock().await;
        state.settling.remove(id);
        match store_result {
            Ok(()) => {
                state.results.insert(id.clone(), outcome);
                Ok(())
            }
            Err(source) => Err(BrokerError::StoreUnavailable { source }),
        }
    }

    /// Reclaim leases whose heartbeat has gone stale. Called
    /// periodically by the sweeper; never blocks on the store.
    pub async fn sweep_timeouts(&self) {
        let now = Utc::now();
        let timeout = chrono::Duration::from_std(self.inner.config.job_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));

        let mut state = self.inner.state.lock().await;
        let snapshot: Vec<(JobId, Lease)> = state
            .leases
            .iter()
            .map(|(id, lease)| (id.clone(), *lease))
            .collect();
        let stale_or_orphaned: Vec<JobId> = snapshot
            .into_iter()
            .filter(|(id, lease)| !state.jobs.contains_key(id) || lease.is_stale(now, timeout))
            .map(|(id, _)| id)
            .collect();

        for id in stale_or_orphaned {
            state.leases.remove(&id);
            if let Some(job) = state.jobs.get(&id) {
                let class = job.class;
                let epoch = job.epoch;
                warn!(id = %id, class = %class, "sweeper: lease expired, re-queued");
                state.queue_for(class).push(id, epoch);
            }
        }
    }

    /// Snapshot of how many jobs are waiting in each class's queue.
    /// Read-only, non-mutating, useful for operator visibility.
    pub async fn queue_depths(&self) -> Vec<(ProofClass, usize)> {
        let state = self.inner.state.lock().await;
        ProofClass::ALL
            .iter()
            .map(|class| {
                (
                    *class,
                    state.queues.get(class).map(|q| q.len()).unwrap_or(0),
                )
            })
            .collect()
    }

    /// Attempt to claim exclusive responsibility for settling `id`. Returns
    /// `false` (meaning: drop this report) if the job is unknown, already
    /// settled, or another report is already settling it.
    async fn begin_settlement(&self, id: &JobId) -> bool {
        let mut state = self.inner.state.lock().await;
        if !state.jobs.contains_key(id) {
            warn!(id = %id, "report_success: unknown job, dropped");
            return false;
        }
        if state.results.contains_key(id) || state.settling.contains(id) {
            warn!(id = %id, "report_success: job already settled, dropped");
            return false;
        }
        state.leases.remove(id);
        state.settling.insert(id.clone());
        true
    }
}
