//! Testing utilities for `broker-core`: an in-memory [`DurableStore`], a
//! fault-injecting wrapper for exercising `StoreUnavailable` handling, and a
//! couple of job-builder fixtures.
//!
//! Mirrors the role `seesaw-testing` plays for the `seesaw` workspace: a
//! dedicated dev-support crate so test scaffolding doesn't leak into the
//! core library's own dependency tree.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use broker_core::{DurableStore, Job, JobId, Outcome, ProofClass};
use dashmap::DashMap;

/// An in-memory [`DurableStore`]. Not durable across process restarts —
/// intended only for tests and the demo binary.
#[derive(Default)]
pub struct InMemoryStore {
    jobs: DashMap<JobId, Job>,
    results: DashMap<JobId, Outcome>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently persisted, settled or not. Handy for
    /// asserting `cancel` actually removed a record.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn add_job(&self, job: &Job) -> Result<()> {
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn set_result(&self, id: &JobId, outcome: &Outcome) -> Result<()> {
        self.results.insert(id.clone(), outcome.clone());
        Ok(())
    }

    async fn delete_job_and_result(&self, id: &JobId) -> Result<()> {
        self.jobs.remove(id);
        self.results.remove(id);
        Ok(())
    }

    async fn iterate_all(&self) -> Result<Vec<(Job, Option<Outcome>)>> {
        Ok(self
            .jobs
            .iter()
            .map(|entry| {
                let job = entry.value().clone();
                let result = self.results.get(entry.key()).map(|r| r.value().clone());
                (job, result)
            })
            .collect())
    }
}

/// Wraps any [`DurableStore`] and can be told to fail its next call, so
/// tests can exercise `BrokerError::StoreUnavailable` without a real
/// backend flaking on its own schedule.
pub struct FlakyStore<S> {
    inner: S,
    fail_next: AtomicBool,
}

impl<S: DurableStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_next: AtomicBool::new(false),
        }
    }

    /// The next call to any `DurableStore` method will return an error;
    /// the call after that succeeds normally.
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(anyhow!("injected store failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: DurableStore> DurableStore for FlakyStore<S> {
    async fn add_job(&self, job: &Job) -> Result<()> {
        self.maybe_fail()?;
        self.inner.add_job(job).await
    }

    async fn set_result(&self, id: &JobId, outcome: &Outcome) -> Result<()> {
        self.maybe_fail()?;
        self.inner.set_result(id, outcome).await
    }

    async fn delete_job_and_result(&self, id: &JobId) -> Result<()> {
        self.maybe_fail()?;
        self.inner.delete_job_and_result(id).await
    }

    async fn iterate_all(&self) -> Result<Vec<(Job, Option<Outcome>)>> {
        self.maybe_fail()?;
        self.inner.iterate_all().await
    }
}

/// Build a job with the given id, class, and epoch, and an empty payload —
/// the common case in tests that don't care about payload contents.
pub fn sample_job(id: &str, class: ProofClass, epoch: u64) -> Job {
    Job {
        id: JobId::new(id),
        class,
        epoch,
        payload: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flaky_store_fails_exactly_once() {
        let store = FlakyStore::new(InMemoryStore::new());
        let job = sample_job("j1", ProofClass::TubeProof, 1);

        store.fail_next_call();
        assert!(store.add_job(&job).await.is_err());
        assert!(store.add_job(&job).await.is_ok());
    }

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryStore::new();
        let job = sample_job("j1", ProofClass::TubeProof, 1);
        store.add_job(&job).await.unwrap();
        assert_eq!(store.job_count(), 1);

        let all = store.iterate_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1, None);

        store
            .set_result(&job.id, &Outcome::Success { value: vec![1] })
            .await
            .unwrap();
        let all = store.iterate_all().await.unwrap();
        assert_eq!(all[0].1, Some(Outcome::Success { value: vec![1] }));

        store.delete_job_and_result(&job.id).await.unwrap();
        assert_eq!(store.job_count(), 0);
    }
}
