//! # Broker Demo
//!
//! Wires an in-memory store to the broker and simulates a producer
//! enqueueing proof jobs across several classes while a small pool of
//! worker tasks polls, heartbeats, and reports outcomes. No transport, no
//! adapters — just the library used directly, in the same spirit as the
//! teacher workspace's own `http-fetcher`/`ai-summarizer` examples.

use std::sync::Arc;
use std::time::Duration;

use broker_core::{Broker, BrokerConfig, Job, JobId, ProofClass};
use broker_testing::InMemoryStore;
use tracing::info;

async fn run_worker(broker: Broker, worker_id: usize, allow: Vec<ProofClass>) {
    loop {
        let Some(job) = broker.acquire(Some(&allow)).await else {
            tokio::time::sleep(Duration::from_millis(50)).await;
            continue;
        };

        info!(worker_id, id = %job.id, class = %job.class, "claimed job");

        // Simulate proving work, with an occasional heartbeat for
        // longer-running classes.
        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.heartbeat(&job.id, None).await;

        // Simulate an occasional retryable failure to exercise the retry
        // path, otherwise succeed.
        if fastrand_like_failure(&job.id) {
            broker
                .report_failure(&job.id, "transient proving error".into(), true)
                .await
                .expect("report_failure");
            info!(worker_id, id = %job.id, "reported transient failure, retrying");
        } else {
            broker
                .report_success(&job.id, vec![0xAB, 0xCD])
                .await
                .expect("report_success");
            info!(worker_id, id = %job.id, "reported success");
        }
    }
}

/// A tiny deterministic "sometimes fails" hash so the demo doesn't pull in
/// a random crate just to pick a failure branch.
fn fastrand_like_failure(id: &JobId) -> bool {
    id.0.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32)) % 5 == 0
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let store = Arc::new(InMemoryStore::new());
    let broker = Broker::new(store, BrokerConfig::default());
    broker.recover().await?;

    let _sweeper = broker_core::spawn_sweeper(broker.clone());

    for i in 0..20u64 {
        let class = match i % 4 {
            0 => ProofClass::BlockRootRollup,
            1 => ProofClass::MergeRollup,
            2 => ProofClass::PublicVm,
            _ => ProofClass::TubeProof,
        };
        broker
            .enqueue(Job {
                id: JobId::new(format!("job-{i}")),
                class,
                epoch: i,
                payload: vec![],
            })
            .await?;
    }

    let mut workers = Vec::new();
    for worker_id in 0..4 {
        let broker = broker.clone();
        workers.push(tokio::spawn(run_worker(
            broker,
            worker_id,
            ProofClass::ALL.to_vec(),
        )));
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    for w in workers {
        w.abort();
    }

    for (class, depth) in broker.queue_depths().await {
        info!(%class, depth, "final queue depth");
    }

    Ok(())
}
