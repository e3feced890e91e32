//! The timeout sweeper: a periodic task that reclaims leases whose
//! heartbeat has gone stale.

use tokio::task::JoinHandle;
use tracing::debug;

use crate::broker::Broker;

/// Spawn the sweeper as a background task, ticking every
/// `broker.config().sweep_interval`. Drop the returned handle (or call
/// `.abort()`) to stop it; it otherwise runs for the lifetime of the
/// process.
pub fn spawn(broker: Broker) -> JoinHandle<()> {
    let interval = broker.config().sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the sweeper's first
        // real pass happens one interval after startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            debug!("sweeper: checking for stale leases");
            broker.sweep_timeouts().await;
        }
    })
}
