//! Broker configuration.

use std::time::Duration;

/// Tunables for lease expiry, sweeper cadence, and retry budget.
///
/// All fields are optional in the sense that [`BrokerConfig::default`]
/// reproduces the documented defaults; callers override only what they
/// need, the same way `PgJobStore::new` defaults the lease timeout and
/// `PgJobStore::with_lease_timeout` overrides it explicitly.
#[derive(Debug, Clone, Copy)]
pub struct BrokerConfig {
    /// Lease expiry after the last heartbeat. Default 30s.
    pub job_timeout: Duration,
    /// Sweeper period. Default 10s.
    pub sweep_interval: Duration,
    /// Total dispatches permitted across a job's lifetime when each prior
    /// dispatch reported a retryable failure. Default 3.
    pub max_retries: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_millis(30_000),
            sweep_interval: Duration::from_millis(10_000),
            max_retries: 3,
        }
    }
}

impl BrokerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}
