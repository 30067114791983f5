//! Publisher configuration.

use rand::Rng;
use std::time::Duration;

/// Recognized pipeline options. Immutable for the lifetime of the
/// publisher.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Parallel workers consuming the queue.
    pub worker_count: usize,
    /// Bounded queue capacity.
    pub queue_size: usize,
    /// Max events per durable write.
    pub batch_size: usize,
    /// Max wall time a partial batch may wait before submission.
    pub batch_timeout: Duration,
    /// Attempts per batch before its events are failed.
    pub max_retries: u32,
    /// Initial delay between retries.
    pub retry_delay: Duration,
    /// Multiplicative backoff applied per retry.
    pub backoff_factor: f64,
    /// Upper bound on a synchronous publish call.
    pub publish_timeout: Duration,
    /// Upper bound on the drain during teardown.
    pub shutdown_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_size: 1024,
            batch_size: 32,
            batch_timeout: Duration::from_millis(100),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            publish_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl PublisherConfig {
    /// Exponential backoff with a little jitter, capped at one
    /// minute.
    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        let base = self.retry_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let base = base.clamp(0.0, 60_000.0) as u64;
        let jitter = if base >= 10 {
            rand::rng().random_range(0..base / 10)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }
}
