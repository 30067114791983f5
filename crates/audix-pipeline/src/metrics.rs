//! Pipeline metrics.
//!
//! Counters are plain atomics snapshotted on demand; the same
//! increments are mirrored to the `metrics` facade for external
//! collectors.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    events_published: AtomicU64,
    events_failed: AtomicU64,
    events_dropped: AtomicU64,
    conversion_failures: AtomicU64,
    batches_published: AtomicU64,
    batches_failed: AtomicU64,
    retry_attempts: AtomicU64,
    latency_micros_total: AtomicU64,
    latency_samples: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_published(&self, count: u64) {
        self.events_published.fetch_add(count, Ordering::Relaxed);
        metrics::counter!("audix_events_published_total").increment(count);
    }

    pub fn record_failed(&self, count: u64) {
        self.events_failed.fetch_add(count, Ordering::Relaxed);
        metrics::counter!("audix_events_failed_total").increment(count);
    }

    /// An async-path drop counts as a failure as well.
    pub fn record_dropped(&self, count: u64) {
        self.events_dropped.fetch_add(count, Ordering::Relaxed);
        self.record_failed(count);
        metrics::counter!("audix_events_dropped_total").increment(count);
    }

    pub fn record_conversion_failure(&self) {
        self.conversion_failures.fetch_add(1, Ordering::Relaxed);
        self.record_failed(1);
        metrics::counter!("audix_conversion_failures_total").increment(1);
    }

    pub fn record_batch_published(&self) {
        self.batches_published.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("audix_batches_published_total").increment(1);
    }

    pub fn record_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("audix_batches_failed_total").increment(1);
    }

    pub fn record_retry(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("audix_retry_attempts_total").increment(1);
    }

    pub fn record_latency(&self, latency: Duration) {
        self.latency_micros_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, queue_depth: usize) -> MetricsSnapshot {
        metrics::gauge!("audix_queue_depth").set(queue_depth as f64);
        let samples = self.latency_samples.load(Ordering::Relaxed);
        MetricsSnapshot {
            events_published: self.events_published.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            conversion_failures: self.conversion_failures.load(Ordering::Relaxed),
            batches_published: self.batches_published.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            queue_depth,
            avg_latency_micros: if samples == 0 {
                0
            } else {
                self.latency_micros_total.load(Ordering::Relaxed) / samples
            },
        }
    }
}

/// Point-in-time view of the pipeline counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub events_published: u64,
    pub events_failed: u64,
    pub events_dropped: u64,
    pub conversion_failures: u64,
    pub batches_published: u64,
    pub batches_failed: u64,
    pub retry_attempts: u64,
    pub queue_depth: usize,
    pub avg_latency_micros: u64,
}
