//! # Audix Pipeline
//!
//! Asynchronous publication pipeline feeding the chain builder and
//! the append-only store.
//!
//! Features:
//! - Bounded fan-in queue with ticketed batch draining
//! - Worker pool; sealing stays totally ordered via a seal gate
//! - Batching with a partial-batch timeout
//! - Retry with exponential backoff; a poisoned event evicts only
//!   itself
//! - Subscriber fan-out on detached tasks
//! - Atomic metric counters mirrored to the `metrics` facade
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use audix_core::EventBuilder;
//! use audix_persist::MemoryStore;
//! use audix_pipeline::{AuditPublisher, PublisherConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let publisher = AuditPublisher::start(store, PublisherConfig::default()).await?;
//!
//! let event = EventBuilder::call_initiated("caller-1", "call-77").build()?;
//! let sealed = publisher.publish(event).await?;
//! assert_eq!(sealed.sequence_num, 1);
//!
//! publisher.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
mod queue;
pub mod publisher;
pub mod subscriber;

pub use config::PublisherConfig;
pub use error::PublishError;
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use publisher::{
    AuditPublisher, AuditSource, BatchFailure, BatchOutcome, PublisherHealth, ShutdownReport,
};
pub use subscriber::{PublishSubscriber, SubscriberError, SubscriptionHandle};
