//! Subscriber fan-out.
//!
//! Observers are notified after successful publication on their own
//! tasks: a failing or slow subscriber never blocks the pipeline or
//! its peers, and notification order across subscribers is
//! unspecified.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::warn;

use audix_core::SealedEvent;

/// Subscriber failure, logged and contained.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

/// Observer invoked after each successful publication.
#[async_trait::async_trait]
pub trait PublishSubscriber: Send + Sync {
    /// Name used in log records.
    fn name(&self) -> &str {
        "subscriber"
    }

    async fn on_published(&self, event: &SealedEvent) -> Result<(), SubscriberError>;
}

/// Handle returned by `subscribe`; pass to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

/// Read-mostly subscriber registry. Registration is rare;
/// notification snapshots the set and never holds the lock across
/// subscriber code.
pub(crate) struct SubscriberSet {
    entries: RwLock<HashMap<u64, Arc<dyn PublishSubscriber>>>,
    next_id: AtomicU64,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self, subscriber: Arc<dyn PublishSubscriber>) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .write()
            .expect("subscriber registry lock poisoned")
            .insert(id, subscriber);
        SubscriptionHandle(id)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.entries
            .write()
            .expect("subscriber registry lock poisoned")
            .remove(&handle.0)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("subscriber registry lock poisoned")
            .len()
    }

    /// Best-effort fan-out on detached tasks.
    pub fn notify(&self, event: &SealedEvent) {
        let snapshot: Vec<Arc<dyn PublishSubscriber>> = self
            .entries
            .read()
            .expect("subscriber registry lock poisoned")
            .values()
            .cloned()
            .collect();

        for subscriber in snapshot {
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(error) = subscriber.on_published(&event).await {
                    warn!(
                        subscriber = subscriber.name(),
                        %error,
                        event_id = %event.id,
                        "subscriber failed; notification dropped"
                    );
                }
            });
        }
    }
}
