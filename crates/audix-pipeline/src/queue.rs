//! Bounded in-memory fan-in queue.
//!
//! One FIFO shared by every worker. Batches are drained atomically
//! and stamped with a ticket; the seal gate admits tickets in issue
//! order so multi-worker draining cannot reorder events between the
//! queue and the chain builder.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{oneshot, Mutex, Notify};

use audix_core::{SealedEvent, UnsealedEvent};

use crate::error::PublishError;

pub(crate) type Reply = oneshot::Sender<Result<SealedEvent, PublishError>>;

#[derive(Debug)]
pub(crate) struct QueueItem {
    pub event: UnsealedEvent,
    /// Present for synchronous publishes awaiting the outcome.
    pub reply: Option<Reply>,
    pub enqueued_at: Instant,
}

impl QueueItem {
    pub fn new(event: UnsealedEvent, reply: Option<Reply>) -> Self {
        Self {
            event,
            reply,
            enqueued_at: Instant::now(),
        }
    }
}

struct QueueInner {
    items: VecDeque<QueueItem>,
    next_ticket: u64,
}

pub(crate) struct EventQueue {
    capacity: usize,
    inner: Mutex<QueueInner>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                next_ticket: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.items.is_empty()
    }

    /// Enqueue unless full; the item is handed back on rejection so
    /// the caller can retry or fail it.
    pub async fn try_push(&self, item: QueueItem) -> Result<(), QueueItem> {
        let mut inner = self.inner.lock().await;
        if inner.items.len() >= self.capacity {
            return Err(item);
        }
        inner.items.push_back(item);
        Ok(())
    }

    /// Atomically drain up to `max` items as one ticketed batch.
    pub async fn pop_batch(&self, max: usize) -> Option<(u64, Vec<QueueItem>)> {
        let mut inner = self.inner.lock().await;
        if inner.items.is_empty() {
            return None;
        }
        let ticket = inner.next_ticket;
        inner.next_ticket += 1;
        let take = max.max(1).min(inner.items.len());
        Some((ticket, inner.items.drain(..take).collect()))
    }

    /// Drain everything left, without a ticket. Shutdown only.
    pub async fn drain_all(&self) -> Vec<QueueItem> {
        let mut inner = self.inner.lock().await;
        inner.items.drain(..).collect()
    }
}

/// Admits drained batches to the chain builder in ticket order.
pub(crate) struct SealGate {
    next: AtomicU64,
    notify: Notify,
}

impl SealGate {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    /// Wait until `ticket` is the next batch allowed to seal.
    pub async fn admit(&self, ticket: u64) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.next.load(Ordering::Acquire) == ticket {
                return;
            }
            notified.await;
        }
    }

    /// Release the gate to the next ticket.
    pub fn complete(&self, ticket: u64) {
        self.next.store(ticket + 1, Ordering::Release);
        self.notify.notify_waiters();
    }
}
