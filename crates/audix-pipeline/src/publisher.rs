//! The audit publisher: fan-in queue, worker pool, ordered sealing,
//! batched durable writes, retry with backoff, subscriber fan-out.
//!
//! Workers drain the shared queue in ticketed batches; a seal gate
//! admits tickets in issue order, so events reach the chain builder
//! exactly as they were enqueued regardless of which worker carries
//! them. The chain builder's tail advances only after the durable
//! append succeeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use audix_core::{ChainBuilder, SealBatchError, SealedEvent, UnsealedEvent, ValidationError};
use audix_persist::{recover_tail, EventStore, StorageError};

use crate::config::PublisherConfig;
use crate::error::PublishError;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::queue::{EventQueue, QueueItem, SealGate};
use crate::subscriber::{PublishSubscriber, SubscriberSet, SubscriptionHandle};

/// A domain object convertible into an audit event. Conversion
/// failures are counted and the object is never enqueued.
pub trait AuditSource {
    fn to_audit_event(&self) -> Result<UnsealedEvent, ValidationError>;
}

impl AuditSource for UnsealedEvent {
    fn to_audit_event(&self) -> Result<UnsealedEvent, ValidationError> {
        Ok(self.clone())
    }
}

/// Outcome of a batch publish; partial success is permitted.
#[derive(Debug)]
pub struct BatchOutcome {
    pub published: Vec<SealedEvent>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug)]
pub struct BatchFailure {
    /// Index into the submitted batch.
    pub index: usize,
    pub error: PublishError,
}

/// Back-pressure and downstream availability report.
#[derive(Debug, Clone)]
pub struct PublisherHealth {
    pub healthy: bool,
    pub accepting: bool,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    /// Queue above 90% of capacity.
    pub backpressure: bool,
    pub store_healthy: bool,
}

/// Drain outcome surfaced by [`AuditPublisher::close`].
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// Events still queued when the shutdown deadline elapsed.
    pub dropped_events: usize,
}

struct Inner<S: EventStore + ?Sized> {
    config: PublisherConfig,
    queue: EventQueue,
    gate: SealGate,
    chain: Mutex<ChainBuilder>,
    subscribers: SubscriberSet,
    metrics: PipelineMetrics,
    closed: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    store: Arc<S>,
}

/// Asynchronous publication pipeline in front of the chain builder
/// and the append-only store.
pub struct AuditPublisher<S: EventStore + ?Sized> {
    inner: Arc<Inner<S>>,
}

impl<S: EventStore + ?Sized> Clone for AuditPublisher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: EventStore + ?Sized + 'static> AuditPublisher<S> {
    /// Recover the chain tail from the store and start the worker
    /// pool.
    pub async fn start(store: Arc<S>, config: PublisherConfig) -> Result<Self, StorageError> {
        let tail = recover_tail(store.as_ref()).await?;
        let inner = Arc::new(Inner {
            queue: EventQueue::new(config.queue_size),
            gate: SealGate::new(),
            chain: Mutex::new(ChainBuilder::with_tail(tail)),
            subscribers: SubscriberSet::new(),
            metrics: PipelineMetrics::new(),
            closed: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            store,
            config,
        });

        let worker_count = inner.config.worker_count.max(1);
        let mut workers = inner.workers.lock().await;
        for worker_id in 0..worker_count {
            workers.push(tokio::spawn(worker_loop(inner.clone(), worker_id)));
        }
        drop(workers);

        info!(
            worker_count,
            queue_size = inner.config.queue_size,
            tail_sequence = tail.sequence,
            "audit publisher started"
        );
        Ok(Self { inner })
    }

    /// Publish one event and wait until it is durably sealed, retries
    /// exhausted, or `publish_timeout` elapses. On timeout the event
    /// may still complete in the background if it was enqueued.
    /// Dropping the returned future cancels only the wait: an event
    /// that was already enqueued still seals, one that was not leaves
    /// no trace on the chain.
    pub async fn publish(&self, event: UnsealedEvent) -> Result<SealedEvent, PublishError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PublishError::Closed);
        }
        let timeout = self.inner.config.publish_timeout;
        let deadline = tokio::time::Instant::now() + timeout;

        let (tx, rx) = oneshot::channel();
        let mut item = QueueItem::new(event, Some(tx));
        loop {
            match self.inner.queue.try_push(item).await {
                Ok(()) => break,
                Err(back) => {
                    // Could not even enqueue within the bound: that is
                    // back-pressure, not downstream slowness.
                    if tokio::time::Instant::now() >= deadline {
                        self.inner.metrics.record_failed(1);
                        return Err(PublishError::Overload);
                    }
                    if self.inner.closed.load(Ordering::Acquire) {
                        return Err(PublishError::Closed);
                    }
                    item = back;
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            }
        }

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PublishError::Closed),
            Err(_) => Err(PublishError::Timeout(timeout)),
        }
    }

    /// Publish a batch; partial success is returned per index.
    pub async fn publish_batch(&self, events: Vec<UnsealedEvent>) -> BatchOutcome {
        let timeout = self.inner.config.publish_timeout;
        let deadline = tokio::time::Instant::now() + timeout;

        let mut receivers = Vec::with_capacity(events.len());
        let mut failed = Vec::new();
        for (index, event) in events.into_iter().enumerate() {
            if self.inner.closed.load(Ordering::Acquire) {
                failed.push(BatchFailure {
                    index,
                    error: PublishError::Closed,
                });
                continue;
            }
            let (tx, rx) = oneshot::channel();
            let mut item = QueueItem::new(event, Some(tx));
            loop {
                match self.inner.queue.try_push(item).await {
                    Ok(()) => {
                        receivers.push((index, rx));
                        break;
                    }
                    Err(back) => {
                        if tokio::time::Instant::now() >= deadline {
                            self.inner.metrics.record_failed(1);
                            failed.push(BatchFailure {
                                index,
                                error: PublishError::Overload,
                            });
                            break;
                        }
                        item = back;
                        tokio::time::sleep(Duration::from_millis(2)).await;
                    }
                }
            }
        }

        let awaited = futures::future::join_all(receivers.into_iter().map(|(index, rx)| async move {
            (index, tokio::time::timeout_at(deadline, rx).await)
        }))
        .await;

        let mut published = Vec::new();
        for (index, outcome) in awaited {
            match outcome {
                Ok(Ok(Ok(sealed))) => published.push(sealed),
                Ok(Ok(Err(error))) => failed.push(BatchFailure { index, error }),
                Ok(Err(_)) => failed.push(BatchFailure {
                    index,
                    error: PublishError::Closed,
                }),
                Err(_) => failed.push(BatchFailure {
                    index,
                    error: PublishError::Timeout(timeout),
                }),
            }
        }
        BatchOutcome { published, failed }
    }

    /// Best-effort enqueue. Never returns an error: a full queue or
    /// closed publisher drops the event and bumps the failure
    /// counters.
    pub async fn publish_async(&self, event: UnsealedEvent) {
        if self.inner.closed.load(Ordering::Acquire) {
            self.inner.metrics.record_dropped(1);
            return;
        }
        let item = QueueItem::new(event, None);
        if self.inner.queue.try_push(item).await.is_err() {
            self.inner.metrics.record_dropped(1);
            debug!("queue full; event dropped");
        }
    }

    /// Convert a domain object and publish synchronously.
    pub async fn publish_source<T: AuditSource>(&self, source: &T) -> Result<SealedEvent, PublishError> {
        match source.to_audit_event() {
            Ok(event) => self.publish(event).await,
            Err(error) => {
                self.inner.metrics.record_conversion_failure();
                Err(PublishError::Validation(error))
            }
        }
    }

    /// Convert a domain object and publish best-effort. Conversion
    /// failures are dropped and counted, never enqueued.
    pub async fn publish_source_async<T: AuditSource>(&self, source: &T) {
        match source.to_audit_event() {
            Ok(event) => self.publish_async(event).await,
            Err(error) => {
                self.inner.metrics.record_conversion_failure();
                debug!(code = error.code(), "conversion failed; event dropped");
            }
        }
    }

    /// Register an observer; returns the handle for `unsubscribe`.
    pub fn subscribe(&self, subscriber: Arc<dyn PublishSubscriber>) -> SubscriptionHandle {
        self.inner.subscribers.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.inner.subscribers.unsubscribe(handle)
    }

    pub async fn health(&self) -> PublisherHealth {
        let queue_depth = self.inner.queue.len().await;
        let queue_capacity = self.inner.queue.capacity();
        let backpressure = queue_depth * 10 >= queue_capacity * 9;
        let store_healthy = self.inner.store.is_healthy().await;
        let accepting = !self.inner.closed.load(Ordering::Acquire);
        PublisherHealth {
            healthy: accepting && !backpressure && store_healthy,
            accepting,
            queue_depth,
            queue_capacity,
            backpressure,
            store_healthy,
        }
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot(self.inner.queue.len().await)
    }

    /// Graceful drain: stop accepting, let workers flush until
    /// `shutdown_timeout`, then force termination. Unflushed counts
    /// are surfaced in the report.
    pub async fn close(&self) -> ShutdownReport {
        self.inner.closed.store(true, Ordering::Release);
        let deadline = tokio::time::Instant::now() + self.inner.config.shutdown_timeout;

        let mut handles = self.inner.workers.lock().await;
        for mut handle in handles.drain(..) {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
            }
        }
        drop(handles);

        let leftovers = self.inner.queue.drain_all().await;
        let dropped_events = leftovers.len();
        if dropped_events > 0 {
            self.inner.metrics.record_dropped(dropped_events as u64);
            warn!(
                dropped = dropped_events,
                "shutdown deadline elapsed with unflushed events"
            );
        }
        for item in leftovers {
            if let Some(reply) = item.reply {
                let _ = reply.send(Err(PublishError::Closed));
            }
        }

        info!(dropped = dropped_events, "audit publisher closed");
        ShutdownReport { dropped_events }
    }
}

/// Worker: assemble a ticketed batch, wait for its turn at the seal
/// gate, seal + append + commit, fan out.
async fn worker_loop<S: EventStore + ?Sized + 'static>(inner: Arc<Inner<S>>, worker_id: usize) {
    let poll = Duration::from_millis(5);
    debug!(worker_id, "pipeline worker started");

    'outer: loop {
        // A batch is drained once, atomically, when enough events are
        // ready or the batch timeout has elapsed since work appeared.
        let mut waiting_since: Option<Instant> = None;
        let (ticket, items) = loop {
            let draining = inner.closed.load(Ordering::Acquire);
            let len = inner.queue.len().await;
            if len == 0 {
                if draining {
                    break 'outer;
                }
                waiting_since = None;
                tokio::time::sleep(poll).await;
                continue;
            }
            let since = *waiting_since.get_or_insert_with(Instant::now);
            if len >= inner.config.batch_size
                || draining
                || since.elapsed() >= inner.config.batch_timeout
            {
                match inner.queue.pop_batch(inner.config.batch_size).await {
                    Some(batch) => break batch,
                    // Another worker drained it first.
                    None => {
                        waiting_since = None;
                        continue;
                    }
                }
            }
            tokio::time::sleep(poll).await;
        };

        inner.gate.admit(ticket).await;
        process_batch(&inner, items).await;
        inner.gate.complete(ticket);
    }

    debug!(worker_id, "pipeline worker stopped");
}

/// Seal and durably append one batch. Per-event seal failures evict
/// only the offending event and re-submit the rest; storage failures
/// retry the whole batch with exponential backoff.
async fn process_batch<S: EventStore + ?Sized>(inner: &Inner<S>, mut items: Vec<QueueItem>) {
    let mut attempt: u32 = 0;
    loop {
        if items.is_empty() {
            return;
        }

        let unsealed: Vec<UnsealedEvent> = items.iter().map(|i| i.event.clone()).collect();
        let mut chain = inner.chain.lock().await;
        match chain.seal_batch(&unsealed) {
            Err(SealBatchError { index, error }) => {
                drop(chain);
                let item = items.remove(index);
                warn!(
                    code = error.code(),
                    event_type = item.event.event_type.as_str(),
                    "event failed to seal; evicted from batch"
                );
                inner.metrics.record_failed(1);
                if let Some(reply) = item.reply {
                    let _ = reply.send(Err(PublishError::from_chain(error)));
                }
                // Re-submit the remainder without consuming a retry.
                continue;
            }
            Ok((sealed, tail)) => match inner.store.append(&sealed).await {
                Ok(()) => {
                    chain.commit(tail);
                    drop(chain);

                    inner.metrics.record_published(sealed.len() as u64);
                    inner.metrics.record_batch_published();
                    for (item, event) in items.into_iter().zip(sealed) {
                        inner.metrics.record_latency(item.enqueued_at.elapsed());
                        inner.subscribers.notify(&event);
                        if let Some(reply) = item.reply {
                            let _ = reply.send(Ok(event));
                        }
                    }
                    return;
                }
                Err(storage_error) => {
                    drop(chain);
                    let retryable = storage_error.is_retryable();
                    if !retryable || attempt >= inner.config.max_retries {
                        error!(
                            attempts = attempt + 1,
                            error = %storage_error,
                            batch = items.len(),
                            "durable append failed; failing batch"
                        );
                        inner.metrics.record_failed(items.len() as u64);
                        inner.metrics.record_batch_failed();
                        let message = storage_error.to_string();
                        for item in items {
                            if let Some(reply) = item.reply {
                                let _ = reply.send(Err(PublishError::Storage {
                                    attempts: attempt + 1,
                                    message: message.clone(),
                                }));
                            }
                        }
                        return;
                    }
                    let delay = inner.config.retry_delay_for(attempt);
                    attempt += 1;
                    inner.metrics.record_retry();
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %storage_error,
                        "durable append failed; retrying batch"
                    );
                    tokio::time::sleep(delay).await;
                }
            },
        }
    }
}
