//! The append-only store contract and its error type.

use async_trait::async_trait;
use std::fmt::Debug;
use uuid::Uuid;

use audix_core::{ChainTail, SealedEvent};

use crate::query::{EventFilter, EventPage};

/// Storage error types.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("append rejected: {0}")]
    Rejected(String),

    #[error("duplicate sequence: {0}")]
    DuplicateSequence(u64),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether a retry against the same backend can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Append-only, totally ordered store keyed by sequence number.
///
/// `append` is atomic per batch: either every event in the batch is
/// persisted or none is. Sealed events are never updated through this
/// trait except via [`replace`](EventStore::replace), which exists
/// solely for the chain repair service.
#[async_trait]
pub trait EventStore: Send + Sync + Debug {
    /// Backend name, for diagnostics.
    fn name(&self) -> &str;

    /// Whether the backend can currently serve reads and writes.
    async fn is_healthy(&self) -> bool;

    /// Append a batch atomically. Rejects duplicates of any already
    /// stored sequence number.
    async fn append(&self, events: &[SealedEvent]) -> Result<(), StorageError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<SealedEvent>, StorageError>;

    async fn get_by_sequence(&self, sequence: u64) -> Result<Option<SealedEvent>, StorageError>;

    /// Inclusive range, ascending by sequence. Missing sequences are
    /// simply absent from the result.
    async fn get_sequence_range(&self, start: u64, end: u64)
        -> Result<Vec<SealedEvent>, StorageError>;

    /// Highest stored sequence number; zero for an empty store.
    async fn latest_sequence(&self) -> Result<u64, StorageError>;

    /// Filtered, cursor-paginated scan in sequence order.
    async fn query(&self, filter: &EventFilter) -> Result<EventPage, StorageError>;

    /// Overwrite the record at its sequence position. Repair-only:
    /// the chain repair service uses this to rewrite linkage fields.
    async fn replace(&self, event: SealedEvent) -> Result<(), StorageError>;
}

/// Rebuild the chain tail from the store, so a restarted process
/// resumes sealing where the last one stopped.
pub async fn recover_tail<S: EventStore + ?Sized>(store: &S) -> Result<ChainTail, StorageError> {
    let latest = store.latest_sequence().await?;
    if latest == 0 {
        return Ok(ChainTail::genesis());
    }
    let event = store
        .get_by_sequence(latest)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("sequence {latest}")))?;
    Ok(ChainTail::at(&event))
}
