//! In-memory reference backend.
//!
//! Keeps the whole log in a `BTreeMap` keyed by sequence number with
//! an id index on the side. Suitable for tests and for embedding
//! processes that persist elsewhere; durable drivers implement the
//! same trait.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use audix_core::SealedEvent;

use crate::query::{EventFilter, EventPage};
use crate::store::{EventStore, StorageError};

#[derive(Debug, Default)]
struct Inner {
    by_seq: BTreeMap<u64, SealedEvent>,
    by_id: HashMap<Uuid, u64>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_seq.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.by_seq.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn append(&self, events: &[SealedEvent]) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        // Validate the whole batch before touching the map so the
        // append stays atomic.
        for event in events {
            if !event.is_sealed() || event.sequence_num == 0 {
                return Err(StorageError::Rejected(format!(
                    "event {} is not sealed",
                    event.id
                )));
            }
            if inner.by_seq.contains_key(&event.sequence_num) {
                return Err(StorageError::DuplicateSequence(event.sequence_num));
            }
        }
        for event in events {
            inner.by_id.insert(event.id, event.sequence_num);
            inner.by_seq.insert(event.sequence_num, event.clone());
        }
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<SealedEvent>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_id
            .get(&id)
            .and_then(|seq| inner.by_seq.get(seq))
            .cloned())
    }

    async fn get_by_sequence(&self, sequence: u64) -> Result<Option<SealedEvent>, StorageError> {
        Ok(self.inner.read().await.by_seq.get(&sequence).cloned())
    }

    async fn get_sequence_range(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<SealedEvent>, StorageError> {
        if start > end {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().await;
        Ok(inner.by_seq.range(start..=end).map(|(_, e)| e.clone()).collect())
    }

    async fn latest_sequence(&self) -> Result<u64, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.by_seq.keys().next_back().copied().unwrap_or(0))
    }

    async fn query(&self, filter: &EventFilter) -> Result<EventPage, StorageError> {
        let inner = self.inner.read().await;
        let start = filter.cursor.map(|c| c + 1).unwrap_or(0);
        let limit = filter.limit.clamp(1, 10_000);

        let mut events = Vec::with_capacity(limit.min(64));
        let mut next_cursor = None;
        for (seq, event) in inner.by_seq.range(start..) {
            if !filter.matches(event.record()) {
                continue;
            }
            if events.len() == limit {
                next_cursor = Some(events.last().map(|e: &SealedEvent| e.sequence_num).unwrap_or(*seq));
                break;
            }
            events.push(event.clone());
        }
        Ok(EventPage { events, next_cursor })
    }

    async fn replace(&self, event: SealedEvent) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if !inner.by_seq.contains_key(&event.sequence_num) {
            return Err(StorageError::NotFound(format!(
                "sequence {}",
                event.sequence_num
            )));
        }
        if let Some(old) = inner.by_seq.get(&event.sequence_num) {
            let old_id = old.id;
            if old_id != event.id {
                inner.by_id.remove(&old_id);
            }
        }
        inner.by_id.insert(event.id, event.sequence_num);
        inner.by_seq.insert(event.sequence_num, event);
        Ok(())
    }
}
