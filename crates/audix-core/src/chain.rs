//! Sealing pre-seal events into the hash chain.
//!
//! The chain builder owns the tail triple (sequence, hash,
//! timestamp) and is the only component that assigns sequence
//! numbers. Callers that need durability guarantees seal against a
//! scratch tail with [`ChainBuilder::seal_batch`] and only
//! [`ChainBuilder::commit`] after the durable append succeeded, so a
//! rejected write never advances the tail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::canonical::event_digest;
use crate::error::ChainError;
use crate::event::{SealedEvent, UnsealedEvent};
use crate::hash::Hash;

/// The most-recently-sealed event's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTail {
    pub sequence: u64,
    /// `None` before the genesis event is sealed.
    pub hash: Option<Hash>,
    pub timestamp: DateTime<Utc>,
}

impl ChainTail {
    /// Tail of an empty chain: sequence 0, empty hash, epoch.
    pub fn genesis() -> Self {
        Self {
            sequence: 0,
            hash: None,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Tail positioned at an existing sealed event.
    pub fn at(event: &SealedEvent) -> Self {
        Self {
            sequence: event.sequence_num,
            hash: event.event_hash,
            timestamp: event.timestamp,
        }
    }
}

impl Default for ChainTail {
    fn default() -> Self {
        Self::genesis()
    }
}

/// Serializer for seal operations; holds exclusive access to the tail.
#[derive(Debug)]
pub struct ChainBuilder {
    tail: ChainTail,
}

impl ChainBuilder {
    /// A builder over an empty store.
    pub fn new() -> Self {
        Self::with_tail(ChainTail::genesis())
    }

    /// A builder resuming from a recovered tail.
    pub fn with_tail(tail: ChainTail) -> Self {
        Self { tail }
    }

    pub fn tail(&self) -> ChainTail {
        self.tail
    }

    /// Seal a batch against the current tail without advancing it.
    /// Returns the sealed events together with the tail they end at;
    /// pass that tail to [`commit`](Self::commit) once the batch is
    /// durable. Fails on the first offending event, identifying it by
    /// position.
    pub fn seal_batch(
        &self,
        events: &[UnsealedEvent],
    ) -> Result<(Vec<SealedEvent>, ChainTail), SealBatchError> {
        let mut tail = self.tail;
        let mut sealed = Vec::with_capacity(events.len());
        for (index, event) in events.iter().enumerate() {
            match Self::seal_one(&tail, event) {
                Ok(out) => {
                    tail = ChainTail::at(&out);
                    sealed.push(out);
                }
                Err(error) => return Err(SealBatchError { index, error }),
            }
        }
        Ok((sealed, tail))
    }

    /// Advance the tail after a successful durable append.
    pub fn commit(&mut self, tail: ChainTail) {
        debug_assert!(tail.sequence >= self.tail.sequence);
        self.tail = tail;
    }

    /// Seal a single event and advance the tail immediately. For
    /// callers without a separate durability step.
    pub fn seal(&mut self, event: UnsealedEvent) -> Result<SealedEvent, ChainError> {
        let sealed = Self::seal_one(&self.tail, &event)?;
        self.tail = ChainTail::at(&sealed);
        Ok(sealed)
    }

    fn seal_one(tail: &ChainTail, event: &UnsealedEvent) -> Result<SealedEvent, ChainError> {
        let record = event.record();
        if record.is_sealed() || record.sequence_num != 0 {
            return Err(ChainError::ImmutabilityViolation);
        }
        if record.timestamp < tail.timestamp {
            return Err(ChainError::TimestampRegression {
                event: record.timestamp,
                tail: tail.timestamp,
            });
        }
        record.validate()?;

        let mut record = record.clone();
        record.sequence_num = tail.sequence + 1;
        record.previous_hash = tail.hash;
        record.event_hash = Some(event_digest(&record));

        debug!(
            sequence = record.sequence_num,
            event_type = record.event_type.as_str(),
            "sealed event"
        );
        Ok(SealedEvent::sealed(record))
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A seal failure at a known position within a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event at batch index {index} failed to seal: {error}")]
pub struct SealBatchError {
    pub index: usize,
    pub error: ChainError,
}
