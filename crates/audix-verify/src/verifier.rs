//! Forward chain verification.
//!
//! Given a contiguous ordered slice of sealed events, the verifier
//! replays the chain invariants and reports every break it finds:
//! sequence gaps, timestamp regressions, structural corruption, and
//! hash mismatches (both a wrong stored digest and a broken link to
//! the previous event). Verification continues past breaks so the
//! full list is reported; at most one break is recorded per event,
//! the first check that fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use audix_core::{event_digest, slice_digest, Hash, SealedEvent};

/// Kind of a detected chain break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    HashMismatch,
    SequenceGap,
    TimestampRegression,
    CorruptedEvent,
}

impl BreakKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HashMismatch => "hash_mismatch",
            Self::SequenceGap => "sequence_gap",
            Self::TimestampRegression => "timestamp_regression",
            Self::CorruptedEvent => "corrupted_event",
        }
    }
}

/// One detected violation of the chain invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainBreak {
    pub event_id: Uuid,
    pub sequence: u64,
    pub kind: BreakKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hash: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_event_id: Option<Uuid>,
}

/// Verifier configuration.
#[derive(Debug, Clone, Default)]
pub struct VerifierConfig {
    /// Sort the input by sequence number before verifying. Off by
    /// default: callers normally pass store-ordered slices, and the
    /// given order is itself evidence.
    pub sort_by_sequence: bool,
    /// Reject an empty input instead of reporting it valid.
    pub reject_empty: bool,
    /// Expected `previous_hash` of the slice's first event, for
    /// verifying a mid-chain slice against its predecessor.
    pub expected_previous: Option<Hash>,
}

/// Result of verifying one slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub is_valid: bool,
    pub events_verified: usize,
    pub breaks: Vec<ChainBreak>,
    /// Fingerprint over the verified slice; `None` for empty input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice_digest: Option<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_sequence: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sequence: Option<u64>,
    pub verified_at: DateTime<Utc>,
}

impl VerificationReport {
    /// Breaks of one kind, for report consumers.
    pub fn breaks_of(&self, kind: BreakKind) -> impl Iterator<Item = &ChainBreak> {
        self.breaks.iter().filter(move |b| b.kind == kind)
    }
}

/// Replays chain invariants over sealed slices.
#[derive(Debug, Clone, Default)]
pub struct ChainVerifier {
    config: VerifierConfig,
}

impl ChainVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Verify a slice and collect every break.
    pub fn verify(&self, events: &[SealedEvent]) -> VerificationReport {
        let mut ordered;
        let events = if self.config.sort_by_sequence {
            ordered = events.to_vec();
            ordered.sort_by_key(|e| e.sequence_num);
            &ordered[..]
        } else {
            events
        };

        if events.is_empty() {
            return VerificationReport {
                is_valid: !self.config.reject_empty,
                events_verified: 0,
                breaks: Vec::new(),
                slice_digest: None,
                first_sequence: None,
                last_sequence: None,
                verified_at: Utc::now(),
            };
        }

        let mut breaks = Vec::new();
        // Expected sequence counter; marches by one from the first
        // event's actual sequence regardless of later deviations.
        let mut expected_seq: Option<u64> = None;
        let mut prev_ts: Option<DateTime<Utc>> = None;
        let mut prev_id: Option<Uuid> = None;
        // Hash the next event's previous_hash must point at. `None`
        // models the genesis expectation / configured predecessor.
        let mut expected_prev: Option<Hash> = self.config.expected_previous;
        let mut first = true;

        for event in events {
            let record = event.record();
            let sequence = record.sequence_num;
            let (found, link_target) = self.check_event(
                record,
                expected_seq,
                prev_ts,
                prev_id,
                expected_prev,
                first,
            );
            expected_prev = link_target;

            if let Some(chain_break) = found {
                warn!(
                    sequence,
                    kind = chain_break.kind.as_str(),
                    description = %chain_break.description,
                    "chain break detected"
                );
                breaks.push(chain_break);
            }

            expected_seq = Some(expected_seq.unwrap_or(sequence) + 1);
            prev_ts = Some(record.timestamp);
            prev_id = Some(record.id);
            first = false;
        }

        VerificationReport {
            is_valid: breaks.is_empty(),
            events_verified: events.len(),
            breaks,
            slice_digest: Some(slice_digest(events.iter().map(|e| e.record()))),
            first_sequence: events.first().map(|e| e.sequence_num),
            last_sequence: events.last().map(|e| e.sequence_num),
            verified_at: Utc::now(),
        }
    }

    /// Run the per-event checks in order. Returns the first failure
    /// (if any) together with the digest the NEXT event's
    /// `previous_hash` must point at: the recomputed digest when the
    /// stored one is wrong, the stored digest otherwise.
    fn check_event(
        &self,
        record: &audix_core::Event,
        expected_seq: Option<u64>,
        prev_ts: Option<DateTime<Utc>>,
        prev_id: Option<Uuid>,
        expected_prev: Option<Hash>,
        first: bool,
    ) -> (Option<ChainBreak>, Option<Hash>) {
        let base = |kind: BreakKind, description: String| ChainBreak {
            event_id: record.id,
            sequence: record.sequence_num,
            kind,
            expected_hash: None,
            actual_hash: None,
            description,
            previous_event_id: prev_id,
        };
        let stored = record.event_hash;

        // I2: contiguous sequence numbers.
        if let Some(expected) = expected_seq {
            if record.sequence_num != expected {
                let b = base(
                    BreakKind::SequenceGap,
                    format!("Expected sequence {expected}, got {}", record.sequence_num),
                );
                return (Some(b), stored);
            }
        }

        // I3: non-decreasing timestamps.
        if let Some(prev) = prev_ts {
            if record.timestamp < prev {
                let b = base(
                    BreakKind::TimestampRegression,
                    format!("timestamp {} precedes predecessor {prev}", record.timestamp),
                );
                return (Some(b), stored);
            }
        }

        // Structural validity.
        if let Err(err) = record.validate() {
            let b = base(
                BreakKind::CorruptedEvent,
                format!("structural validation failed: {}", err.code()),
            );
            return (Some(b), stored);
        }
        let Some(stored) = stored else {
            let b = base(
                BreakKind::CorruptedEvent,
                "event carries no hash".to_string(),
            );
            return (Some(b), None);
        };

        // I5: stored digest matches the canonical recomputation.
        let recomputed = event_digest(record);
        if recomputed != stored {
            let mut b = base(
                BreakKind::HashMismatch,
                "stored hash does not match recomputed canonical digest".to_string(),
            );
            b.expected_hash = Some(recomputed.to_hex());
            b.actual_hash = Some(stored.to_hex());
            return (Some(b), Some(recomputed));
        }

        // I4: link to the previous event. For the slice's first event
        // the expectation comes from configuration, or from the
        // genesis rule when the slice starts at sequence 1.
        let link_expectation = if first {
            if record.sequence_num == 1 {
                Some(None)
            } else {
                self.config.expected_previous.map(Some)
            }
        } else {
            Some(expected_prev)
        };
        if let Some(expected) = link_expectation {
            if record.previous_hash != expected {
                let mut b = base(
                    BreakKind::HashMismatch,
                    "previous_hash does not match predecessor digest".to_string(),
                );
                b.expected_hash = expected.map(|h| h.to_hex());
                b.actual_hash = record.previous_hash.map(|h| h.to_hex());
                return (Some(b), Some(stored));
            }
        }

        (None, Some(stored))
    }
}
