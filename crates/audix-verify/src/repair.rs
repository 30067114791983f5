//! Bounded chain repair.
//!
//! Repair restores the linkage invariants over a sequence range
//! after a detected break: it locates the first break, then walks
//! forward relinking each event to its predecessor's digest and
//! recomputing the event hash, recording an old-to-new trail entry
//! for every rewritten record. Structurally corrupted records are
//! marked unrepairable and skipped; events behind them keep their
//! original linkage. The run itself is appended to the chain as a
//! `chain_repaired` system event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use audix_core::{
    event_digest, ActorKind, ChainBuilder, ChainError, EventBuilder, EventType, Hash, SealedEvent,
    TargetKind, ValidationError,
};
use audix_persist::{recover_tail, EventStore, StorageError};

use crate::verifier::{ChainVerifier, VerificationReport, VerifierConfig};

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("invalid repair range [{start}, {end}]")]
    InvalidRange { start: u64, end: u64 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// What happened to one event during a repair run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    /// Linkage fields rewritten and digest recomputed.
    Rehashed,
    /// Structurally corrupted; left untouched.
    Unrepairable,
}

/// Auditable trail entry for one touched event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairEntry {
    pub event_id: Uuid,
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_hash: Option<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<Hash>,
    pub action: RepairAction,
}

/// Outcome of one repair run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairReport {
    pub start: u64,
    pub end: u64,
    pub pre_verification: VerificationReport,
    /// Absent when the range was already intact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_verification: Option<VerificationReport>,
    pub entries: Vec<RepairEntry>,
    pub events_repaired: usize,
    pub unrepairable: usize,
    pub repaired_at: DateTime<Utc>,
}

impl RepairReport {
    pub fn was_needed(&self) -> bool {
        !self.pre_verification.is_valid
    }
}

/// Link target while walking forward through the range.
enum LinkTarget {
    /// Relink the next event to this digest (`None` = genesis).
    Known(Option<Hash>),
    /// Predecessor was unrepairable; leave the next event's link as
    /// stored.
    Unknown,
}

/// Restores I4/I5 over a range, under explicit authorization.
#[derive(Debug)]
pub struct ChainRepairService<S: EventStore + ?Sized> {
    store: Arc<S>,
}

impl<S: EventStore + ?Sized> ChainRepairService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Repair the inclusive sequence range `[start, end]`. Idempotent:
    /// an intact range is re-verified and returned untouched.
    pub async fn repair_range(&self, start: u64, end: u64) -> Result<RepairReport, RepairError> {
        if start == 0 || start > end {
            return Err(RepairError::InvalidRange { start, end });
        }

        let predecessor_hash = if start > 1 {
            self.store
                .get_by_sequence(start - 1)
                .await?
                .and_then(|e| e.event_hash)
        } else {
            None
        };
        let verifier = ChainVerifier::with_config(VerifierConfig {
            expected_previous: predecessor_hash,
            ..Default::default()
        });

        let events = self.store.get_sequence_range(start, end).await?;
        let pre_verification = verifier.verify(&events);
        let Some(first_break) = pre_verification.breaks.first() else {
            return Ok(RepairReport {
                start,
                end,
                pre_verification,
                post_verification: None,
                entries: Vec::new(),
                events_repaired: 0,
                unrepairable: 0,
                repaired_at: Utc::now(),
            });
        };

        // Walk forward from the first break; everything before it is
        // known intact.
        let first_break_id = first_break.event_id;
        let break_index = events
            .iter()
            .position(|e| e.id == first_break_id)
            .unwrap_or(0);
        let mut link = LinkTarget::Known(match break_index {
            0 => predecessor_hash,
            i => events[i - 1].event_hash,
        });

        let mut entries = Vec::new();
        let mut events_repaired = 0usize;
        let mut unrepairable = 0usize;

        for event in &events[break_index..] {
            let mut record = event.record().clone();

            if record.validate().is_err() {
                warn!(
                    sequence = record.sequence_num,
                    event_id = %record.id,
                    "unrepairable record, skipping"
                );
                entries.push(RepairEntry {
                    event_id: record.id,
                    sequence: record.sequence_num,
                    old_hash: record.event_hash,
                    new_hash: None,
                    action: RepairAction::Unrepairable,
                });
                unrepairable += 1;
                link = LinkTarget::Unknown;
                continue;
            }

            let old_hash = record.event_hash;
            let old_prev = record.previous_hash;
            if let LinkTarget::Known(target) = &link {
                record.previous_hash = *target;
            }
            let new_hash = event_digest(&record);
            record.event_hash = Some(new_hash);

            if old_hash != Some(new_hash) || old_prev != record.previous_hash {
                self.store
                    .replace(SealedEvent::from_record_unchecked(record.clone()))
                    .await?;
                entries.push(RepairEntry {
                    event_id: record.id,
                    sequence: record.sequence_num,
                    old_hash,
                    new_hash: Some(new_hash),
                    action: RepairAction::Rehashed,
                });
                events_repaired += 1;
            }
            link = LinkTarget::Known(Some(new_hash));
        }

        let repaired = self.store.get_sequence_range(start, end).await?;
        let post_verification = verifier.verify(&repaired);

        info!(
            start,
            end,
            events_repaired,
            unrepairable,
            post_valid = post_verification.is_valid,
            "chain repair completed"
        );

        Ok(RepairReport {
            start,
            end,
            pre_verification,
            post_verification: Some(post_verification),
            entries,
            events_repaired,
            unrepairable,
            repaired_at: Utc::now(),
        })
    }

    /// Record a completed repair run in the chain itself, as a
    /// `chain_repaired` system event sealed at the current tail.
    pub async fn record_repair_event(&self, report: &RepairReport) -> Result<SealedEvent, RepairError> {
        let event = EventBuilder::new(EventType::ChainRepaired)
            .actor("chain-repair", ActorKind::Service)
            .target("audit-chain", TargetKind::System)
            .action("repair chain segment")
            .metadata("start_sequence", serde_json::json!(report.start))
            .metadata("end_sequence", serde_json::json!(report.end))
            .metadata("events_repaired", serde_json::json!(report.events_repaired))
            .metadata("unrepairable", serde_json::json!(report.unrepairable))
            .build()?;

        let tail = recover_tail(self.store.as_ref()).await?;
        let sealed = ChainBuilder::with_tail(tail).seal(event)?;
        self.store.append(std::slice::from_ref(&sealed)).await?;
        Ok(sealed)
    }
}
