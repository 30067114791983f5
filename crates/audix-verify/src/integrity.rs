//! Integrity orchestration: one report over a sequence range.
//!
//! Composes forward chain verification, store-level sequence checks
//! (missing and duplicated sequence numbers) and the compliance
//! predicates into a single health-classified report with
//! recommended remediations. The orchestrator only reads; it never
//! mutates events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use audix_compliance::{ComplianceEvaluator, LegalHold, RetentionEvaluator};
use audix_persist::{EventStore, StorageError};

use crate::verifier::{ChainVerifier, VerificationReport, VerifierConfig};

/// Overall classification of a checked range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

/// A compliance shortfall on one stored event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceDeficit {
    pub event_id: Uuid,
    pub sequence: u64,
    pub kind: DeficitKind,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeficitKind {
    MissingLegalBasis,
    MissingConsentEvidence,
    RetentionExpired,
}

/// Composite integrity report over one sequence range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub start: u64,
    pub end: u64,
    pub verification: VerificationReport,
    /// Sequence numbers expected in the range but absent from the
    /// store: data loss downstream of the chain builder.
    pub missing_sequences: Vec<u64>,
    /// Sequence numbers occurring more than once in the scanned
    /// slice. Unrepresentable in well-behaved backends.
    pub duplicate_sequences: Vec<u64>,
    pub deficits: Vec<ComplianceDeficit>,
    pub health: HealthStatus,
    pub recommendations: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

/// Read-only composition of verifier, store checks and compliance
/// predicates.
#[derive(Debug)]
pub struct IntegrityOrchestrator<S: EventStore + ?Sized> {
    store: Arc<S>,
    compliance: ComplianceEvaluator,
    retention: RetentionEvaluator,
    holds: Vec<LegalHold>,
}

impl<S: EventStore + ?Sized> IntegrityOrchestrator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            compliance: ComplianceEvaluator::new(),
            retention: RetentionEvaluator::default(),
            holds: Vec::new(),
        }
    }

    pub fn with_retention(mut self, retention: RetentionEvaluator) -> Self {
        self.retention = retention;
        self
    }

    /// Legal holds consulted by the retention check.
    pub fn with_holds(mut self, holds: Vec<LegalHold>) -> Self {
        self.holds = holds;
        self
    }

    /// Check the inclusive range `[start, end]`, clamped to the
    /// store's latest sequence.
    pub async fn check_range(&self, start: u64, end: u64) -> Result<IntegrityReport, StorageError> {
        let latest = self.store.latest_sequence().await?;
        let effective_end = end.min(latest);

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

        let events = self.store.get_sequence_range(start, effective_end).await?;
        let verification = verifier.verify(&events);

        let present: BTreeSet<u64> = events.iter().map(|e| e.sequence_num).collect();
        let missing_sequences: Vec<u64> = if start <= effective_end {
            (start..=effective_end).filter(|s| !present.contains(s)).collect()
        } else {
            Vec::new()
        };

        let mut seen = BTreeSet::new();
        let mut duplicate_sequences = Vec::new();
        for event in &events {
            if !seen.insert(event.sequence_num) {
                duplicate_sequences.push(event.sequence_num);
            }
        }

        let now = Utc::now();
        let mut deficits = Vec::new();
        for event in &events {
            let record = event.record();
            if !self.compliance.has_valid_legal_basis(record) {
                deficits.push(ComplianceDeficit {
                    event_id: record.id,
                    sequence: record.sequence_num,
                    kind: DeficitKind::MissingLegalBasis,
                    description: "GDPR-relevant event without a legal basis".to_string(),
                });
            }
            if !self.compliance.has_consent_evidence(record) {
                deficits.push(ComplianceDeficit {
                    event_id: record.id,
                    sequence: record.sequence_num,
                    kind: DeficitKind::MissingConsentEvidence,
                    description: "TCPA-relevant event without consent evidence".to_string(),
                });
            }
            if self.retention.evaluate(record, &self.holds, now).is_expired() {
                deficits.push(ComplianceDeficit {
                    event_id: record.id,
                    sequence: record.sequence_num,
                    kind: DeficitKind::RetentionExpired,
                    description: "retention window elapsed but event is still present".to_string(),
                });
            }
        }

        let health = classify(&verification, &missing_sequences, &duplicate_sequences, &deficits);
        let recommendations = recommend(
            start,
            effective_end,
            &verification,
            &missing_sequences,
            &duplicate_sequences,
            &deficits,
        );

        info!(
            start,
            end = effective_end,
            health = ?health,
            breaks = verification.breaks.len(),
            deficits = deficits.len(),
            "integrity check completed"
        );

        Ok(IntegrityReport {
            start,
            end: effective_end,
            verification,
            missing_sequences,
            duplicate_sequences,
            deficits,
            health,
            recommendations,
            checked_at: now,
        })
    }
}

fn classify(
    verification: &VerificationReport,
    missing: &[u64],
    duplicates: &[u64],
    deficits: &[ComplianceDeficit],
) -> HealthStatus {
    if !verification.is_valid || !missing.is_empty() || !duplicates.is_empty() {
        HealthStatus::Critical
    } else if !deficits.is_empty() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

fn recommend(
    start: u64,
    end: u64,
    verification: &VerificationReport,
    missing: &[u64],
    duplicates: &[u64],
    deficits: &[ComplianceDeficit],
) -> Vec<String> {
    let mut out = Vec::new();
    if !verification.is_valid {
        out.push(format!(
            "run chain repair over [{start}, {end}]: {} break(s) detected",
            verification.breaks.len()
        ));
    }
    if !missing.is_empty() {
        out.push(format!(
            "restore {} missing event(s) from archive or replica (data loss downstream)",
            missing.len()
        ));
    }
    if !duplicates.is_empty() {
        out.push(format!(
            "investigate storage backend: {} duplicated sequence number(s)",
            duplicates.len()
        ));
    }
    let legal = deficits
        .iter()
        .filter(|d| d.kind == DeficitKind::MissingLegalBasis)
        .count();
    if legal > 0 {
        out.push(format!("record a legal basis for {legal} GDPR-relevant event(s)"));
    }
    let consent = deficits
        .iter()
        .filter(|d| d.kind == DeficitKind::MissingConsentEvidence)
        .count();
    if consent > 0 {
        out.push(format!("attach consent evidence to {consent} TCPA-relevant event(s)"));
    }
    let expired = deficits
        .iter()
        .filter(|d| d.kind == DeficitKind::RetentionExpired)
        .count();
    if expired > 0 {
        out.push(format!("archive or delete {expired} retention-expired event(s)"));
    }
    out
}
