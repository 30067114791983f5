//! Chain export for external ingestion.
//!
//! Bundles an ordered slice of sealed events with its aggregate
//! digest and verification verdict, and serializes to JSON Lines.
//! Read-only; report formatting belongs to downstream consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use audix_core::{Hash, SealedEvent};

use crate::verifier::ChainVerifier;

/// A verified, fingerprinted slice of the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainExport {
    pub events: Vec<SealedEvent>,
    /// Aggregate digest over the slice; `None` when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice_digest: Option<Hash>,
    pub verified: bool,
    pub exported_at: DateTime<Utc>,
}

impl ChainExport {
    /// Verify and bundle a slice.
    pub fn build(events: Vec<SealedEvent>, verifier: &ChainVerifier) -> Self {
        let report = verifier.verify(&events);
        Self {
            events,
            slice_digest: report.slice_digest,
            verified: report.is_valid,
            exported_at: Utc::now(),
        }
    }

    /// One JSON document per line, compatible with log ingestion
    /// systems.
    pub fn to_jsonl(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
