//! Compliance relevance predicates.
//!
//! Three questions, answerable for any event: does it carry GDPR
//! obligations, does it carry TCPA obligations, and is its legal
//! basis valid. These predicates drive the integrity orchestrator's
//! compliance check and the archive collaborator's retention filter.

use audix_core::{flags, DataClass, Event, EventType};

/// Stateless relevance predicates over single events.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplianceEvaluator;

impl ComplianceEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// GDPR relevance: the `gdpr_relevant` or `contains_pii` flag, or
    /// any GDPR-relevant data class.
    pub fn is_gdpr_relevant(&self, event: &Event) -> bool {
        event.compliance.flag(flags::GDPR_RELEVANT)
            || event.compliance.flag(flags::CONTAINS_PII)
            || event
                .compliance
                .data_classes
                .iter()
                .any(DataClass::gdpr_relevant)
    }

    /// TCPA relevance: the `tcpa_relevant` flag, or a consent/call
    /// initiation event type.
    pub fn is_tcpa_relevant(&self, event: &Event) -> bool {
        event.compliance.flag(flags::TCPA_RELEVANT)
            || matches!(
                event.event_type,
                EventType::ConsentGranted | EventType::ConsentRevoked | EventType::CallInitiated
            )
    }

    /// Legal-basis validity: GDPR-relevant events must name a basis.
    /// (The basis enumeration itself is closed at the type level.)
    pub fn has_valid_legal_basis(&self, event: &Event) -> bool {
        !self.is_gdpr_relevant(event) || event.compliance.legal_basis.is_some()
    }

    /// Whether a TCPA-relevant event carries consent evidence. Only
    /// consent grants and call initiations need evidence; revocations
    /// are valid without it.
    pub fn has_consent_evidence(&self, event: &Event) -> bool {
        if !self.is_tcpa_relevant(event) || event.event_type == EventType::ConsentRevoked {
            return true;
        }
        event.compliance.flag(flags::CONSENT_VERIFIED)
    }
}
