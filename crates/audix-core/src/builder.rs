//! Fluent, validating construction of pre-seal events.
//!
//! Setters never fail; problems accumulate and are reported from
//! [`EventBuilder::build`], which also applies convention defaults:
//! severity derived from type and result, retention derived from type
//! and data classes, metadata redaction. The factories produce
//! correctly-flagged builders for the common domain patterns.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::event::{
    flags, redact_metadata, retention_floor_days, Actor, ComplianceMetadata, Correlation, ErrorDetail,
    Event, ServiceMetadata, Target, UnsealedEvent,
};
use crate::event_type::{ActorKind, DataClass, EventResult, EventType, LegalBasis, Severity, TargetKind};

#[derive(Debug, Clone)]
pub struct EventBuilder {
    record: Event,
    severity_set: bool,
    retention_set: bool,
    errors: Vec<ValidationError>,
}

impl EventBuilder {
    pub fn new(event_type: EventType) -> Self {
        Self {
            record: Event {
                id: Uuid::new_v4(),
                sequence_num: 0,
                timestamp: Utc::now(),
                event_type,
                severity: event_type.base_severity(),
                actor: Actor::new("", ActorKind::System),
                target: Target::new("", TargetKind::System),
                action: String::new(),
                result: EventResult::Success,
                error: None,
                correlation: Correlation::default(),
                service_metadata: ServiceMetadata::default(),
                compliance: ComplianceMetadata::default(),
                metadata: BTreeMap::new(),
                tags: BTreeSet::new(),
                previous_hash: None,
                event_hash: None,
                signature: None,
            },
            severity_set: false,
            retention_set: false,
            errors: Vec::new(),
        }
    }

    pub fn actor(mut self, id: impl Into<String>, kind: ActorKind) -> Self {
        self.record.actor.id = id.into();
        self.record.actor.kind = kind;
        self
    }

    pub fn actor_ip(mut self, ip: impl Into<String>) -> Self {
        self.record.actor.ip = Some(ip.into());
        self
    }

    pub fn actor_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.record.actor.user_agent = Some(user_agent.into());
        self
    }

    pub fn target(mut self, id: impl Into<String>, kind: TargetKind) -> Self {
        self.record.target.id = id.into();
        self.record.target.kind = kind;
        self
    }

    pub fn target_owner(mut self, owner: impl Into<String>) -> Self {
        self.record.target.owner = Some(owner.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.record.action = action.into();
        self
    }

    pub fn result(mut self, result: EventResult) -> Self {
        self.record.result = result;
        self
    }

    pub fn error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.record.error = Some(ErrorDetail {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.record.severity = severity;
        self.severity_set = true;
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.record.correlation.request_id = Some(id.into());
        self
    }

    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.record.correlation.session_id = Some(id.into());
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.record.correlation.correlation_id = Some(id.into());
        self
    }

    pub fn service(
        mut self,
        environment: impl Into<String>,
        service: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.record.service_metadata = ServiceMetadata {
            environment: environment.into(),
            service: service.into(),
            version: version.into(),
        };
        self
    }

    pub fn flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.record.compliance.flags.insert(name.into(), value);
        self
    }

    pub fn data_class(mut self, class: DataClass) -> Self {
        self.record.compliance.data_classes.insert(class);
        self
    }

    pub fn legal_basis(mut self, basis: LegalBasis) -> Self {
        self.record.compliance.legal_basis = Some(basis);
        self
    }

    /// Explicit retention override; values below the computed floor
    /// are rejected at build time (I6).
    pub fn retention_days(mut self, days: u32) -> Self {
        self.record.compliance.retention_days = days;
        self.retention_set = true;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let key = key.into();
        if key.trim().is_empty() {
            self.errors.push(ValidationError::EmptyMetadataKey);
        } else {
            self.record.metadata.insert(key, value);
        }
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.record.tags.insert(tag.into());
        self
    }

    /// Timestamp override, for backfill and replay producers. Sealing
    /// still rejects timestamps older than the chain tail.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.record.timestamp = timestamp;
        self
    }

    /// Finish construction. Applies defaults, redacts sensitive
    /// metadata and validates the record; the earliest accumulated
    /// problem is returned.
    pub fn build(mut self) -> Result<UnsealedEvent, ValidationError> {
        if !self.severity_set {
            self.record.severity = self
                .record
                .event_type
                .base_severity()
                .max(self.record.result.min_severity());
        }

        let floor = retention_floor_days(self.record.event_type, &self.record.compliance.data_classes);
        if !self.retention_set {
            self.record.compliance.retention_days = floor;
        } else if self.record.compliance.retention_days < floor {
            self.errors.push(ValidationError::InvalidRetention {
                got: self.record.compliance.retention_days,
                floor,
            });
        }

        self.record.metadata = self
            .record
            .metadata
            .into_iter()
            .map(|(k, v)| (k, redact_metadata(v)))
            .collect();

        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        self.record.validate()?;
        Ok(UnsealedEvent::new(self.record))
    }

    // --- Factory catalog ------------------------------------------------

    /// A data subject granting consent for a phone number.
    pub fn consent_granted(subject_id: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self::new(EventType::ConsentGranted)
            .actor(subject_id, ActorKind::User)
            .target(phone_number, TargetKind::PhoneNumber)
            .action("grant consent")
            .flag(flags::GDPR_RELEVANT, true)
            .flag(flags::TCPA_RELEVANT, true)
            .flag(flags::CONTAINS_PII, true)
            .flag(flags::CONSENT_VERIFIED, true)
            .data_class(DataClass::PhoneNumber)
            .data_class(DataClass::PersonalData)
            .legal_basis(LegalBasis::Consent)
    }

    /// A data subject revoking previously granted consent.
    pub fn consent_revoked(subject_id: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self::new(EventType::ConsentRevoked)
            .actor(subject_id, ActorKind::User)
            .target(phone_number, TargetKind::PhoneNumber)
            .action("revoke consent")
            .flag(flags::GDPR_RELEVANT, true)
            .flag(flags::TCPA_RELEVANT, true)
            .flag(flags::CONTAINS_PII, true)
            .data_class(DataClass::PhoneNumber)
            .data_class(DataClass::PersonalData)
            .legal_basis(LegalBasis::Consent)
    }

    /// An operator or service reading subject data.
    pub fn data_access(
        actor_id: impl Into<String>,
        target_id: impl Into<String>,
        target_kind: TargetKind,
    ) -> Self {
        Self::new(EventType::DataAccessed)
            .actor(actor_id, ActorKind::User)
            .target(target_id, target_kind)
            .action("access data")
            .flag(flags::GDPR_RELEVANT, true)
            .flag(flags::CONTAINS_PII, true)
            .data_class(DataClass::PersonalData)
            .legal_basis(LegalBasis::LegitimateInterests)
    }

    /// Outbound call placed to a consented number.
    pub fn call_initiated(caller_id: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self::new(EventType::CallInitiated)
            .actor(caller_id, ActorKind::User)
            .target(call_id, TargetKind::Call)
            .action("initiate call")
            .flag(flags::TCPA_RELEVANT, true)
            .flag(flags::CONSENT_VERIFIED, true)
            .data_class(DataClass::PhoneNumber)
            .legal_basis(LegalBasis::Consent)
    }

    /// A buyer bidding on a call in the marketplace.
    pub fn bid_placed(buyer_id: impl Into<String>, bid_id: impl Into<String>, amount_cents: u64) -> Self {
        Self::new(EventType::BidPlaced)
            .actor(buyer_id, ActorKind::Service)
            .target(bid_id, TargetKind::Bid)
            .action("place bid")
            .flag(flags::FINANCIAL_DATA, true)
            .data_class(DataClass::FinancialData)
            .legal_basis(LegalBasis::Contract)
            .metadata("amount_cents", serde_json::json!(amount_cents))
    }

    /// A failed authentication attempt.
    pub fn auth_failure(actor_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let actor_id = actor_id.into();
        Self::new(EventType::AuthFailure)
            .actor(actor_id.clone(), ActorKind::User)
            .target(actor_id, TargetKind::Account)
            .action("authenticate")
            .result(EventResult::Failure)
            .error("auth_failed", reason)
    }

    /// An API surface invocation.
    pub fn api_call(actor_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self::new(EventType::ApiCall)
            .actor(actor_id, ActorKind::Api)
            .target(endpoint.clone(), TargetKind::System)
            .action("invoke endpoint")
            .metadata("endpoint", serde_json::json!(endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_derived() {
        let event = EventBuilder::new(EventType::CallInitiated)
            .actor("u1", ActorKind::User)
            .target("c1", TargetKind::Call)
            .action("initiate call")
            .build()
            .unwrap();
        assert_eq!(event.severity, Severity::Info);
        assert_eq!(event.compliance.retention_days, 2555);
        assert_eq!(event.sequence_num, 0);
        assert!(!event.is_sealed());
    }

    #[test]
    fn severity_tracks_result() {
        let event = EventBuilder::new(EventType::CallInitiated)
            .actor("u1", ActorKind::User)
            .target("c1", TargetKind::Call)
            .action("initiate call")
            .result(EventResult::Timeout)
            .build()
            .unwrap();
        assert_eq!(event.severity, Severity::Error);

        let event = EventBuilder::new(EventType::AuthFailure)
            .actor("u1", ActorKind::User)
            .target("u1", TargetKind::Account)
            .action("authenticate")
            .result(EventResult::Failure)
            .error("auth_failed", "bad password")
            .build()
            .unwrap();
        assert_eq!(event.severity, Severity::Error);
    }

    #[test]
    fn explicit_severity_wins() {
        let event = EventBuilder::new(EventType::ConfigChanged)
            .actor("admin", ActorKind::Admin)
            .target("routing", TargetKind::Configuration)
            .action("rewrite routing table")
            .severity(Severity::Critical)
            .build()
            .unwrap();
        assert_eq!(event.severity, Severity::Critical);
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let err = EventBuilder::new(EventType::DataAccessed)
            .target("t", TargetKind::Account)
            .action("read")
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "missing_actor_id");

        let err = EventBuilder::new(EventType::DataAccessed)
            .actor("u1", ActorKind::User)
            .action("read")
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "missing_target_id");

        let err = EventBuilder::new(EventType::DataAccessed)
            .actor("u1", ActorKind::User)
            .target("t", TargetKind::Account)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "missing_action");
    }

    #[test]
    fn retention_below_floor_is_rejected() {
        let err = EventBuilder::new(EventType::PaymentProcessed)
            .actor("u1", ActorKind::User)
            .target("tx-1", TargetKind::Transaction)
            .action("process payment")
            .retention_days(30)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "invalid_retention");
    }

    #[test]
    fn metadata_is_redacted_at_build_time() {
        let event = EventBuilder::new(EventType::ApiCall)
            .actor("svc", ActorKind::Api)
            .target("endpoint", TargetKind::System)
            .action("invoke endpoint")
            .metadata("api_key", serde_json::json!("sk-live-1234"))
            .build()
            .unwrap();
        assert_eq!(event.metadata["api_key"], "[REDACTED]");
    }

    #[test]
    fn empty_metadata_key_accumulates() {
        let err = EventBuilder::new(EventType::ApiCall)
            .actor("svc", ActorKind::Api)
            .target("endpoint", TargetKind::System)
            .action("invoke endpoint")
            .metadata("", serde_json::json!(1))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "empty_metadata_key");
    }

    #[test]
    fn factories_set_domain_baselines() {
        let consent = EventBuilder::consent_granted("subj-1", "+15551234567")
            .build()
            .unwrap();
        assert_eq!(consent.event_type, EventType::ConsentGranted);
        assert!(consent.compliance.flag(flags::TCPA_RELEVANT));
        assert!(consent.compliance.flag(flags::GDPR_RELEVANT));
        assert_eq!(consent.compliance.legal_basis, Some(LegalBasis::Consent));
        assert!(consent.compliance.data_classes.contains(&DataClass::PhoneNumber));

        let bid = EventBuilder::bid_placed("buyer-9", "bid-42", 125_00).build().unwrap();
        assert_eq!(bid.compliance.retention_days, 3650);
        assert_eq!(bid.metadata["amount_cents"], 12500);

        let auth = EventBuilder::auth_failure("u1", "bad password").build().unwrap();
        assert_eq!(auth.result, EventResult::Failure);
        assert_eq!(auth.error.as_ref().unwrap().code, "auth_failed");
    }
}
