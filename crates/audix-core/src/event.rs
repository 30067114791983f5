//! The immutable audit event record and its sealed/unsealed states.
//!
//! An [`Event`] captures one audited action at one instant. Records
//! move through two states enforced by distinct types:
//!
//! - [`UnsealedEvent`] — builder output; chain fields empty,
//!   `sequence_num` zero, still mutable through the builder.
//! - [`SealedEvent`] — sealed by the chain builder; read-only access
//!   to the record, hash-relevant fields immutable.
//!
//! Sealing consumes the unsealed value, so a second seal of the same
//! value is unrepresentable; a runtime guard in the chain builder
//! additionally rejects records that already carry a hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::event_type::{ActorKind, DataClass, EventResult, EventType, LegalBasis, Severity, TargetKind};
use crate::hash::Hash;
use crate::signature::Signature;

/// Well-known compliance flag names.
pub mod flags {
    pub const GDPR_RELEVANT: &str = "gdpr_relevant";
    pub const TCPA_RELEVANT: &str = "tcpa_relevant";
    pub const CONTAINS_PII: &str = "contains_pii";
    pub const REQUIRES_SIGNATURE: &str = "requires_signature";
    pub const FINANCIAL_DATA: &str = "financial_data";
    pub const ENCRYPTED: &str = "encrypted";
    pub const CONSENT_VERIFIED: &str = "consent_verified";
}

/// Who performed the audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub kind: ActorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, kind: ActorKind) -> Self {
        Self {
            id: id.into(),
            kind,
            ip: None,
            user_agent: None,
        }
    }
}

/// What the audited action was performed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub kind: TargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Target {
    pub fn new(id: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            id: id.into(),
            kind,
            owner: None,
        }
    }
}

/// Request/session correlation identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Identity of the emitting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub environment: String,
    pub service: String,
    pub version: String,
}

impl Default for ServiceMetadata {
    fn default() -> Self {
        Self {
            environment: "production".to_string(),
            service: "audit".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error detail attached to failed actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Compliance posture of a single event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceMetadata {
    /// Named boolean flags; see [`flags`] for the well-known names.
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub data_classes: BTreeSet<DataClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_basis: Option<LegalBasis>,
    pub retention_days: u32,
}

impl ComplianceMetadata {
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Whether GDPR obligations force a legal basis on this event.
    pub fn requires_legal_basis(&self) -> bool {
        self.flag(flags::GDPR_RELEVANT)
            || self.flag(flags::CONTAINS_PII)
            || self.data_classes.iter().any(DataClass::gdpr_relevant)
    }
}

/// Retention floor for a type/data-class combination: the maximum of
/// the per-type default and every applicable per-class minimum.
pub fn retention_floor_days(event_type: EventType, data_classes: &BTreeSet<DataClass>) -> u32 {
    data_classes
        .iter()
        .map(DataClass::retention_floor_days)
        .fold(event_type.retention_floor_days(), u32::max)
}

/// Metadata keys whose values are redacted before sealing.
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
    "credential",
    "private_key",
    "privatekey",
];

/// Replace values of sensitive keys with `"[REDACTED]"`, recursively
/// through nested objects and arrays.
pub fn redact_metadata(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(mut map) => {
            for key in map.keys().cloned().collect::<Vec<_>>() {
                let lower = key.to_lowercase();
                if SENSITIVE_KEYS.iter().any(|k| lower.contains(k)) {
                    map.insert(key, serde_json::Value::String("[REDACTED]".to_string()));
                } else if let Some(v) = map.remove(&key) {
                    map.insert(key, redact_metadata(v));
                }
            }
            serde_json::Value::Object(map)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(redact_metadata).collect())
        }
        other => other,
    }
}

/// One audited action at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    /// Strictly monotonic position in the chain; zero until sealed.
    pub sequence_num: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: Severity,
    pub actor: Actor,
    pub target: Target,
    pub action: String,
    pub result: EventResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub correlation: Correlation,
    pub service_metadata: ServiceMetadata,
    pub compliance: ComplianceMetadata,
    /// Free-form context; never part of the hash.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Hash of the sealed previous event; empty string on the wire
    /// for the genesis event.
    #[serde(with = "crate::hash::opt_hex")]
    pub previous_hash: Option<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_hash: Option<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl Event {
    /// Whether the chain fields have been assigned.
    pub fn is_sealed(&self) -> bool {
        self.event_hash.is_some()
    }

    /// Wire form of `previous_hash`: empty string for genesis.
    pub fn previous_hash_hex(&self) -> String {
        self.previous_hash.map(|h| h.to_hex()).unwrap_or_default()
    }

    /// Structural validation: required fields, I6 (retention floor),
    /// I7 (legal basis on GDPR-relevant events) and I8 (error code on
    /// failures). Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.actor.id.trim().is_empty() {
            return Err(ValidationError::MissingActorId);
        }
        if self.target.id.trim().is_empty() {
            return Err(ValidationError::MissingTargetId);
        }
        if self.action.trim().is_empty() {
            return Err(ValidationError::MissingAction);
        }
        if self.result == EventResult::Failure
            && self.error.as_ref().map_or(true, |e| e.code.trim().is_empty())
        {
            return Err(ValidationError::MissingErrorCode);
        }
        let floor = retention_floor_days(self.event_type, &self.compliance.data_classes);
        if self.compliance.retention_days < floor {
            return Err(ValidationError::InvalidRetention {
                got: self.compliance.retention_days,
                floor,
            });
        }
        if self.compliance.requires_legal_basis() && self.compliance.legal_basis.is_none() {
            return Err(ValidationError::InvalidLegalBasis);
        }
        if self.metadata.keys().any(|k| k.trim().is_empty()) {
            return Err(ValidationError::EmptyMetadataKey);
        }
        Ok(())
    }
}

/// A pre-seal event: chain fields empty, still owned by its producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnsealedEvent {
    record: Event,
}

impl UnsealedEvent {
    pub(crate) fn new(record: Event) -> Self {
        debug_assert!(!record.is_sealed());
        Self { record }
    }

    pub fn record(&self) -> &Event {
        &self.record
    }

    pub fn into_record(self) -> Event {
        self.record
    }
}

impl Deref for UnsealedEvent {
    type Target = Event;

    fn deref(&self) -> &Event {
        &self.record
    }
}

/// A sealed event: sequence assigned, hash chain fields set, hash
/// relevant fields immutable. Only the detached signature may be
/// attached after sealing; it is excluded from the hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedEvent {
    record: Event,
}

impl SealedEvent {
    /// Wrap a record that is known to carry chain fields, e.g. one
    /// read back from durable storage. The hash is NOT re-verified
    /// here; that is the verifier's job.
    pub fn from_record(record: Event) -> Result<Self, ValidationError> {
        if !record.is_sealed() || record.sequence_num == 0 {
            return Err(ValidationError::UnsealedRecord);
        }
        Ok(Self { record })
    }

    /// Wrap a record without any checks. Intended for storage drivers
    /// and the repair service, which must be able to represent
    /// corrupted records.
    pub fn from_record_unchecked(record: Event) -> Self {
        Self { record }
    }

    pub(crate) fn sealed(record: Event) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &Event {
        &self.record
    }

    pub fn into_record(self) -> Event {
        self.record
    }

    /// Clone back into a mutable pre-seal event: chain fields are
    /// cleared, everything else (including the id and timestamp) is
    /// preserved, so re-sealing against the identical tail state
    /// reproduces the same digest.
    pub fn to_unsealed(&self) -> UnsealedEvent {
        let mut record = self.record.clone();
        record.sequence_num = 0;
        record.previous_hash = None;
        record.event_hash = None;
        record.signature = None;
        UnsealedEvent { record }
    }

    /// Attach a detached Ed25519 signature over the event hash.
    pub fn sign(&mut self, signer_id: impl Into<String>, key: &ed25519_dalek::SigningKey) {
        if let Some(hash) = self.record.event_hash {
            self.record.signature = Some(Signature::create(signer_id, hash.to_hex().as_bytes(), key));
        }
    }

    /// Verify the attached signature against the event hash.
    /// Returns `Ok(false)` when no signature is attached.
    pub fn verify_signature(
        &self,
        key: &ed25519_dalek::VerifyingKey,
    ) -> Result<bool, crate::signature::SignatureError> {
        match (&self.record.signature, self.record.event_hash) {
            (Some(sig), Some(hash)) => sig.verify(hash.to_hex().as_bytes(), key),
            _ => Ok(false),
        }
    }
}

impl Deref for SealedEvent {
    type Target = Event;

    fn deref(&self) -> &Event {
        &self.record
    }
}
