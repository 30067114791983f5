//! Error types for event construction and chain sealing.
//!
//! Every variant carries a stable short code (the `code()` accessor)
//! that callers and downstream reports can match on without parsing
//! display strings.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Rejected inputs during event construction or re-validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("actor id must not be empty")]
    MissingActorId,

    #[error("target id must not be empty")]
    MissingTargetId,

    #[error("action must not be empty")]
    MissingAction,

    #[error("unknown event type code: {0}")]
    InvalidEventType(String),

    #[error("unknown severity code: {0}")]
    InvalidSeverity(String),

    #[error("unknown result code: {0}")]
    InvalidResult(String),

    #[error("retention of {got} days is below the {floor}-day floor")]
    InvalidRetention { got: u32, floor: u32 },

    #[error("metadata keys must not be empty")]
    EmptyMetadataKey,

    #[error("GDPR-relevant events must carry a legal basis")]
    InvalidLegalBasis,

    #[error("failure results must carry a non-empty error code")]
    MissingErrorCode,

    #[error("record does not carry chain fields")]
    UnsealedRecord,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingActorId => "missing_actor_id",
            Self::MissingTargetId => "missing_target_id",
            Self::MissingAction => "missing_action",
            Self::InvalidEventType(_) => "invalid_event_type",
            Self::InvalidSeverity(_) => "invalid_severity",
            Self::InvalidResult(_) => "invalid_result",
            Self::InvalidRetention { .. } => "invalid_retention",
            Self::EmptyMetadataKey => "empty_metadata_key",
            Self::InvalidLegalBasis => "invalid_legal_basis",
            Self::MissingErrorCode => "missing_error_code",
            Self::UnsealedRecord => "unsealed_record",
        }
    }
}

/// Failures while sealing an event into the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Attempt to re-seal an already-sealed record.
    #[error("event is already sealed and cannot be sealed again")]
    ImmutabilityViolation,

    /// The candidate event is older than the chain tail.
    #[error("event timestamp {event} precedes chain tail {tail}")]
    TimestampRegression {
        event: DateTime<Utc>,
        tail: DateTime<Utc>,
    },

    /// Invariant re-validation failed at seal time.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ChainError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ImmutabilityViolation => "immutability_violation",
            Self::TimestampRegression { .. } => "timestamp_regression",
            Self::Validation(v) => v.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ValidationError::MissingActorId.code(), "missing_actor_id");
        assert_eq!(
            ValidationError::InvalidRetention { got: 1, floor: 2555 }.code(),
            "invalid_retention"
        );
        assert_eq!(ChainError::ImmutabilityViolation.code(), "immutability_violation");
        assert_eq!(
            ChainError::Validation(ValidationError::MissingAction).code(),
            "missing_action"
        );
    }
}
