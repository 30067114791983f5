//! Policy-driven retention lifecycle decisions.
//!
//! An event's expiry is its timestamp plus the strictest applicable
//! retention floor. Events under an active matching legal hold are
//! never eligible for archival or deletion. Policies are versioned,
//! immutable records; an event is evaluated against the policy in
//! force at evaluation time, never retroactively re-aged.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use audix_core::{retention_floor_days, Event, EventType};

use crate::legal_hold::LegalHold;

/// A versioned, immutable retention policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub version: u32,
    pub effective_at: DateTime<Utc>,
    /// Days an expired event stays archive-eligible before it becomes
    /// delete-eligible.
    pub archive_grace_days: u32,
    /// Per-type floors stricter than the built-in defaults.
    #[serde(default)]
    pub type_overrides: BTreeMap<EventType, u32>,
}

impl RetentionPolicy {
    /// The policy currently in force.
    pub fn current() -> Self {
        Self {
            version: 1,
            effective_at: DateTime::<Utc>::UNIX_EPOCH,
            archive_grace_days: 365,
            type_overrides: BTreeMap::new(),
        }
    }

    /// A successor policy with a bumped version.
    pub fn amend(&self, effective_at: DateTime<Utc>) -> Self {
        Self {
            version: self.version + 1,
            effective_at,
            archive_grace_days: self.archive_grace_days,
            type_overrides: self.type_overrides.clone(),
        }
    }

    /// The floor in force for an event: the strictest of the built-in
    /// type/data-class floors, any policy override, and the value the
    /// event itself was sealed with.
    pub fn floor_days(&self, event: &Event) -> u32 {
        let base = retention_floor_days(event.event_type, &event.compliance.data_classes);
        let overridden = self
            .type_overrides
            .get(&event.event_type)
            .copied()
            .unwrap_or(0);
        base.max(overridden).max(event.compliance.retention_days)
    }
}

/// Lifecycle decision for one event at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RetentionDecision {
    /// Retention window still open, or an active legal hold applies.
    Retain {
        until: DateTime<Utc>,
        held: bool,
    },
    /// Expired; eligible for archival.
    Archive { eligible_since: DateTime<Utc> },
    /// Expired past the archive grace window; eligible for deletion.
    Delete { eligible_since: DateTime<Utc> },
}

impl RetentionDecision {
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Archive { .. } | Self::Delete { .. })
    }
}

/// Computes lifecycle decisions under one policy version.
#[derive(Debug, Clone)]
pub struct RetentionEvaluator {
    policy: RetentionPolicy,
}

impl RetentionEvaluator {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// When the event's retention window closes.
    pub fn expiry(&self, event: &Event) -> DateTime<Utc> {
        event.timestamp + Duration::days(i64::from(self.policy.floor_days(event)))
    }

    /// Decide the event's lifecycle state at `now`, honoring the
    /// given legal holds.
    pub fn evaluate(&self, event: &Event, holds: &[LegalHold], now: DateTime<Utc>) -> RetentionDecision {
        let expiry = self.expiry(event);

        if let Some(hold) = holds.iter().find(|h| h.applies_to(event, now)) {
            debug!(
                event_id = %event.id,
                hold = %hold.name,
                "event pinned by legal hold"
            );
            return RetentionDecision::Retain {
                until: expiry.max(now),
                held: true,
            };
        }

        if now < expiry {
            return RetentionDecision::Retain {
                until: expiry,
                held: false,
            };
        }

        let delete_at = expiry + Duration::days(i64::from(self.policy.archive_grace_days));
        if now < delete_at {
            RetentionDecision::Archive { eligible_since: expiry }
        } else {
            RetentionDecision::Delete { eligible_since: delete_at }
        }
    }
}

impl Default for RetentionEvaluator {
    fn default() -> Self {
        Self::new(RetentionPolicy::current())
    }
}
