//! Legal holds: administrative instructions that pin matching events
//! regardless of retention expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use audix_core::{DataClass, Event, EventType};

/// What a hold applies to. Empty members match everything; populated
/// members are conjunctive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoldScope {
    #[serde(default)]
    pub event_types: BTreeSet<EventType>,
    #[serde(default)]
    pub data_classes: BTreeSet<DataClass>,
    #[serde(default)]
    pub actor_ids: BTreeSet<String>,
    #[serde(default)]
    pub target_ids: BTreeSet<String>,
    /// Event-time window the hold covers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl HoldScope {
    pub fn matches(&self, event: &Event) -> bool {
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        if !self.data_classes.is_empty()
            && self.data_classes.is_disjoint(&event.compliance.data_classes)
        {
            return false;
        }
        if !self.actor_ids.is_empty() && !self.actor_ids.contains(&event.actor.id) {
            return false;
        }
        if !self.target_ids.is_empty() && !self.target_ids.contains(&event.target.id) {
            return false;
        }
        if let Some(from) = self.from {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if event.timestamp > to {
                return false;
            }
        }
        true
    }
}

/// An active or released legal hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalHold {
    pub id: Uuid,
    pub name: String,
    /// Case or matter reference the hold was placed for.
    pub reason: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
    pub scope: HoldScope,
}

impl LegalHold {
    pub fn new(name: impl Into<String>, reason: impl Into<String>, scope: HoldScope) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            reason: reason.into(),
            created_at: Utc::now(),
            released_at: None,
            scope,
        }
    }

    pub fn release(&mut self, at: DateTime<Utc>) {
        self.released_at = Some(at);
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.created_at <= now && self.released_at.map_or(true, |released| released > now)
    }

    /// Active at `now` and scoped to this event.
    pub fn applies_to(&self, event: &Event, now: DateTime<Utc>) -> bool {
        self.is_active(now) && self.scope.matches(event)
    }
}
