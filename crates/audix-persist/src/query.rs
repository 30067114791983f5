//! Filter surface for forensic reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use audix_core::{DataClass, Event, EventType, SealedEvent, Severity};

/// Filter over stored events. Empty/None members match everything;
/// populated members are conjunctive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_types: Option<BTreeSet<EventType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severities: Option<BTreeSet<Severity>>,
    /// Any-of match against the event's data classes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_classes: Option<BTreeSet<DataClass>>,
    /// Required flag values, all of which must match.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_end: Option<u64>,
    /// Case-insensitive substring over action, actor id, target id
    /// and tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Page size; capped by the backend.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Resume after this sequence number (exclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<u64>,
}

fn default_limit() -> usize {
    100
}

impl EventFilter {
    pub fn new() -> Self {
        Self {
            limit: default_limit(),
            ..Default::default()
        }
    }

    pub fn with_event_type(mut self, event_type: EventType) -> Self {
        self.event_types.get_or_insert_with(BTreeSet::new).insert(event_type);
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_ids.get_or_insert_with(BTreeSet::new).insert(actor_id.into());
        self
    }

    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_ids.get_or_insert_with(BTreeSet::new).insert(target_id.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severities.get_or_insert_with(BTreeSet::new).insert(severity);
        self
    }

    pub fn with_data_class(mut self, class: DataClass) -> Self {
        self.data_classes.get_or_insert_with(BTreeSet::new).insert(class);
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    pub fn with_time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_sequence_range(mut self, start: u64, end: u64) -> Self {
        self.sequence_start = Some(start);
        self.sequence_end = Some(end);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn after(mut self, cursor: u64) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Whether an event satisfies every populated member.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(types) = &self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(actors) = &self.actor_ids {
            if !actors.contains(&event.actor.id) {
                return false;
            }
        }
        if let Some(targets) = &self.target_ids {
            if !targets.contains(&event.target.id) {
                return false;
            }
        }
        if let Some(severities) = &self.severities {
            if !severities.contains(&event.severity) {
                return false;
            }
        }
        if let Some(classes) = &self.data_classes {
            if classes.is_disjoint(&event.compliance.data_classes) {
                return false;
            }
        }
        for (name, want) in &self.flags {
            if event.compliance.flag(name) != *want {
                return false;
            }
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
        if let Some(start) = self.sequence_start {
            if event.sequence_num < start {
                return false;
            }
        }
        if let Some(end) = self.sequence_end {
            if event.sequence_num > end {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let hit = event.action.to_lowercase().contains(&needle)
                || event.actor.id.to_lowercase().contains(&needle)
                || event.target.id.to_lowercase().contains(&needle)
                || event.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// One page of filtered results, in ascending sequence order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<SealedEvent>,
    /// Pass back as [`EventFilter::cursor`] to fetch the next page;
    /// `None` when the scan is exhausted.
    pub next_cursor: Option<u64>,
}

impl EventPage {
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            next_cursor: None,
        }
    }
}
