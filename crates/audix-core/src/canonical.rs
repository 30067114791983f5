//! Deterministic canonical form and event digest.
//!
//! The canonical form is a hand-derived byte string covering exactly
//! the hash-relevant fields, in a fixed key order, with no
//! whitespace:
//!
//! ```text
//! id=<uuid>;seq=<u64>;ts=<i64 nanos>;type=<code>;actor=<actor.id>;
//! target=<target.id>;action=<action>;result=<code>;prev=<hex|empty>
//! ```
//!
//! (line broken here for readability; the real form is one line).
//!
//! Metadata, tags, compliance flags, service metadata, severity, the
//! signature and the event hash itself are all excluded. The digest
//! is SHA-256 over these bytes, rendered as lowercase hex. Equal
//! canonical forms imply equal digests across processes and runs;
//! the golden vectors below pin the byte layout.

use crate::event::Event;
use crate::hash::Hash;

/// Derive the canonical byte form of a record. Total over valid
/// events; timestamps past the nanosecond-representable range
/// (year 2262) saturate.
pub fn canonical_bytes(record: &Event) -> Vec<u8> {
    let ts = record.timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX);
    format!(
        "id={};seq={};ts={};type={};actor={};target={};action={};result={};prev={}",
        record.id,
        record.sequence_num,
        ts,
        record.event_type.as_str(),
        record.actor.id,
        record.target.id,
        record.action,
        record.result.as_str(),
        record.previous_hash_hex(),
    )
    .into_bytes()
}

/// SHA-256 digest of the canonical form.
pub fn event_digest(record: &Event) -> Hash {
    Hash::digest(&canonical_bytes(record))
}

/// Fingerprint of a verified slice: SHA-256 over the
/// `(sequence, id, event_hash)` tuples sorted by sequence.
pub fn slice_digest<'a, I>(events: I) -> Hash
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut tuples: Vec<(u64, String)> = events
        .into_iter()
        .map(|e| {
            (
                e.sequence_num,
                format!(
                    "seq={};id={};hash={};",
                    e.sequence_num,
                    e.id,
                    e.event_hash.map(|h| h.to_hex()).unwrap_or_default()
                ),
            )
        })
        .collect();
    tuples.sort_by_key(|(seq, _)| *seq);

    let mut bytes = Vec::with_capacity(tuples.len() * 128);
    for (_, line) in tuples {
        bytes.extend_from_slice(line.as_bytes());
    }
    Hash::digest(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Actor, ComplianceMetadata, Correlation, ServiceMetadata, Target};
    use crate::event_type::{ActorKind, EventResult, EventType, Severity, TargetKind};
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    fn fixture(id: &str, seq: u64, ts_nanos_offset: i64, event_type: EventType, action: &str, prev: Option<Hash>) -> Event {
        Event {
            id: Uuid::parse_str(id).unwrap(),
            sequence_num: seq,
            timestamp: Utc.timestamp_nanos(1_704_067_200_000_000_000 + ts_nanos_offset),
            event_type,
            severity: Severity::Info,
            actor: Actor::new("u1", ActorKind::User),
            target: Target::new("c1", TargetKind::Call),
            action: action.to_string(),
            result: EventResult::Success,
            error: None,
            correlation: Correlation::default(),
            service_metadata: ServiceMetadata::default(),
            compliance: ComplianceMetadata {
                retention_days: 2555,
                ..Default::default()
            },
            metadata: BTreeMap::new(),
            tags: BTreeSet::new(),
            previous_hash: prev,
            event_hash: None,
            signature: None,
        }
    }

    #[test]
    fn golden_vector_genesis() {
        let record = fixture(
            "00000000-0000-4000-8000-000000000001",
            1,
            0,
            EventType::CallInitiated,
            "init",
            None,
        );
        assert_eq!(
            String::from_utf8(canonical_bytes(&record)).unwrap(),
            "id=00000000-0000-4000-8000-000000000001;seq=1;ts=1704067200000000000;\
             type=call_initiated;actor=u1;target=c1;action=init;result=success;prev=",
        );
        assert_eq!(
            event_digest(&record).to_hex(),
            "ff6544d2b25a890af5646359687142a69738f9bdce009cba2293577edd711ba7"
        );
    }

    #[test]
    fn golden_vector_chained() {
        let prev =
            Hash::from_hex("ff6544d2b25a890af5646359687142a69738f9bdce009cba2293577edd711ba7")
                .unwrap();
        let record = fixture(
            "00000000-0000-4000-8000-000000000002",
            2,
            1_000_000,
            EventType::CallCompleted,
            "complete",
            Some(prev),
        );
        assert_eq!(
            event_digest(&record).to_hex(),
            "7d7691728f756933d3e3b7b657665334f67d862e8597368836e72b6de2a12687"
        );
    }

    #[test]
    fn digest_ignores_non_canonical_fields() {
        let mut a = fixture(
            "00000000-0000-4000-8000-000000000003",
            3,
            0,
            EventType::DataAccessed,
            "read",
            None,
        );
        let mut b = a.clone();
        a.metadata.insert("k".to_string(), serde_json::json!("v"));
        a.tags.insert("hot".to_string());
        a.severity = Severity::Critical;
        b.service_metadata.service = "other".to_string();
        assert_eq!(event_digest(&a), event_digest(&b));
    }

    #[test]
    fn digest_covers_every_canonical_field() {
        let base = fixture(
            "00000000-0000-4000-8000-000000000004",
            4,
            0,
            EventType::DataAccessed,
            "read",
            None,
        );
        let d0 = event_digest(&base);

        let mut changed = base.clone();
        changed.sequence_num = 5;
        assert_ne!(event_digest(&changed), d0);

        let mut changed = base.clone();
        changed.actor.id = "u2".to_string();
        assert_ne!(event_digest(&changed), d0);

        let mut changed = base.clone();
        changed.result = EventResult::Partial;
        assert_ne!(event_digest(&changed), d0);

        let mut changed = base.clone();
        changed.previous_hash = Some(Hash::digest(b"x"));
        assert_ne!(event_digest(&changed), d0);
    }

    #[test]
    fn slice_digest_is_order_insensitive() {
        let a = fixture(
            "00000000-0000-4000-8000-000000000005",
            1,
            0,
            EventType::CallInitiated,
            "a",
            None,
        );
        let b = fixture(
            "00000000-0000-4000-8000-000000000006",
            2,
            1,
            EventType::CallRouted,
            "b",
            None,
        );
        assert_eq!(slice_digest([&a, &b]), slice_digest([&b, &a]));
        assert_ne!(slice_digest([&a, &b]), slice_digest([&a, &a]));
    }
}
