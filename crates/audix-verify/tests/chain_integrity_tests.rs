//! End-to-end integrity scenarios: break detection over corrupted
//! chains and repair of the downstream hashes.

use std::sync::Arc;

use audix_core::{
    event_digest, ActorKind, ChainBuilder, Event, EventBuilder, EventType, Hash, SealedEvent,
    TargetKind,
};
use audix_persist::{EventStore, MemoryStore};
use audix_verify::{
    BreakKind, ChainRepairService, ChainVerifier, HealthStatus, IntegrityOrchestrator,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn chain_of(n: usize) -> Vec<SealedEvent> {
    let mut chain = ChainBuilder::new();
    (0..n)
        .map(|i| {
            let event = EventBuilder::new(EventType::CallInitiated)
                .actor("u1", ActorKind::User)
                .target(format!("c{i}"), TargetKind::Call)
                .action("init")
                .timestamp(t0() + Duration::milliseconds(i as i64))
                .build()
                .unwrap();
            chain.seal(event).unwrap()
        })
        .collect()
}

fn tampered(events: &[SealedEvent], index: usize, mutate: impl FnOnce(&mut Event)) -> Vec<SealedEvent> {
    let mut out = events.to_vec();
    let mut record = out[index].record().clone();
    mutate(&mut record);
    out[index] = SealedEvent::from_record_unchecked(record);
    out
}

#[test]
fn genesis_event_verifies() {
    let events = chain_of(1);
    assert_eq!(events[0].sequence_num, 1);
    assert_eq!(events[0].previous_hash_hex(), "");
    assert_eq!(events[0].event_hash.unwrap(), event_digest(events[0].record()));

    let report = ChainVerifier::new().verify(&events);
    assert!(report.is_valid);
    assert_eq!(report.events_verified, 1);
    assert!(report.breaks.is_empty());
}

#[test]
fn three_event_chain_links() {
    let events = chain_of(3);
    assert_eq!(
        events.iter().map(|e| e.sequence_num).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(events[1].previous_hash, events[0].event_hash);
    assert_eq!(events[2].previous_hash, events[1].event_hash);
    assert!(ChainVerifier::new().verify(&events).is_valid);
}

#[test]
fn hash_mismatch_detected_at_the_corrupted_event_only() {
    let events = tampered(&chain_of(3), 1, |r| r.event_hash = Some(Hash::zero()));

    let report = ChainVerifier::new().verify(&events);
    assert!(!report.is_valid);
    assert_eq!(report.breaks.len(), 1);
    assert_eq!(report.breaks[0].kind, BreakKind::HashMismatch);
    assert_eq!(report.breaks[0].sequence, 2);
    assert_eq!(report.breaks[0].actual_hash.as_deref(), Some(Hash::zero().to_hex().as_str()));
}

#[test]
fn sequence_gap_detected() {
    let events = tampered(&chain_of(3), 1, |r| r.sequence_num = 5);

    let report = ChainVerifier::new().verify(&events);
    assert!(!report.is_valid);
    assert_eq!(report.breaks.len(), 1);
    assert_eq!(report.breaks[0].kind, BreakKind::SequenceGap);
    assert_eq!(report.breaks[0].sequence, 5);
    assert_eq!(report.breaks[0].description, "Expected sequence 2, got 5");
}

#[test]
fn sequence_gap_from_missing_event() {
    let events = chain_of(4);
    let with_gap = vec![events[0].clone(), events[1].clone(), events[3].clone()];

    let report = ChainVerifier::new().verify(&with_gap);
    assert!(!report.is_valid);
    assert_eq!(report.breaks[0].kind, BreakKind::SequenceGap);
    assert_eq!(report.breaks[0].description, "Expected sequence 3, got 4");
}

#[test]
fn timestamp_regression_detected() {
    let events = tampered(&chain_of(3), 1, |r| r.timestamp = t0() - Duration::seconds(1));

    let report = ChainVerifier::new().verify(&events);
    assert!(!report.is_valid);
    assert_eq!(report.breaks.len(), 1);
    assert_eq!(report.breaks[0].kind, BreakKind::TimestampRegression);
    assert_eq!(report.breaks[0].sequence, 2);
}

#[test]
fn corrupted_event_detected_when_required_field_zeroed() {
    for zeroing in [
        (|r: &mut Event| r.actor.id.clear()) as fn(&mut Event),
        |r| r.action.clear(),
        |r| r.target.id.clear(),
    ] {
        let events = tampered(&chain_of(3), 1, zeroing);
        let report = ChainVerifier::new().verify(&events);
        assert!(!report.is_valid);
        assert_eq!(report.breaks[0].kind, BreakKind::CorruptedEvent);
        assert_eq!(report.breaks[0].sequence, 2);
    }
}

#[test]
fn broken_link_detected() {
    let events = tampered(&chain_of(3), 2, |r| {
        r.previous_hash = Some(Hash::digest(b"somewhere else"));
        // Rehash so the stored digest is self-consistent; only the
        // link is wrong.
        r.event_hash = Some(event_digest(r));
    });

    let report = ChainVerifier::new().verify(&events);
    assert!(!report.is_valid);
    assert_eq!(report.breaks.len(), 1);
    assert_eq!(report.breaks[0].kind, BreakKind::HashMismatch);
    assert_eq!(report.breaks[0].sequence, 3);
}

#[test]
fn spliced_history_is_detected_only_at_the_splice_point() {
    // An attacker rewrites the chain from event 2 on: forged link,
    // every downstream digest recomputed consistently. The one break
    // is the splice itself.
    let mut events = chain_of(4);
    let mut rolling = Some(Hash::digest(b"forged ancestry"));
    for event in events.iter_mut().skip(1) {
        let mut record = event.record().clone();
        record.previous_hash = rolling;
        record.event_hash = Some(event_digest(&record));
        rolling = record.event_hash;
        *event = SealedEvent::from_record_unchecked(record);
    }

    let report = ChainVerifier::new().verify(&events);
    assert!(!report.is_valid);
    assert_eq!(report.breaks.len(), 1);
    assert_eq!(report.breaks[0].kind, BreakKind::HashMismatch);
    assert_eq!(report.breaks[0].sequence, 2);
}

#[tokio::test]
async fn repair_restores_validity_after_hash_corruption() {
    let store = Arc::new(MemoryStore::new());
    let events = chain_of(3);
    store.append(&events).await.unwrap();

    // Corrupt event 2's stored hash in place.
    let mut record = events[1].record().clone();
    record.event_hash = Some(Hash::zero());
    store
        .replace(SealedEvent::from_record_unchecked(record))
        .await
        .unwrap();

    let service = ChainRepairService::new(store.clone());
    let report = service.repair_range(1, 3).await.unwrap();

    assert!(report.was_needed());
    assert!(report.events_repaired >= 1);
    assert_eq!(report.unrepairable, 0);
    assert!(report.post_verification.unwrap().is_valid);

    let repaired = store.get_sequence_range(1, 3).await.unwrap();
    assert!(ChainVerifier::new().verify(&repaired).is_valid);
    // Ids are preserved so trail entries correlate.
    assert_eq!(repaired[1].id, events[1].id);
}

#[tokio::test]
async fn repair_trail_records_old_and_new_hashes() {
    let store = Arc::new(MemoryStore::new());
    let events = chain_of(3);
    store.append(&events).await.unwrap();

    let mut record = events[1].record().clone();
    record.event_hash = Some(Hash::zero());
    store
        .replace(SealedEvent::from_record_unchecked(record))
        .await
        .unwrap();

    let service = ChainRepairService::new(store.clone());
    let report = service.repair_range(1, 3).await.unwrap();

    let entry = &report.entries[0];
    assert_eq!(entry.sequence, 2);
    assert_eq!(entry.old_hash, Some(Hash::zero()));
    assert_eq!(entry.new_hash, events[1].event_hash);
}

#[tokio::test]
async fn repair_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let events = chain_of(4);
    store.append(&events).await.unwrap();

    let mut record = events[2].record().clone();
    record.event_hash = Some(Hash::zero());
    store
        .replace(SealedEvent::from_record_unchecked(record))
        .await
        .unwrap();

    let service = ChainRepairService::new(store.clone());
    let first = service.repair_range(1, 4).await.unwrap();
    assert!(first.was_needed());

    let second = service.repair_range(1, 4).await.unwrap();
    assert!(!second.was_needed());
    assert!(second.entries.is_empty());
    assert_eq!(second.events_repaired, 0);
}

#[tokio::test]
async fn repair_of_mid_chain_range_uses_the_predecessor() {
    let store = Arc::new(MemoryStore::new());
    let events = chain_of(5);
    store.append(&events).await.unwrap();

    let mut record = events[3].record().clone();
    record.event_hash = Some(Hash::zero());
    store
        .replace(SealedEvent::from_record_unchecked(record))
        .await
        .unwrap();

    let service = ChainRepairService::new(store.clone());
    let report = service.repair_range(3, 5).await.unwrap();
    assert!(report.post_verification.unwrap().is_valid);

    // The whole chain, not just the range, is intact again.
    let all = store.get_sequence_range(1, 5).await.unwrap();
    assert!(ChainVerifier::new().verify(&all).is_valid);
}

#[tokio::test]
async fn unrepairable_records_are_skipped_and_counted() {
    let store = Arc::new(MemoryStore::new());
    let events = chain_of(4);
    store.append(&events).await.unwrap();

    // Event 2 loses a required field: structurally unrepairable.
    let mut record = events[1].record().clone();
    record.action.clear();
    store
        .replace(SealedEvent::from_record_unchecked(record))
        .await
        .unwrap();

    let service = ChainRepairService::new(store.clone());
    let report = service.repair_range(1, 4).await.unwrap();

    assert_eq!(report.unrepairable, 1);
    assert!(report
        .entries
        .iter()
        .any(|e| e.sequence == 2 && e.new_hash.is_none()));
    // Events behind the unrepairable record keep their original
    // linkage, which is still self-consistent.
    let downstream = store.get_sequence_range(3, 4).await.unwrap();
    assert_eq!(downstream[0].previous_hash, events[1].event_hash);
}

#[tokio::test]
async fn repair_run_is_recorded_in_the_chain() {
    let store = Arc::new(MemoryStore::new());
    let events = chain_of(3);
    store.append(&events).await.unwrap();

    let mut record = events[1].record().clone();
    record.event_hash = Some(Hash::zero());
    store
        .replace(SealedEvent::from_record_unchecked(record))
        .await
        .unwrap();

    let service = ChainRepairService::new(store.clone());
    let report = service.repair_range(1, 3).await.unwrap();
    let sealed = service.record_repair_event(&report).await.unwrap();

    assert_eq!(sealed.event_type, EventType::ChainRepaired);
    assert_eq!(sealed.sequence_num, 4);
    assert_eq!(sealed.metadata["events_repaired"], serde_json::json!(report.events_repaired));

    let all = store.get_sequence_range(1, 4).await.unwrap();
    assert!(ChainVerifier::new().verify(&all).is_valid);
}

#[tokio::test]
async fn invalid_range_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let service = ChainRepairService::new(store);
    assert!(service.repair_range(0, 3).await.is_err());
    assert!(service.repair_range(5, 3).await.is_err());
}

#[tokio::test]
async fn orchestrator_classifies_breaks_as_critical() {
    let store = Arc::new(MemoryStore::new());
    let events = chain_of(3);
    store.append(&events).await.unwrap();

    let mut record = events[1].record().clone();
    record.event_hash = Some(Hash::zero());
    store
        .replace(SealedEvent::from_record_unchecked(record))
        .await
        .unwrap();

    let orchestrator = IntegrityOrchestrator::new(store);
    let report = orchestrator.check_range(1, 3).await.unwrap();
    assert_eq!(report.health, HealthStatus::Critical);
    assert!(!report.verification.is_valid);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("chain repair")));
}

#[tokio::test]
async fn orchestrator_flags_consent_deficits_as_degraded() {
    let store = Arc::new(MemoryStore::new());
    let mut chain = ChainBuilder::new();
    // Call initiation without the consent_verified flag.
    let bare_call = EventBuilder::new(EventType::CallInitiated)
        .actor("u1", ActorKind::User)
        .target("c1", TargetKind::Call)
        .action("initiate call")
        .build()
        .unwrap();
    let sealed = chain.seal(bare_call).unwrap();
    store.append(std::slice::from_ref(&sealed)).await.unwrap();

    let orchestrator = IntegrityOrchestrator::new(store);
    let report = orchestrator.check_range(1, 1).await.unwrap();
    assert_eq!(report.health, HealthStatus::Degraded);
    assert_eq!(report.deficits.len(), 1);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("consent evidence")));
}

#[tokio::test]
async fn orchestrator_reports_missing_sequences() {
    let store = Arc::new(MemoryStore::new());
    let events = chain_of(5);
    // Simulate downstream data loss: event 3 never made it.
    store.append(&events[..2]).await.unwrap();
    store.append(&events[3..]).await.unwrap();

    let orchestrator = IntegrityOrchestrator::new(store);
    let report = orchestrator.check_range(1, 5).await.unwrap();
    assert_eq!(report.missing_sequences, vec![3]);
    assert_eq!(report.health, HealthStatus::Critical);
}

#[tokio::test]
async fn orchestrator_clamps_to_latest_sequence() {
    let store = Arc::new(MemoryStore::new());
    store.append(&chain_of(2)).await.unwrap();

    let orchestrator = IntegrityOrchestrator::new(store);
    let report = orchestrator.check_range(1, 100).await.unwrap();
    assert_eq!(report.end, 2);
    assert!(report.missing_sequences.is_empty());
    assert_eq!(report.health, HealthStatus::Healthy);
}
