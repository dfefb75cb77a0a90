// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::error::Error;
use crate::storage::MemoryStore;
use crate::test_helpers::{event, FixedClock};
use evsync_core::EventPatch;

fn log_with(store: Arc<MemoryStore>) -> (OperationLog, FixedClock) {
    let clock = FixedClock::at(1_000);
    let log = OperationLog::load(store, Arc::new(clock.clone())).unwrap();
    (log, clock)
}

fn fresh() -> (OperationLog, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let (log, _) = log_with(Arc::clone(&store));
    (log, store)
}

fn add(user: &str, event: &str) -> OpPayload {
    OpPayload::AddInterest {
        user_id: user.into(),
        event_id: event.into(),
    }
}

fn remove(user: &str, event: &str) -> OpPayload {
    OpPayload::RemoveInterest {
        user_id: user.into(),
        event_id: event.into(),
    }
}

fn update(id: &str) -> OpPayload {
    OpPayload::UpdateEvent {
        event_id: id.into(),
        patch: EventPatch {
            title: Some("New".into()),
            ..Default::default()
        },
    }
}

#[test]
fn enqueue_assigns_increasing_timestamps() {
    let (mut log, _) = fresh();
    let a = log.enqueue(add("u1", "1")).unwrap();
    let b = log.enqueue(add("u1", "2")).unwrap();
    let ta = log.get(&a).unwrap().timestamp;
    let tb = log.get(&b).unwrap().timestamp;
    assert!(tb > ta);
    assert_eq!(log.unsynced_len(), 2);
}

#[test]
fn enqueue_rejects_invalid_payload() {
    let (mut log, store) = fresh();
    let err = log
        .enqueue(OpPayload::UpdateEvent {
            event_id: "1".into(),
            patch: EventPatch::default(),
        })
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(log.unsynced_len(), 0);
    assert_eq!(store.get(PENDING_OPS_KEY).unwrap(), None);
}

#[test]
fn enqueue_rolls_back_when_persist_fails() {
    let (mut log, store) = fresh();
    store.fail_writes(true);
    let err = log.enqueue(add("u1", "1")).unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(log.unsynced_len(), 0);
}

#[test]
fn log_survives_reload() {
    let store = Arc::new(MemoryStore::new());
    let (mut log, _) = log_with(Arc::clone(&store));
    let id = log.enqueue(update("1")).unwrap();
    let stamp = log.get(&id).unwrap().timestamp;

    let (mut reloaded, _) = log_with(Arc::clone(&store));
    assert_eq!(reloaded.list_unsynced().len(), 1);
    assert_eq!(reloaded.list_unsynced()[0].id, id);
    // The clock resumes after the newest persisted stamp.
    let next = reloaded.enqueue(update("2")).unwrap();
    assert!(reloaded.get(&next).unwrap().timestamp > stamp);
}

#[test]
fn corrupt_log_is_an_error() {
    let store = Arc::new(MemoryStore::new());
    store.set(PENDING_OPS_KEY, "[{").unwrap();
    let res = OperationLog::load(store, Arc::new(FixedClock::at(0)));
    assert!(res.is_err());
}

#[test]
fn list_unsynced_is_in_timestamp_order() {
    let (mut log, _) = fresh();
    let ids: Vec<OperationId> = (0..4).map(|i| log.enqueue(update(&i.to_string())).unwrap()).collect();
    log.mark_synced(&ids[1]);
    let listed: Vec<OperationId> = log.list_unsynced().into_iter().map(|op| op.id).collect();
    assert_eq!(listed, vec![ids[0].clone(), ids[2].clone(), ids[3].clone()]);
}

#[test]
fn mark_failed_counts_retries() {
    let (mut log, _) = fresh();
    let id = log.enqueue(update("1")).unwrap();
    assert!(log.mark_failed(&id, "boom"));
    assert!(log.mark_failed(&id, "boom again"));
    let op = log.get(&id).unwrap();
    assert_eq!(op.retry_count, 2);
    assert_eq!(op.last_error.as_deref(), Some("boom again"));
    assert!(!op.synced);
    assert!(!log.mark_failed(&OperationId::from("missing"), "x"));
}

#[test]
fn purge_drops_only_synced() {
    let (mut log, _) = fresh();
    let a = log.enqueue(update("1")).unwrap();
    log.enqueue(update("2")).unwrap();
    log.mark_synced(&a);
    assert_eq!(log.purge_synced(), 1);
    assert!(log.get(&a).is_none());
    assert_eq!(log.unsynced_len(), 1);
}

#[test]
fn rewrite_resource_id_updates_dependents() {
    let (mut log, _) = fresh();
    let create = log
        .enqueue(OpPayload::CreateEvent {
            event: event("temp-1", "Music", 1),
        })
        .unwrap();
    log.enqueue(update("temp-1")).unwrap();
    log.enqueue(add("u1", "temp-1")).unwrap();
    log.enqueue(update("other")).unwrap();
    log.mark_synced(&create);

    assert_eq!(log.rewrite_resource_id(&"temp-1".into(), &"42".into()), 2);
    assert!(log
        .list_unsynced()
        .iter()
        .all(|op| op.payload.pending_dependency().is_none()));
}

#[test]
fn cancel_inverse_removes_opposite_interest_op() {
    let (mut log, _) = fresh();
    log.enqueue(add("u1", "1")).unwrap();
    assert!(log.cancel_inverse(&remove("u1", "1")).unwrap());
    assert_eq!(log.unsynced_len(), 0);
    assert!(!log.cancel_inverse(&remove("u1", "1")).unwrap());
}

#[test]
fn cancel_inverse_skips_in_flight_entry() {
    let (mut log, _) = fresh();
    let id = log.enqueue(add("u1", "1")).unwrap();
    log.set_in_flight(Some(id));
    assert!(!log.cancel_inverse(&remove("u1", "1")).unwrap());
    assert_eq!(log.unsynced_len(), 1);
}

#[test]
fn cancel_provisional_drops_create_and_dependents() {
    let (mut log, _) = fresh();
    log.enqueue(OpPayload::CreateEvent {
        event: event("temp-1", "Music", 1),
    })
    .unwrap();
    log.enqueue(update("temp-1")).unwrap();
    log.enqueue(add("u1", "temp-1")).unwrap();
    log.enqueue(update("7")).unwrap();

    assert_eq!(log.cancel_provisional(&"temp-1".into()).unwrap(), Some(3));
    assert_eq!(log.unsynced_len(), 1);
}

#[test]
fn cancel_provisional_defers_to_in_flight_create() {
    let (mut log, _) = fresh();
    let create = log
        .enqueue(OpPayload::CreateEvent {
            event: event("temp-1", "Music", 1),
        })
        .unwrap();
    log.set_in_flight(Some(create));
    assert_eq!(log.cancel_provisional(&"temp-1".into()).unwrap(), None);
    assert_eq!(log.unsynced_len(), 1);
}

#[test]
fn cancel_interest_ops_leaves_event_ops() {
    let (mut log, _) = fresh();
    log.enqueue(add("u1", "5")).unwrap();
    log.enqueue(remove("u2", "5")).unwrap();
    log.enqueue(update("5")).unwrap();
    assert_eq!(log.cancel_interest_ops(&"5".into()).unwrap(), 2);
    assert_eq!(log.list_unsynced()[0].resource(), ResourceKind::Event);
}

#[test]
fn overlay_reflects_unsynced_event_ops() {
    let (mut log, _) = fresh();
    log.enqueue(OpPayload::CreateEvent {
        event: event("temp-1", "Music", 1),
    })
    .unwrap();
    log.enqueue(update("2")).unwrap();
    let del = log
        .enqueue(OpPayload::DeleteEvent {
            event_id: "3".into(),
        })
        .unwrap();
    let overlay = log.overlay();
    assert!(overlay.pinned.contains(&EventId::from("temp-1")));
    assert!(overlay.pinned.contains(&EventId::from("2")));
    assert!(overlay.hidden.contains(&EventId::from("3")));

    log.mark_synced(&del);
    assert!(log.overlay().hidden.is_empty());
}

#[test]
fn user_overlay_tracks_interests_and_profile() {
    let (mut log, _) = fresh();
    log.enqueue(add("u1", "1")).unwrap();
    log.enqueue(remove("u2", "2")).unwrap();
    log.enqueue(OpPayload::UpdateUser {
        user_id: "u1".into(),
        patch: evsync_core::UserPatch {
            name: Some("Ada".into()),
            ..Default::default()
        },
    })
    .unwrap();
    let overlay = log.user_overlay("u1");
    assert!(overlay.pending_profile);
    assert_eq!(overlay.pending_interests.len(), 1);
    assert!(overlay.pending_interests.contains(&EventId::from("1")));
    assert!(!log.user_overlay("u2").pending_profile);
    assert!(log.has_pending_for(&"2".into()));
    assert!(!log.has_pending_for(&"9".into()));
}
