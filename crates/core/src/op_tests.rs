// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::NaiveDate;
use yare::parameterized;

fn event(id: &str) -> Event {
    Event {
        id: EventId::from(id),
        title: "Workshop".into(),
        description: "Hands-on".into(),
        date: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
        start_time: None,
        end_time: None,
        location: "Room 1".into(),
        category: "Design".into(),
        is_online: false,
        image: None,
        created_by: Some("u1".into()),
    }
}

fn add(event_id: &str) -> OpPayload {
    OpPayload::AddInterest {
        user_id: "u1".into(),
        event_id: EventId::from(event_id),
    }
}

fn remove(event_id: &str) -> OpPayload {
    OpPayload::RemoveInterest {
        user_id: "u1".into(),
        event_id: EventId::from(event_id),
    }
}

#[parameterized(
    create_event = { OpPayload::CreateEvent { event: event("temp-1") }, OperationKind::Create, ResourceKind::Event, None },
    update_event = { OpPayload::UpdateEvent { event_id: "5".into(), patch: EventPatch { title: Some("x".into()), ..Default::default() } }, OperationKind::Update, ResourceKind::Event, Some("5") },
    delete_event = { OpPayload::DeleteEvent { event_id: "7".into() }, OperationKind::Delete, ResourceKind::Event, Some("7") },
    update_user = { OpPayload::UpdateUser { user_id: "u1".into(), patch: UserPatch { name: Some("A".into()), ..Default::default() } }, OperationKind::Update, ResourceKind::User, Some("u1") },
    add_interest = { add("9"), OperationKind::Create, ResourceKind::Interest, None },
    remove_interest = { remove("9"), OperationKind::Delete, ResourceKind::Interest, Some("9") },
)]
fn payload_classification(
    payload: OpPayload,
    kind: OperationKind,
    resource: ResourceKind,
    target: Option<&str>,
) {
    assert_eq!(payload.kind(), kind);
    assert_eq!(payload.resource(), resource);
    assert_eq!(payload.target_id(), target);
}

#[test]
fn resource_kind_serializes_kebab() {
    let json = serde_json::to_string(&ResourceKind::Interest).unwrap();
    assert_eq!(json, "\"interest-relation\"");
}

#[test]
fn payload_is_tagged() {
    let json = serde_json::to_value(add("9")).unwrap();
    assert_eq!(json["type"], "add_interest");
    assert_eq!(json["event_id"], "9");
}

#[test]
fn rewrite_event_id_in_payload() {
    let mut op = OpPayload::UpdateEvent {
        event_id: "temp-1".into(),
        patch: EventPatch {
            title: Some("t".into()),
            ..Default::default()
        },
    };
    assert!(op.rewrite_event_id(&"temp-1".into(), &"42".into()));
    assert_eq!(op.target_id(), Some("42"));
    assert!(!op.rewrite_event_id(&"temp-1".into(), &"43".into()));
}

#[test]
fn rewrite_create_event_id() {
    let mut op = OpPayload::CreateEvent {
        event: event("temp-1"),
    };
    assert!(op.rewrite_event_id(&"temp-1".into(), &"42".into()));
    assert!(op.references(&"42".into()));
}

#[test]
fn pending_dependency_ignores_the_create() {
    let create = OpPayload::CreateEvent {
        event: event("temp-1"),
    };
    assert_eq!(create.pending_dependency(), None);
    let follow_up = add("temp-1");
    assert_eq!(follow_up.pending_dependency(), Some(&EventId::from("temp-1")));
    assert_eq!(add("42").pending_dependency(), None);
}

#[test]
fn inverse_interest_ops() {
    assert!(add("1").is_inverse_of(&remove("1")));
    assert!(remove("1").is_inverse_of(&add("1")));
    assert!(!add("1").is_inverse_of(&remove("2")));
    assert!(!add("1").is_inverse_of(&add("1")));
}

#[test]
fn validate_rejects_bad_payloads() {
    let empty = OpPayload::UpdateEvent {
        event_id: "1".into(),
        patch: EventPatch::default(),
    };
    assert!(empty.validate().unwrap_err().is_validation());
    assert!(add("").validate().is_err());
    let mut bad = event("temp-1");
    bad.title.clear();
    assert!(OpPayload::CreateEvent { event: bad }.validate().is_err());
}

#[test]
fn pending_operation_defaults() {
    let op = PendingOperation::new(add("1"), 100);
    assert!(!op.synced);
    assert_eq!(op.retry_count, 0);
    assert_eq!(op.group(), (ResourceKind::Interest, OperationKind::Create));
    let json = serde_json::to_string(&op).unwrap();
    let back: PendingOperation = serde_json::from_str(&json).unwrap();
    assert_eq!(back, op);
}
