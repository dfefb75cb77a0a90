// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::sync::atomic::AtomicUsize;

fn counter(d: &Dispatcher, kind: MessageKind) -> (ListenerId, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    let id = d.on(
        kind,
        Arc::new(move |_msg: &ChannelMessage| {
            seen.fetch_add(1, Ordering::SeqCst);
        }),
    );
    (id, hits)
}

const CREATED: &str = r#"{"type":"event-created","event":{"id":7,"title":"Jam","date":"2026-03-01","category":"Music"}}"#;

#[test]
fn dispatch_routes_by_kind() {
    let d = Dispatcher::new();
    let (_, created) = counter(&d, MessageKind::EventCreated);
    let (_, deleted) = counter(&d, MessageKind::EventDeleted);

    assert_eq!(d.dispatch_text(CREATED), Some(MessageKind::EventCreated));
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(deleted.load(Ordering::SeqCst), 0);
}

#[test]
fn legacy_envelope_reaches_created_listeners() {
    let d = Dispatcher::new();
    let (_, created) = counter(&d, MessageKind::EventCreated);
    let legacy = r#"{"type":"event_update","action":"created","event":{"id":"9","title":"T","date":"2026-03-02T00:00:00Z"}}"#;
    assert_eq!(d.dispatch_text(legacy), Some(MessageKind::EventCreated));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn undecodable_frames_are_dropped() {
    let d = Dispatcher::new();
    let (_, created) = counter(&d, MessageKind::EventCreated);
    assert_eq!(d.dispatch_text("not json"), None);
    assert_eq!(d.dispatch_text(r#"{"type":"mystery"}"#), None);
    assert_eq!(created.load(Ordering::SeqCst), 0);
}

#[test]
fn off_unregisters() {
    let d = Dispatcher::new();
    let (id, hits) = counter(&d, MessageKind::EventCreated);
    let (_, other) = counter(&d, MessageKind::EventCreated);
    assert!(d.off(id));
    assert!(!d.off(id));
    d.dispatch_text(CREATED);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(other.load(Ordering::SeqCst), 1);
}

#[test]
fn listeners_may_register_during_dispatch() {
    let d = Arc::new(Dispatcher::new());
    let inner = Arc::clone(&d);
    d.on(
        MessageKind::ConnectionEstablished,
        Arc::new(move |_msg: &ChannelMessage| {
            inner.on(MessageKind::EventCreated, Arc::new(|_msg: &ChannelMessage| {}));
        }),
    );
    let msg = ChannelMessage::ConnectionEstablished {
        message: "hi".into(),
    };
    assert_eq!(d.dispatch(&msg), 1);
    assert_eq!(d.dispatch_text(CREATED), Some(MessageKind::EventCreated));
}
