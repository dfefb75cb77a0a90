// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::model::EventId;
use chrono::{NaiveDate, NaiveTime};
use yare::parameterized;

fn event() -> Event {
    Event {
        id: EventId::from("1"),
        title: "Jazz night".into(),
        description: "Live quartet".into(),
        date: NaiveDate::from_ymd_opt(2026, 6, 12).unwrap(),
        start_time: NaiveTime::from_hms_opt(19, 0, 0),
        end_time: NaiveTime::from_hms_opt(22, 0, 0),
        location: "Club".into(),
        category: "Music".into(),
        is_online: false,
        image: None,
        created_by: None,
    }
}

#[test]
fn valid_event_passes() {
    check_event(&event()).unwrap();
}

#[test]
fn blank_image_is_rejected() {
    let mut e = event();
    e.image = Some("  ".into());
    assert!(matches!(
        check_event(&e),
        Err(Error::Invalid { field: "image", .. })
    ));
    e.image = Some("https://img/a.png".into());
    check_event(&e).unwrap();
}

#[parameterized(
    title = { "title" },
    description = { "description" },
    location = { "location" },
    category = { "category" },
)]
fn blank_required_field(field: &str) {
    let mut e = event();
    match field {
        "title" => e.title = "   ".into(),
        "description" => e.description = String::new(),
        "location" => e.location = String::new(),
        _ => e.category = String::new(),
    }
    let err = check_event(&e).unwrap_err();
    assert!(matches!(err, Error::Required { field: f } if f == field));
}

#[test]
fn end_before_start_rejected() {
    let mut e = event();
    e.end_time = NaiveTime::from_hms_opt(18, 0, 0);
    assert!(matches!(
        check_event(&e).unwrap_err(),
        Error::Invalid { field: "end_time", .. }
    ));
}

#[test]
fn start_without_end_is_fine() {
    let mut e = event();
    e.end_time = None;
    check_event(&e).unwrap();
}

#[test]
fn title_too_long() {
    let mut e = event();
    e.title = "x".repeat(MAX_TITLE_LENGTH + 1);
    assert!(matches!(
        check_event(&e).unwrap_err(),
        Error::TooLong { field: "title", .. }
    ));
}

#[test]
fn empty_patch_rejected() {
    assert!(matches!(
        check_patch(&EventPatch::default()).unwrap_err(),
        Error::EmptyPatch
    ));
}

#[test]
fn patch_blank_title_rejected() {
    let patch = EventPatch {
        title: Some(String::new()),
        ..Default::default()
    };
    assert!(check_patch(&patch).unwrap_err().is_validation());
}

#[test]
fn user_patch_blank_name_rejected() {
    let patch = UserPatch {
        name: Some(" ".into()),
        ..Default::default()
    };
    assert!(matches!(
        check_user_patch(&patch).unwrap_err(),
        Error::Required { field: "name" }
    ));
}

#[parameterized(
    plain = { "42", true },
    provisional = { "temp-abc", true },
    empty = { "", false },
    slash = { "1/2", false },
    space = { "a b", false },
)]
fn ids(id: &str, ok: bool) {
    assert_eq!(check_id(id).is_ok(), ok);
}
