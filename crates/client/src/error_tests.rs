// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[test]
fn core_validation_errors_map_to_validation() {
    let err: Error = evsync_core::Error::Required { field: "title" }.into();
    assert!(err.is_validation());
    assert!(err.to_string().contains("title is required"));
}

#[test]
fn core_decode_errors_stay_core() {
    let err: Error = evsync_core::Error::Decode("bad".into()).into();
    assert!(matches!(err, Error::Core(_)));
    assert!(!err.is_validation());
}

#[parameterized(
    not_authenticated = { Error::NotAuthenticated, "hint:" },
    offline = { Error::Offline("offline".into()), "status: offline" },
    cancelled = { Error::Cancelled, "cancelled" },
    event_not_found = { Error::EventNotFound("7".into()), "event not found: 7" },
)]
fn error_display(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn remote_error_is_transparent() {
    let err: Error = RemoteError::NotFound.into();
    assert_eq!(err.to_string(), RemoteError::NotFound.to_string());
}
