// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn begin_cancels_previous() {
    let slot = RequestSlot::new();
    let first = slot.begin();
    assert!(!first.is_cancelled());

    let second = slot.begin();
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
}

#[test]
fn cancel_clears_slot() {
    let slot = RequestSlot::new();
    let token = slot.begin();
    slot.cancel();
    assert!(token.is_cancelled());

    // Nothing left to cancel.
    slot.cancel();
    assert!(!slot.begin().is_cancelled());
}
