// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Latest-wins cancellation for read requests.

use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Holds the token of the most recent request. Starting a new request
/// cancels the previous one, so a slow stale response never overwrites a
/// newer one.
#[derive(Default)]
pub struct RequestSlot {
    current: Mutex<Option<CancellationToken>>,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any in-flight request and returns the token for a new one.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    /// Cancels the in-flight request, if any.
    pub fn cancel(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = current {
            token.cancel();
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
