// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamps for pending operations.
//!
//! Log entries are ordered by timestamp within their sync group, so two
//! entries enqueued in the same millisecond must still get distinct,
//! increasing stamps. [`OpClock`] guarantees that even when the wall clock
//! stalls or steps backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Trait for getting the current wall clock time.
///
/// This allows injecting a mock clock for testing.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;
}

impl<C: ClockSource + ?Sized> ClockSource for Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// System clock implementation using `std::time::SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Monotonic operation clock over a [`ClockSource`].
pub struct OpClock<C: ClockSource = SystemClock> {
    source: C,
    last: AtomicU64,
}

impl OpClock<SystemClock> {
    pub fn system() -> Self {
        OpClock::new(SystemClock)
    }
}

impl<C: ClockSource> OpClock<C> {
    pub fn new(source: C) -> Self {
        OpClock {
            source,
            last: AtomicU64::new(0),
        }
    }

    /// Raises the floor so later ticks sort after `ms` (used after loading a
    /// persisted log).
    pub fn observe(&self, ms: u64) {
        self.last.fetch_max(ms, Ordering::SeqCst);
    }

    /// Returns a timestamp strictly greater than every previous tick.
    pub fn tick(&self) -> u64 {
        let now = self.source.now_ms();
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
