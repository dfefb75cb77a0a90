// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channel state machine.
//!
//! ```text
//!  Disconnected ──Connect──► Connecting{0} ──Opened──► Connected
//!       ▲                        │  ▲                      │
//!       │                      Lost │RetryDue             Lost
//!   Disconnect                   ▼  │                      ▼
//!   (any state)             Reconnecting{n} ◄──────────────┘
//!                                │
//!                     policy exhausted
//!                                ▼
//!                             Failed ──Poll──► Polling
//! ```
//!
//! [`transition`] is pure; the channel task drives it and owns the timers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    /// Opening the socket. `attempt` is 0 for the first try.
    Connecting { attempt: u32 },
    Connected,
    /// Waiting before reconnect attempt `attempt` (1-based).
    Reconnecting { attempt: u32 },
    /// Feeding listeners from the polling fallback.
    Polling,
    /// Reconnect attempts exhausted.
    Failed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Disconnected => f.write_str("disconnected"),
            ChannelState::Connecting { attempt: 0 } => f.write_str("connecting"),
            ChannelState::Connecting { attempt } => write!(f, "connecting (attempt {attempt})"),
            ChannelState::Connected => f.write_str("connected"),
            ChannelState::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            ChannelState::Polling => f.write_str("polling"),
            ChannelState::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Connect,
    Opened,
    /// The socket closed, errored, or failed to open.
    Lost,
    RetryDue,
    Poll,
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum reconnect attempts (0 = unlimited).
    pub max_attempts: u32,
    /// Delay before the first reconnect attempt.
    pub delay: Duration,
    pub backoff: Backoff,
    /// Cap for exponential backoff.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            max_attempts: 5,
            delay: Duration::from_secs(5),
            backoff: Backoff::Fixed,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Returns true if reconnect attempt `attempt` (1-based) may run.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt <= self.max_attempts
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor).min(self.max_delay)
            }
        }
    }
}

pub fn transition(state: ChannelState, event: ChannelEvent, policy: &ReconnectPolicy) -> ChannelState {
    use ChannelEvent as E;
    use ChannelState as S;

    let lost = |attempt: u32| {
        if policy.allows(attempt) {
            S::Reconnecting { attempt }
        } else {
            S::Failed
        }
    };

    match (state, event) {
        (_, E::Disconnect) => S::Disconnected,
        (_, E::Poll) => S::Polling,
        (S::Disconnected | S::Failed, E::Connect) => S::Connecting { attempt: 0 },
        (S::Connecting { .. }, E::Opened) => S::Connected,
        (S::Connected, E::Lost) => lost(1),
        (S::Connecting { attempt }, E::Lost) => lost(attempt.saturating_add(1)),
        (S::Reconnecting { attempt }, E::RetryDue) => S::Connecting { attempt },
        (s, _) => s,
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
