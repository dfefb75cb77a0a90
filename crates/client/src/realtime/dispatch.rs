// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Listener registry keyed by message kind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use evsync_core::{ChannelMessage, MessageKind};

pub type Listener = Arc<dyn Fn(&ChannelMessage) + Send + Sync>;

/// Handle returned by [`Dispatcher::on`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct Dispatcher {
    listeners: Mutex<HashMap<MessageKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: MessageKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        for list in listeners.values_mut() {
            let before = list.len();
            list.retain(|(lid, _)| *lid != id);
            removed |= list.len() != before;
        }
        removed
    }

    /// Calls every listener registered for the message's kind. Returns how
    /// many ran.
    pub fn dispatch(&self, msg: &ChannelMessage) -> usize {
        // Clone the list out so listeners may register or unregister.
        let targets: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&msg.kind())
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        for listener in &targets {
            listener(msg);
        }
        targets.len()
    }

    /// Decodes and dispatches a raw frame. Undecodable frames are logged and
    /// dropped.
    pub fn dispatch_text(&self, text: &str) -> Option<MessageKind> {
        match ChannelMessage::from_json(text) {
            Ok(msg) => {
                let delivered = self.dispatch(&msg);
                debug!(kind = %msg.kind(), delivered, "dispatched message");
                Some(msg.kind())
            }
            Err(e) => {
                warn!(error = %e, "dropping undecodable channel message");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
