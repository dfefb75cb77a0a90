// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The local replica: cache plus operation log behind one lock.
//!
//! Both halves change together (a write enqueues and updates the cache in
//! the same critical section), so they share a single mutex. The lock is a
//! plain `std::sync::Mutex` and is never held across an `.await`.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error};

use evsync_core::{Event, OpPayload, User};

use crate::cache::LocalCache;
use crate::oplog::OperationLog;

pub struct Replica {
    pub cache: LocalCache,
    pub log: OperationLog,
}

impl Replica {
    /// Stores a server copy of an event unless an unsynced create, update
    /// or delete for it exists. Returns true if the copy was stored.
    pub fn accept_remote(&mut self, event: Event) -> bool {
        let overlay = self.log.overlay();
        if overlay.pinned.contains(&event.id) || overlay.hidden.contains(&event.id) {
            debug!(id = %event.id, "keeping local version");
            return false;
        }
        self.cache.upsert(event);
        true
    }

    /// Re-applies every unsynced entry to the cache in log order.
    ///
    /// Run at open: the snapshot may predate entries that were persisted
    /// after it, or may have been discarded as unreadable. Returns the number
    /// of entries applied.
    pub fn replay_pending(&mut self) -> usize {
        let pending = self.log.list_unsynced();
        for op in &pending {
            match &op.payload {
                OpPayload::CreateEvent { event } => self.cache.upsert(event.clone()),
                OpPayload::UpdateEvent { event_id, patch } => {
                    if let Some(mut event) = self.cache.get_by_id(event_id) {
                        patch.apply(&mut event);
                        self.cache.upsert(event);
                    }
                }
                OpPayload::DeleteEvent { event_id } => {
                    self.cache.remove(event_id);
                }
                OpPayload::UpdateUser { user_id, patch } => {
                    let mut user = self
                        .cache
                        .user(user_id)
                        .unwrap_or_else(|| User::placeholder(user_id.as_str()));
                    patch.apply(&mut user);
                    self.cache.put_user(user);
                }
                OpPayload::AddInterest { user_id, event_id } => {
                    self.cache.set_interest_relation(user_id, event_id);
                }
                OpPayload::RemoveInterest { user_id, event_id } => {
                    self.cache.clear_interest_relation(user_id, event_id);
                }
            }
        }
        pending.len()
    }

    /// Persists the log, logging rather than returning a failure.
    pub fn persist_log(&self) {
        if let Err(e) = self.log.persist() {
            error!(error = %e, "failed to persist operation log");
        }
    }
}

#[derive(Clone)]
pub struct SharedReplica(Arc<Mutex<Replica>>);

impl SharedReplica {
    pub fn new(replica: Replica) -> Self {
        SharedReplica(Arc::new(Mutex::new(replica)))
    }

    /// Runs `f` with exclusive access, then flushes the cache snapshot.
    ///
    /// A failed flush is logged, not returned: the log entry that matters
    /// was already persisted inside `f`, and [`Replica::replay_pending`]
    /// restores its effect on the next start.
    pub fn with<T>(&self, f: impl FnOnce(&mut Replica) -> T) -> T {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut guard);
        if let Err(e) = guard.cache.flush() {
            error!(error = %e, "failed to persist cache snapshot");
        }
        out
    }

    /// Runs `f` with shared access. Nothing is flushed.
    pub fn read<T>(&self, f: impl FnOnce(&Replica) -> T) -> T {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}
