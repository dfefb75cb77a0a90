// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operation log: the ordered, durable queue of unconfirmed mutations.
//!
//! Every enqueue is persisted before it returns. If the write fails the
//! entry is dropped again and the caller gets the error, so an `Ok` from
//! [`OperationLog::enqueue`] always means the intent survives a crash.

use std::sync::Arc;

use tracing::debug;

use evsync_core::{
    ClockSource, EventId, OpClock, OpPayload, OperationId, PendingOperation, ResourceKind,
};

use crate::cache::{Overlay, UserOverlay};
use crate::error::Result;
use crate::storage::{load_json, save_json, KeyValueStore, StorageResult, PENDING_OPS_KEY};

pub struct OperationLog {
    entries: Vec<PendingOperation>,
    clock: OpClock<Arc<dyn ClockSource>>,
    store: Arc<dyn KeyValueStore>,
    /// The entry the sync engine is currently sending, if any.
    in_flight: Option<OperationId>,
}

impl OperationLog {
    /// Loads the persisted log. A corrupt log is an error: pending intent is
    /// never discarded silently.
    pub fn load(store: Arc<dyn KeyValueStore>, clock: Arc<dyn ClockSource>) -> StorageResult<Self> {
        let entries: Vec<PendingOperation> =
            load_json(store.as_ref(), PENDING_OPS_KEY)?.unwrap_or_default();
        let clock = OpClock::new(clock);
        if let Some(max) = entries.iter().map(|op| op.timestamp).max() {
            clock.observe(max);
        }
        Ok(OperationLog {
            entries,
            clock,
            store,
            in_flight: None,
        })
    }

    /// Validates `payload`, appends it and persists the log.
    pub fn enqueue(&mut self, payload: OpPayload) -> Result<OperationId> {
        payload.validate()?;
        let op = PendingOperation::new(payload, self.clock.tick());
        let id = op.id.clone();
        debug!(op = %id, kind = %op.kind(), resource = %op.resource(), "enqueue");
        self.entries.push(op);
        if let Err(e) = self.persist() {
            self.entries.pop();
            return Err(e.into());
        }
        Ok(id)
    }

    pub fn persist(&self) -> StorageResult<()> {
        save_json(self.store.as_ref(), PENDING_OPS_KEY, &self.entries)
    }

    /// Unsynced entries in timestamp order.
    pub fn list_unsynced(&self) -> Vec<PendingOperation> {
        let mut out: Vec<PendingOperation> =
            self.entries.iter().filter(|op| !op.synced).cloned().collect();
        out.sort_by_key(|op| op.timestamp);
        out
    }

    pub fn unsynced_len(&self) -> usize {
        self.entries.iter().filter(|op| !op.synced).count()
    }

    pub fn get(&self, id: &OperationId) -> Option<&PendingOperation> {
        self.entries.iter().find(|op| op.id == *id)
    }

    fn get_mut(&mut self, id: &OperationId) -> Option<&mut PendingOperation> {
        self.entries.iter_mut().find(|op| op.id == *id)
    }

    pub fn mark_synced(&mut self, id: &OperationId) -> bool {
        match self.get_mut(id) {
            Some(op) => {
                op.synced = true;
                op.last_error = None;
                true
            }
            None => false,
        }
    }

    pub fn mark_failed(&mut self, id: &OperationId, error: &str) -> bool {
        match self.get_mut(id) {
            Some(op) => {
                op.retry_count = op.retry_count.saturating_add(1);
                op.last_error = Some(error.to_string());
                true
            }
            None => false,
        }
    }

    /// Rewrites `old` to `new` in every unsynced entry. Returns the number of
    /// entries changed.
    pub fn rewrite_resource_id(&mut self, old: &EventId, new: &EventId) -> usize {
        self.entries
            .iter_mut()
            .filter(|op| !op.synced)
            .map(|op| op.payload.rewrite_event_id(old, new))
            .filter(|changed| *changed)
            .count()
    }

    /// Drops synced entries. Returns how many were removed.
    pub fn purge_synced(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|op| !op.synced);
        before - self.entries.len()
    }

    pub fn set_in_flight(&mut self, id: Option<OperationId>) {
        self.in_flight = id;
    }

    /// Clears the in-flight marker if it still points at `id`.
    pub fn clear_in_flight(&mut self, id: &OperationId) {
        if self.in_flight.as_ref() == Some(id) {
            self.in_flight = None;
        }
    }

    fn removable(&self, op: &PendingOperation) -> bool {
        !op.synced && self.in_flight.as_ref() != Some(&op.id)
    }

    /// If an unsynced entry undoes `payload`, removes it and returns true.
    ///
    /// The entry being sent right now is never cancelled.
    pub fn cancel_inverse(&mut self, payload: &OpPayload) -> Result<bool> {
        let Some(pos) = self
            .entries
            .iter()
            .rposition(|op| self.removable(op) && payload.is_inverse_of(&op.payload))
        else {
            return Ok(false);
        };
        let removed = self.entries.remove(pos);
        if let Err(e) = self.persist() {
            self.entries.insert(pos, removed);
            return Err(e.into());
        }
        debug!(op = %removed.id, "cancelled inverse interest operation");
        Ok(true)
    }

    /// Drops every unsynced entry referencing the provisional id `id`,
    /// including its create.
    ///
    /// Returns `None` when the create is already being sent; the caller must
    /// then queue a normal delete, which waits for the confirmed id.
    pub fn cancel_provisional(&mut self, id: &EventId) -> Result<Option<usize>> {
        let create_in_flight = self.entries.iter().any(|op| {
            op.payload.references(id) && self.in_flight.as_ref() == Some(&op.id)
        });
        if create_in_flight || !self.has_unsynced_create(id) {
            return Ok(None);
        }
        let removed = self.remove_where(|op| op.payload.references(id))?;
        Ok(Some(removed))
    }

    /// Drops unsynced interest operations for `event_id`.
    pub fn cancel_interest_ops(&mut self, event_id: &EventId) -> Result<usize> {
        self.remove_where(|op| {
            op.resource() == ResourceKind::Interest && op.payload.references(event_id)
        })
    }

    fn remove_where(&mut self, pred: impl Fn(&PendingOperation) -> bool) -> Result<usize> {
        let before = self.entries.clone();
        let in_flight = self.in_flight.clone();
        self.entries
            .retain(|op| op.synced || in_flight.as_ref() == Some(&op.id) || !pred(op));
        let removed = before.len() - self.entries.len();
        if removed > 0 {
            if let Err(e) = self.persist() {
                self.entries = before;
                return Err(e.into());
            }
        }
        Ok(removed)
    }

    fn has_unsynced_create(&self, id: &EventId) -> bool {
        self.entries.iter().any(|op| {
            !op.synced
                && matches!(&op.payload, OpPayload::CreateEvent { event } if event.id == *id)
        })
    }

    /// Events whose local state must win over server data.
    pub fn overlay(&self) -> Overlay {
        let mut overlay = Overlay::default();
        for op in self.entries.iter().filter(|op| !op.synced) {
            match &op.payload {
                OpPayload::CreateEvent { event } => {
                    overlay.pinned.insert(event.id.clone());
                }
                OpPayload::UpdateEvent { event_id, .. } => {
                    overlay.pinned.insert(event_id.clone());
                }
                OpPayload::DeleteEvent { event_id } => {
                    overlay.hidden.insert(event_id.clone());
                }
                _ => {}
            }
        }
        overlay
    }

    /// Pending local state for `user_id`'s profile.
    pub fn user_overlay(&self, user_id: &str) -> UserOverlay {
        let mut overlay = UserOverlay::default();
        for op in self.entries.iter().filter(|op| !op.synced) {
            match &op.payload {
                OpPayload::AddInterest { user_id: u, event_id }
                | OpPayload::RemoveInterest { user_id: u, event_id }
                    if u == user_id =>
                {
                    overlay.pending_interests.insert(event_id.clone());
                }
                OpPayload::UpdateUser { user_id: u, .. } if u == user_id => {
                    overlay.pending_profile = true;
                }
                _ => {}
            }
        }
        overlay
    }

    /// Returns true if any unsynced entry references `id`.
    pub fn has_pending_for(&self, id: &EventId) -> bool {
        self.entries
            .iter()
            .any(|op| !op.synced && op.payload.references(id))
    }
}

#[cfg(test)]
#[path = "oplog_tests.rs"]
mod tests;
