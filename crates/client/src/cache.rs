// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local cache: the materialized view of events, interest relations and user
//! profiles.
//!
//! All operations are synchronous over in-memory state. Mutations mark the
//! cache dirty; [`LocalCache::flush`] writes the snapshot. The replica
//! flushes after every batch of mutations, so writes never wait on a
//! partially applied state.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use evsync_core::{Event, EventFilter, EventId, InterestPair, Sort, User, UserId};

use crate::storage::{load_json, save_json, KeyValueStore, StorageError, StorageResult, CACHE_KEY};

/// Persisted form of the cache.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default)]
    interests: Vec<InterestPair>,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    last_sync_time: Option<DateTime<Utc>>,
}

/// Events whose local state server data must not replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    /// Events with an unsynced create or update. The local version wins.
    pub pinned: HashSet<EventId>,
    /// Events with an unsynced delete. They stay hidden.
    pub hidden: HashSet<EventId>,
}

/// Pending local state for one user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserOverlay {
    /// Events with an unsynced interest add or remove for this user.
    pub pending_interests: HashSet<EventId>,
    /// True when a profile update is still unsynced.
    pub pending_profile: bool,
}

pub struct LocalCache {
    events: BTreeMap<EventId, Event>,
    interests: BTreeSet<InterestPair>,
    users: BTreeMap<UserId, User>,
    last_sync: Option<DateTime<Utc>>,
    store: Arc<dyn KeyValueStore>,
    dirty: bool,
}

impl LocalCache {
    /// An empty cache backed by `store`. Nothing is read.
    pub fn empty(store: Arc<dyn KeyValueStore>) -> Self {
        LocalCache {
            events: BTreeMap::new(),
            interests: BTreeSet::new(),
            users: BTreeMap::new(),
            last_sync: None,
            store,
            dirty: false,
        }
    }

    /// Loads the persisted snapshot, or starts empty if there is none.
    ///
    /// An unreadable snapshot is discarded: the cache can always be rebuilt
    /// from the service.
    pub fn load(store: Arc<dyn KeyValueStore>) -> StorageResult<Self> {
        let snapshot = match load_json::<Snapshot>(store.as_ref(), CACHE_KEY) {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(StorageError::Serialization(e)) => {
                warn!(error = %e, "discarding unreadable cache snapshot");
                Snapshot::default()
            }
            Err(e) => return Err(e),
        };

        let mut cache = LocalCache::empty(store);
        cache.events = snapshot
            .events
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();
        cache.interests = snapshot.interests.into_iter().collect();
        cache.users = snapshot
            .users
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        cache.last_sync = snapshot.last_sync_time;
        Ok(cache)
    }

    /// Writes the snapshot if anything changed since the last flush.
    pub fn flush(&mut self) -> StorageResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let snapshot = Snapshot {
            events: self.events.values().cloned().collect(),
            interests: self.interests.iter().cloned().collect(),
            users: self.users.values().cloned().collect(),
            last_sync_time: self.last_sync,
        };
        save_json(self.store.as_ref(), CACHE_KEY, &snapshot)?;
        self.dirty = false;
        Ok(())
    }


    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events ordered by date.
    pub fn get_all(&self) -> Vec<Event> {
        sorted(self.events.values().cloned().collect())
    }

    /// The event with `id`, or `None` if the cache does not know it.
    pub fn get_by_id(&self, id: &EventId) -> Option<Event> {
        self.events.get(id).cloned()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.events.contains_key(id)
    }

    /// Events created by `user_id`.
    pub fn get_owned_by_user(&self, user_id: &str) -> Vec<Event> {
        let listed: HashSet<&EventId> = self
            .users
            .get(user_id)
            .map(|u| u.events.iter().collect())
            .unwrap_or_default();
        sorted(
            self.events
                .values()
                .filter(|e| e.created_by.as_deref() == Some(user_id) || listed.contains(&e.id))
                .cloned()
                .collect(),
        )
    }

    /// Events `user_id` is interested in.
    pub fn get_interested_by_user(&self, user_id: &str) -> Vec<Event> {
        sorted(
            self.interests
                .iter()
                .filter(|p| p.user_id == user_id)
                .filter_map(|p| self.events.get(&p.event_id).cloned())
                .collect(),
        )
    }

    pub fn upsert(&mut self, event: Event) {
        if let Some(owner) = &event.created_by {
            if let Some(user) = self.users.get_mut(owner) {
                if !user.events.contains(&event.id) {
                    user.events.push(event.id.clone());
                }
            }
        }
        self.events.insert(event.id.clone(), event);
        self.dirty = true;
    }

    /// Removes an event and every relation pointing at it.
    pub fn remove(&mut self, id: &EventId) -> Option<Event> {
        let removed = self.events.remove(id);
        let before = self.interests.len();
        self.interests.retain(|p| p.event_id != *id);
        let mut touched = removed.is_some() || before != self.interests.len();
        for user in self.users.values_mut() {
            let (owned, interested) = (user.events.len(), user.interested_events.len());
            user.events.retain(|e| e != id);
            user.interested_events.retain(|e| e != id);
            touched |= owned != user.events.len() || interested != user.interested_events.len();
        }
        if touched {
            self.dirty = true;
        }
        removed
    }

    pub fn has_interest(&self, user_id: &str, event_id: &EventId) -> bool {
        self.interests
            .contains(&InterestPair::new(user_id, event_id.clone()))
    }

    /// Records that `user_id` is interested in `event_id`. Returns false if
    /// the relation already existed.
    pub fn set_interest_relation(&mut self, user_id: &str, event_id: &EventId) -> bool {
        if !self
            .interests
            .insert(InterestPair::new(user_id, event_id.clone()))
        {
            return false;
        }
        let user = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| User::placeholder(user_id));
        if !user.interested_events.contains(event_id) {
            user.interested_events.push(event_id.clone());
        }
        self.dirty = true;
        true
    }

    /// Removes the relation. Returns false if it did not exist.
    pub fn clear_interest_relation(&mut self, user_id: &str, event_id: &EventId) -> bool {
        if !self
            .interests
            .remove(&InterestPair::new(user_id, event_id.clone()))
        {
            return false;
        }
        if let Some(user) = self.users.get_mut(user_id) {
            user.interested_events.retain(|e| e != event_id);
        }
        self.dirty = true;
        true
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).cloned()
    }

    /// Replaces a user record. The user's interest relations are rebuilt
    /// from its `interested_events` list.
    pub fn put_user(&mut self, user: User) {
        self.interests.retain(|p| p.user_id != user.id);
        for event_id in &user.interested_events {
            self.interests
                .insert(InterestPair::new(user.id.clone(), event_id.clone()));
        }
        self.users.insert(user.id.clone(), user);
        self.dirty = true;
    }

    /// Merges a server copy of a user profile without losing unsynced local
    /// changes.
    pub fn merge_user(&mut self, remote: User, pending: &UserOverlay) {
        let mut merged = remote;
        if let Some(local) = self.users.get(&merged.id) {
            if pending.pending_profile {
                merged.name.clone_from(&local.name);
                merged.description.clone_from(&local.description);
                merged.avatar.clone_from(&local.avatar);
            }
            merged
                .interested_events
                .retain(|id| !pending.pending_interests.contains(id));
            for id in &local.interested_events {
                if pending.pending_interests.contains(id) && !merged.interested_events.contains(id) {
                    merged.interested_events.push(id.clone());
                }
            }
            for id in &local.events {
                if id.is_provisional() && !merged.events.contains(id) {
                    merged.events.push(id.clone());
                }
            }
        }
        self.put_user(merged);
    }

    /// Sets `user_id`'s interest list to `remote_ids`, except for events with
    /// unsynced interest operations, which keep their local state.
    pub fn reconcile_interests(
        &mut self,
        user_id: &str,
        remote_ids: Vec<EventId>,
        pending: &HashSet<EventId>,
    ) {
        let mut user = self
            .users
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| User::placeholder(user_id));
        user.interested_events = remote_ids;
        let overlay = UserOverlay {
            pending_interests: pending.clone(),
            pending_profile: true,
        };
        self.merge_user(user, &overlay);
    }

    /// Replaces `old` with `new` everywhere it appears. Returns true if
    /// anything changed.
    pub fn rewrite_event_id(&mut self, old: &EventId, new: &EventId) -> bool {
        let mut changed = false;
        if let Some(mut event) = self.events.remove(old) {
            event.id = new.clone();
            self.events.insert(new.clone(), event);
            changed = true;
        }
        let stale: Vec<InterestPair> = self
            .interests
            .iter()
            .filter(|p| p.event_id == *old)
            .cloned()
            .collect();
        for pair in stale {
            self.interests.remove(&pair);
            self.interests
                .insert(InterestPair::new(pair.user_id, new.clone()));
            changed = true;
        }
        for user in self.users.values_mut() {
            for id in user
                .events
                .iter_mut()
                .chain(user.interested_events.iter_mut())
            {
                if *id == *old {
                    *id = new.clone();
                    changed = true;
                }
            }
        }
        if changed {
            self.dirty = true;
        }
        changed
    }

    /// Merges server events, skipping pinned and hidden ones.
    pub fn merge_remote(&mut self, events: Vec<Event>, overlay: &Overlay) {
        for event in events {
            if overlay.hidden.contains(&event.id) || overlay.pinned.contains(&event.id) {
                continue;
            }
            self.upsert(event);
        }
    }

    /// Merges a complete server listing and evicts confirmed events the
    /// server no longer has. Provisional and pinned events stay.
    pub fn replace_remote(&mut self, events: Vec<Event>, overlay: &Overlay) {
        let seen: HashSet<EventId> = events.iter().map(|e| e.id.clone()).collect();
        self.merge_remote(events, overlay);
        let evict: Vec<EventId> = self
            .events
            .keys()
            .filter(|id| !id.is_provisional() && !seen.contains(*id) && !overlay.pinned.contains(*id))
            .cloned()
            .collect();
        for id in evict {
            self.remove(&id);
        }
    }

    /// Server results as the user should see them: pending deletes hidden,
    /// pending edits shown in their local form, and local-only events
    /// matching `filter` added.
    pub fn overlay_view(&self, remote: Vec<Event>, overlay: &Overlay, filter: &EventFilter) -> Vec<Event> {
        let mut seen = HashSet::new();
        let mut out = self.overlay_items(remote, overlay, filter);
        for event in &out {
            seen.insert(event.id.clone());
        }
        for event in self.events.values() {
            let local_only = event.id.is_provisional() || overlay.pinned.contains(&event.id);
            if local_only && !seen.contains(&event.id) && filter.matches(event) {
                out.push(event.clone());
            }
        }
        let sort = filter.sort.unwrap_or_default();
        out.sort_by(|a, b| sort.compare(a, b));
        out
    }

    /// Like [`LocalCache::overlay_view`] but keeps the server's selection and
    /// order, so page boundaries stay intact.
    pub fn overlay_items(&self, remote: Vec<Event>, overlay: &Overlay, filter: &EventFilter) -> Vec<Event> {
        remote
            .into_iter()
            .filter(|e| !overlay.hidden.contains(&e.id))
            .filter_map(|e| {
                if overlay.pinned.contains(&e.id) {
                    self.events.get(&e.id).filter(|l| filter.matches(l)).cloned()
                } else {
                    Some(e)
                }
            })
            .collect()
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    pub fn set_last_sync(&mut self, at: DateTime<Utc>) {
        self.last_sync = Some(at);
        self.dirty = true;
    }
}

fn sorted(mut events: Vec<Event>) -> Vec<Event> {
    let sort = Sort::default();
    events.sort_by(|a, b| sort.compare(a, b));
    events
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
