// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The offline-first event store.
//!
//! [`OfflineStore`] is the API the application talks to. It owns the local
//! replica (cache plus operation log), the connectivity monitor, the sync
//! engine and the real-time dispatcher, all built from injected
//! collaborators so several independent stores can live side by side.
//!
//! # Reads
//!
//! Every read takes a [`CancellationToken`]. When the service is online the
//! read goes to the service, the result is merged into the cache without
//! clobbering unsynced local state, and the merged view is returned. When
//! it is not online, or the remote call fails, the cache answers. A
//! cancelled read returns [`Error::Cancelled`] and leaves the cache alone.
//!
//! # Writes
//!
//! A write validates its input, then enqueues the operation and applies the
//! optimistic change to the cache under one lock. Only then is a sync
//! attempted. Remote failures never surface as `Err`; the returned
//! [`WriteReceipt`] says whether the change was confirmed or is waiting in
//! the log.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use evsync_core::query::{paginate, CATEGORIES};
use evsync_core::validate::{check_event, check_patch, check_user_patch};
use evsync_core::{
    to_domain_format, ChannelMessage, ClockSource, Event, EventDraft, EventFilter, EventId,
    EventPatch, MessageKind, OpPayload, OperationId, Page, PageRequest, PendingOperation,
    StoredFile, User, UserPatch, WireEvent,
};

use crate::auth::AuthProvider;
use crate::cache::LocalCache;
use crate::connectivity::{ConnectivityMonitor, ConnectivityStatus};
use crate::error::{Error, Result};
use crate::oplog::OperationLog;
use crate::realtime::{
    self, ChannelConfig, ChannelContext, ChannelHandle, ChannelState, Dispatcher, Listener,
    ListenerId, Transport,
};
use crate::remote::{FileUpload, RemoteError, RemoteFuture, RemoteProbe, RemoteResult, RemoteService};
use crate::replica::{Replica, SharedReplica};
use crate::storage::KeyValueStore;
use crate::sync::{in_send_order, SyncEngine, SyncReport};

/// Collaborators an [`OfflineStore`] is built from.
pub struct StoreDeps {
    pub storage: Arc<dyn KeyValueStore>,
    pub remote: Arc<dyn RemoteService>,
    pub auth: Arc<dyn AuthProvider>,
    pub clock: Arc<dyn ClockSource>,
    /// Initial device network state.
    pub device_online: bool,
}

/// What happened to a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// The affected resource. For a create that synced right away this is
    /// the confirmed id, otherwise the provisional one.
    pub id: String,
    pub status: WriteStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    /// The service accepted the change.
    Confirmed,
    /// Saved locally; it will sync later.
    SavedLocally { last_error: Option<String> },
    /// Already in the requested state. Nothing was queued.
    Unchanged,
    /// Cancelled out an unsynced operation instead of queuing a new one.
    Coalesced,
}

impl WriteReceipt {
    pub fn is_confirmed(&self) -> bool {
        self.status == WriteStatus::Confirmed
    }
}

/// Outcome of staging a write under the replica lock.
enum Staged {
    Queued(OperationId),
    Unchanged,
    Coalesced,
}

#[derive(Default)]
struct Background {
    cancel: Option<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
    channel: Option<ChannelHandle>,
}

struct Inner {
    replica: SharedReplica,
    remote: Arc<dyn RemoteService>,
    auth: Arc<dyn AuthProvider>,
    monitor: Arc<ConnectivityMonitor>,
    engine: Arc<SyncEngine>,
    dispatcher: Arc<Dispatcher>,
    background: Mutex<Background>,
}

#[derive(Clone)]
pub struct OfflineStore {
    inner: Arc<Inner>,
}

impl OfflineStore {
    /// Loads the cache and operation log from storage and wires up the
    /// store. No background work starts until [`OfflineStore::start`].
    pub fn open(deps: StoreDeps) -> Result<Self> {
        let cache = LocalCache::load(Arc::clone(&deps.storage))?;
        let log = OperationLog::load(Arc::clone(&deps.storage), deps.clock)?;
        let replica = SharedReplica::new(Replica { cache, log });
        replica.with(|r| {
            let replayed = r.replay_pending();
            info!(events = r.cache.len(), pending = replayed, "opened local replica");
        });
        let monitor = Arc::new(ConnectivityMonitor::new(
            Arc::new(RemoteProbe(Arc::clone(&deps.remote))),
            deps.device_online,
        ));
        let engine = Arc::new(SyncEngine::new(
            replica.clone(),
            Arc::clone(&deps.remote),
            Arc::clone(&monitor),
        ));
        let dispatcher = Arc::new(Dispatcher::new());
        install_cache_sink(&dispatcher, &replica);

        Ok(OfflineStore {
            inner: Arc::new(Inner {
                replica,
                remote: deps.remote,
                auth: deps.auth,
                monitor,
                engine,
                dispatcher,
                background: Mutex::new(Background::default()),
            }),
        })
    }

    /// Starts the periodic service probe and automatic sync on every
    /// transition into online. Calling it again is a no-op.
    pub fn start(&self, probe_interval: Duration) {
        let mut bg = self.background();
        if bg.cancel.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        bg.tasks
            .push(self.inner.monitor.spawn(probe_interval, cancel.clone()));
        bg.tasks.push(spawn_auto_sync(
            Arc::clone(&self.inner.engine),
            self.inner.monitor.subscribe(),
            cancel.clone(),
        ));
        bg.cancel = Some(cancel);
        debug!(?probe_interval, "background tasks started");
    }

    /// Starts the real-time channel. A channel that is already running is
    /// stopped first.
    pub fn start_realtime(
        &self,
        config: ChannelConfig,
        transport: Box<dyn Transport>,
    ) -> watch::Receiver<ChannelState> {
        let ctx = ChannelContext {
            dispatcher: Arc::clone(&self.inner.dispatcher),
            remote: Arc::clone(&self.inner.remote),
            monitor: Arc::clone(&self.inner.monitor),
            auth: Arc::clone(&self.inner.auth),
        };
        let handle = realtime::spawn(config, transport, ctx);
        let state = handle.subscribe();
        // Dropping the previous handle cancels its task.
        self.background().channel = Some(handle);
        state
    }

    /// Stops the channel and background tasks and persists the log.
    pub async fn shutdown(&self) {
        let (cancel, tasks, channel) = {
            let mut bg = self.background();
            (bg.cancel.take(), std::mem::take(&mut bg.tasks), bg.channel.take())
        };
        if let Some(channel) = channel {
            channel.disconnect().await;
        }
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        self.inner.replica.with(|r| r.persist_log());
        info!("store shut down");
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.inner.monitor
    }

    // Reads

    /// Every known event, ordered by date.
    pub async fn get_all_events(&self, cancel: &CancellationToken) -> Result<Vec<Event>> {
        let all = EventFilter::default();
        let fetched = self
            .remote_read(cancel, "list events", self.inner.remote.list_events(&all))
            .await?;
        if let Some(events) = fetched {
            self.inner.replica.with(|r| {
                let overlay = r.log.overlay();
                r.cache.replace_remote(events, &overlay);
            });
        }
        Ok(self.inner.replica.read(|r| r.cache.get_all()))
    }

    /// The event with `id`, or `None` if neither the service nor the cache
    /// knows it. Provisional ids are answered from the cache alone.
    pub async fn get_event_by_id(
        &self,
        id: &EventId,
        cancel: &CancellationToken,
    ) -> Result<Option<Event>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if !id.is_provisional() {
            match self
                .fetch(cancel, "get event", self.inner.remote.get_event(id))
                .await?
            {
                Some(Ok(event)) => {
                    self.inner.replica.with(|r| r.accept_remote(event));
                }
                Some(Err(e)) if e.is_not_found() => self.inner.replica.with(|r| {
                    if !r.log.has_pending_for(id) && r.cache.remove(id).is_some() {
                        debug!(%id, "evicted event the service no longer has");
                    }
                }),
                Some(Err(e)) => warn!(%id, error = %e, "remote read failed, serving from cache"),
                None => {}
            }
        }
        Ok(self.inner.replica.read(|r| r.cache.get_by_id(id)))
    }

    /// Events matching `filter`, with unsynced local changes applied.
    pub async fn filter_events(
        &self,
        filter: &EventFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Event>> {
        let fetched = self
            .remote_read(cancel, "filter events", self.inner.remote.list_events(filter))
            .await?;
        let view = match fetched {
            Some(events) => self.inner.replica.with(|r| {
                let overlay = r.log.overlay();
                r.cache.merge_remote(events.clone(), &overlay);
                r.cache.overlay_view(events, &overlay, filter)
            }),
            None => self.inner.replica.read(|r| filter.apply(r.cache.get_all())),
        };
        Ok(view)
    }

    /// Case-insensitive search over title, description, location and
    /// category.
    pub async fn search_events(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Event>> {
        self.filter_events(&EventFilter::search(query), cancel).await
    }

    /// One page of events matching `filter`.
    pub async fn get_paginated_events(
        &self,
        filter: &EventFilter,
        page: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<Event>> {
        let fetched = self
            .remote_read(
                cancel,
                "list event page",
                self.inner.remote.list_events_page(filter, page),
            )
            .await?;
        let page = match fetched {
            Some(remote) => self.inner.replica.with(|r| {
                let overlay = r.log.overlay();
                r.cache.merge_remote(remote.items.clone(), &overlay);
                Page {
                    items: r.cache.overlay_items(remote.items, &overlay, filter),
                    info: remote.info,
                }
            }),
            None => self
                .inner
                .replica
                .read(|r| paginate(filter.apply(r.cache.get_all()), page)),
        };
        Ok(page)
    }

    /// Events created by the current user.
    pub async fn get_owned_events(&self, cancel: &CancellationToken) -> Result<Vec<Event>> {
        let user = self.require_user()?;
        let fetched = self
            .remote_read(cancel, "owned events", self.inner.remote.owned_events(&user))
            .await?;
        if let Some(events) = fetched {
            self.inner.replica.with(|r| {
                let overlay = r.log.overlay();
                r.cache.merge_remote(events, &overlay);
            });
        }
        Ok(self.inner.replica.read(|r| r.cache.get_owned_by_user(&user)))
    }

    /// Events the current user is interested in.
    pub async fn get_interested_events(&self, cancel: &CancellationToken) -> Result<Vec<Event>> {
        let user = self.require_user()?;
        let fetched = self
            .remote_read(
                cancel,
                "interested events",
                self.inner.remote.interested_events(&user),
            )
            .await?;
        if let Some(events) = fetched {
            self.inner.replica.with(|r| {
                let overlay = r.log.overlay();
                let pending = r.log.user_overlay(&user).pending_interests;
                let ids = events.iter().map(|e| e.id.clone()).collect();
                r.cache.merge_remote(events, &overlay);
                r.cache.reconcile_interests(&user, ids, &pending);
            });
        }
        Ok(self
            .inner
            .replica
            .read(|r| r.cache.get_interested_by_user(&user)))
    }

    /// The profile of `user_id`, or `None` if it is not known.
    pub async fn get_user_profile(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<User>> {
        let fetched = self
            .remote_read(cancel, "get user", self.inner.remote.get_user(user_id))
            .await?;
        if let Some(user) = fetched {
            self.inner.replica.with(|r| {
                let pending = r.log.user_overlay(user_id);
                r.cache.merge_user(user, &pending);
            });
        }
        Ok(self.inner.replica.read(|r| r.cache.user(user_id)))
    }

    // Writes

    /// Creates an event owned by the current user. The event is readable
    /// under its provisional id as soon as this returns.
    pub async fn create_event(&self, draft: EventDraft) -> Result<WriteReceipt> {
        let user = self.require_user()?;
        let id = EventId::provisional();
        let event = draft.into_event(id.clone(), Some(user))?;
        let op = self.inner.replica.with(|r| -> Result<OperationId> {
            let op = r.log.enqueue(OpPayload::CreateEvent {
                event: event.clone(),
            })?;
            r.cache.upsert(event);
            Ok(op)
        })?;
        info!(%id, "event created locally");
        Ok(self.after_write(Staged::Queued(op), id.into_string()).await)
    }

    pub async fn update_event(&self, id: &EventId, patch: EventPatch) -> Result<WriteReceipt> {
        check_patch(&patch)?;
        if patch.is_empty() {
            return Ok(self.after_write(Staged::Unchanged, id.to_string()).await);
        }
        let op = self.inner.replica.with(|r| -> Result<OperationId> {
            let mut event = r
                .cache
                .get_by_id(id)
                .ok_or_else(|| Error::EventNotFound(id.to_string()))?;
            patch.apply(&mut event);
            check_event(&event)?;
            let op = r.log.enqueue(OpPayload::UpdateEvent {
                event_id: id.clone(),
                patch,
            })?;
            r.cache.upsert(event);
            Ok(op)
        })?;
        Ok(self.after_write(Staged::Queued(op), id.to_string()).await)
    }

    /// Deletes an event. Deleting an event whose create never synced drops
    /// its pending entries instead of queuing a delete.
    pub async fn delete_event(&self, id: &EventId) -> Result<WriteReceipt> {
        let staged = self.inner.replica.with(|r| -> Result<Staged> {
            if !r.cache.contains(id) && !r.log.has_pending_for(id) {
                return Err(Error::EventNotFound(id.to_string()));
            }
            if id.is_provisional() {
                if let Some(dropped) = r.log.cancel_provisional(id)? {
                    r.cache.remove(id);
                    debug!(%id, dropped, "dropped unsynced event");
                    return Ok(Staged::Coalesced);
                }
            }
            let op = r.log.enqueue(OpPayload::DeleteEvent {
                event_id: id.clone(),
            })?;
            let dropped = r.log.cancel_interest_ops(id)?;
            if dropped > 0 {
                debug!(%id, dropped, "dropped interest changes for deleted event");
            }
            r.cache.remove(id);
            Ok(Staged::Queued(op))
        })?;
        Ok(self.after_write(staged, id.to_string()).await)
    }

    /// Marks the current user as interested in `event_id`. Idempotent.
    pub async fn add_interest(&self, event_id: &EventId) -> Result<WriteReceipt> {
        let user = self.require_user()?;
        let payload = OpPayload::AddInterest {
            user_id: user.clone(),
            event_id: event_id.clone(),
        };
        payload.validate()?;
        let staged = self.inner.replica.with(|r| -> Result<Staged> {
            if r.cache.has_interest(&user, event_id) {
                return Ok(Staged::Unchanged);
            }
            let staged = if r.log.cancel_inverse(&payload)? {
                Staged::Coalesced
            } else {
                Staged::Queued(r.log.enqueue(payload)?)
            };
            r.cache.set_interest_relation(&user, event_id);
            Ok(staged)
        })?;
        Ok(self.after_write(staged, event_id.to_string()).await)
    }

    /// Clears the current user's interest in `event_id`. Removing an
    /// interest that is not set queues nothing.
    pub async fn remove_interest(&self, event_id: &EventId) -> Result<WriteReceipt> {
        let user = self.require_user()?;
        let payload = OpPayload::RemoveInterest {
            user_id: user.clone(),
            event_id: event_id.clone(),
        };
        payload.validate()?;
        let staged = self.inner.replica.with(|r| -> Result<Staged> {
            if !r.cache.has_interest(&user, event_id) {
                return Ok(Staged::Unchanged);
            }
            let staged = if r.log.cancel_inverse(&payload)? {
                Staged::Coalesced
            } else {
                Staged::Queued(r.log.enqueue(payload)?)
            };
            r.cache.clear_interest_relation(&user, event_id);
            Ok(staged)
        })?;
        Ok(self.after_write(staged, event_id.to_string()).await)
    }

    pub async fn update_user_profile(&self, patch: UserPatch) -> Result<WriteReceipt> {
        let user = self.require_user()?;
        check_user_patch(&patch)?;
        let op = self.inner.replica.with(|r| -> Result<OperationId> {
            let mut profile = r
                .cache
                .user(&user)
                .unwrap_or_else(|| User::placeholder(user.as_str()));
            patch.apply(&mut profile);
            let op = r.log.enqueue(OpPayload::UpdateUser {
                user_id: user.clone(),
                patch,
            })?;
            r.cache.put_user(profile);
            Ok(op)
        })?;
        Ok(self.after_write(Staged::Queued(op), user).await)
    }

    /// Uploads a file. Needs a live connection.
    pub async fn upload_file(&self, file: FileUpload) -> Result<StoredFile> {
        let status = self.connection_status();
        if !status.is_online() {
            return Err(Error::Offline(status.to_string()));
        }
        Ok(self.inner.remote.upload_file(file).await?)
    }

    // Sync and status

    /// Re-probes the service, drains the log and reloads the event list.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        self.inner.monitor.check_service().await;
        let report = self.inner.engine.sync().await;
        self.get_all_events(cancel).await?;
        Ok(report)
    }

    pub async fn sync(&self) -> SyncReport {
        self.inner.engine.sync().await
    }

    pub fn connection_status(&self) -> ConnectivityStatus {
        self.inner.monitor.status()
    }

    pub fn pending_operation_count(&self) -> usize {
        self.inner.replica.read(|r| r.log.unsynced_len())
    }

    /// Unsynced entries in the order the next pass sends them.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        in_send_order(self.inner.replica.read(|r| r.log.list_unsynced()))
    }

    pub fn last_sync_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.inner.engine.last_sync_time()
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.engine.is_syncing()
    }

    pub fn categories(&self) -> &'static [&'static str] {
        CATEGORIES
    }

    // Real-time listeners

    pub fn on(&self, kind: MessageKind, listener: Listener) -> ListenerId {
        self.inner.dispatcher.on(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.dispatcher.off(id)
    }

    /// Feeds a message through the dispatch path as if the channel had
    /// delivered it.
    pub fn dispatch(&self, msg: &ChannelMessage) -> usize {
        self.inner.dispatcher.dispatch(msg)
    }

    // Helpers

    fn background(&self) -> std::sync::MutexGuard<'_, Background> {
        self.inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn require_user(&self) -> Result<String> {
        self.inner
            .auth
            .current_user_id()
            .ok_or(Error::NotAuthenticated)
    }

    /// Runs a remote read. `Ok(None)` means the service is not online.
    async fn fetch<T>(
        &self,
        cancel: &CancellationToken,
        what: &'static str,
        call: RemoteFuture<'_, T>,
    ) -> Result<Option<RemoteResult<T>>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let status = self.inner.monitor.status();
        if !status.is_online() {
            debug!(%status, what, "serving from cache");
            return Ok(None);
        }
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            r = call => r,
        };
        match result {
            Err(RemoteError::Cancelled) => Err(Error::Cancelled),
            r => Ok(Some(r)),
        }
    }

    /// Like [`OfflineStore::fetch`], with remote failures logged and turned
    /// into a cache fallback.
    async fn remote_read<T>(
        &self,
        cancel: &CancellationToken,
        what: &'static str,
        call: RemoteFuture<'_, T>,
    ) -> Result<Option<T>> {
        match self.fetch(cancel, what, call).await? {
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(e)) => {
                warn!(what, error = %e, "remote read failed, serving from cache");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Tries to sync a staged write and reports where it ended up.
    async fn after_write(&self, staged: Staged, id: String) -> WriteReceipt {
        let op = match staged {
            Staged::Queued(op) => op,
            Staged::Unchanged => {
                return WriteReceipt {
                    id,
                    status: WriteStatus::Unchanged,
                }
            }
            Staged::Coalesced => {
                return WriteReceipt {
                    id,
                    status: WriteStatus::Coalesced,
                }
            }
        };
        let report = self.inner.engine.sync().await;
        let id = report
            .confirmed_id(&EventId::new(id.as_str()))
            .map(|confirmed| confirmed.to_string())
            .unwrap_or(id);
        let status = self.inner.replica.read(|r| match r.log.get(&op) {
            Some(entry) if !entry.synced => WriteStatus::SavedLocally {
                last_error: entry.last_error.clone(),
            },
            _ => WriteStatus::Confirmed,
        });
        WriteReceipt { id, status }
    }
}

/// Keeps the cache current with pushed and polled changes.
fn install_cache_sink(dispatcher: &Dispatcher, replica: &SharedReplica) {
    for kind in [MessageKind::EventCreated, MessageKind::EventUpdated] {
        let replica = replica.clone();
        dispatcher.on(
            kind,
            Arc::new(move |msg: &ChannelMessage| match msg {
                ChannelMessage::EventCreated { event } | ChannelMessage::EventUpdated { event } => {
                    absorb_pushed(&replica, event);
                }
                _ => {}
            }),
        );
    }
    let replica = replica.clone();
    dispatcher.on(
        MessageKind::EventDeleted,
        Arc::new(move |msg: &ChannelMessage| {
            if let ChannelMessage::EventDeleted { id } = msg {
                let id = EventId::new(id.as_str());
                replica.with(|r| {
                    if r.log.has_pending_for(&id) {
                        debug!(%id, "ignoring pushed delete for event with pending changes");
                    } else if r.cache.remove(&id).is_some() {
                        debug!(%id, "removed event deleted elsewhere");
                    }
                });
            }
        }),
    );
}

fn absorb_pushed(replica: &SharedReplica, wire: &WireEvent) {
    match to_domain_format(wire.clone()) {
        Ok(event) => {
            let id = event.id.clone();
            if replica.with(|r| r.accept_remote(event)) {
                debug!(%id, "applied pushed event");
            }
        }
        Err(e) => warn!(error = %e, "ignoring undecodable pushed event"),
    }
}

/// Syncs whenever the status turns online, and once at start if it already
/// is.
fn spawn_auto_sync(
    engine: Arc<SyncEngine>,
    mut status: watch::Receiver<ConnectivityStatus>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut was_online = false;
        loop {
            let now = *status.borrow_and_update();
            if now.is_online() && !was_online {
                info!("service online, syncing");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = engine.sync() => {}
                }
            }
            was_online = now.is_online();
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = status.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
