// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for unit tests: sample events, a controllable clock, an
//! in-memory remote service and a scripted socket transport.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::{mpsc, Notify};

use evsync_core::query::paginate;
use evsync_core::{
    to_wire_format, ClockSource, Event, EventFilter, EventId, EventPatch, Page, PageRequest,
    StoredFile, User, UserPatch, WireEvent,
};

use crate::auth::StaticAuth;
use crate::realtime::{Transport, TransportError, TransportResult};
use crate::remote::{FileUpload, RemoteError, RemoteFuture, RemoteResult, RemoteService};
use crate::storage::MemoryStore;
use crate::store::{OfflineStore, StoreDeps};

/// A valid event on day `day` of March 2026.
pub fn event(id: &str, category: &str, day: u32) -> Event {
    Event {
        id: id.into(),
        title: format!("Event {id}"),
        description: format!("About {id}"),
        date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
        start_time: NaiveTime::from_hms_opt(18, 0, 0),
        end_time: NaiveTime::from_hms_opt(20, 0, 0),
        location: "Hall".into(),
        category: category.into(),
        is_online: false,
        image: None,
        created_by: None,
    }
}

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct FixedClock(Arc<AtomicU64>);

impl FixedClock {
    pub fn at(ms: u64) -> Self {
        FixedClock(Arc::new(AtomicU64::new(ms)))
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl ClockSource for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Server-side state of [`FakeRemote`].
pub struct FakeState {
    pub events: BTreeMap<EventId, Event>,
    pub interests: BTreeSet<(String, EventId)>,
    pub users: BTreeMap<String, User>,
    pub next_id: u64,
    pub reachable: bool,
    /// Returned by every mutating call while set.
    pub reject: Option<RemoteError>,
    /// Every call, in order, as `"<method> <target>"`.
    pub calls: Vec<String>,
    /// Served once by `recent_changes`.
    pub recent: Vec<WireEvent>,
    /// While set, interest writes wait for a notification before running.
    pub gate: Option<Arc<Notify>>,
}

/// In-memory remote service. Confirmed ids start at 42.
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeRemote {
            state: Mutex::new(FakeState {
                events: BTreeMap::new(),
                interests: BTreeSet::new(),
                users: BTreeMap::new(),
                next_id: 42,
                reachable: true,
                reject: None,
                calls: Vec::new(),
                recent: Vec::new(),
                gate: None,
            }),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
    }

    pub fn reject_writes(&self, error: Option<RemoteError>) {
        self.state().reject = error;
    }

    pub fn insert(&self, event: Event) {
        self.state().events.insert(event.id.clone(), event);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Event ids and titles held by the service, for end-state comparisons.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.state()
            .events
            .values()
            .map(|e| (e.id.to_string(), e.title.clone()))
            .collect()
    }

    async fn pass_gate(&self) {
        let gate = self.state().gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn enter(&self, call: String) -> RemoteResult<MutexGuard<'_, FakeState>> {
        let mut state = self.state();
        state.calls.push(call);
        if !state.reachable {
            return Err(RemoteError::Network("connection refused".into()));
        }
        Ok(state)
    }

    fn enter_write(&self, call: String) -> RemoteResult<MutexGuard<'_, FakeState>> {
        let state = self.enter(call)?;
        if let Some(err) = state.reject.clone() {
            return Err(err);
        }
        Ok(state)
    }
}

fn reject_provisional(id: &EventId) -> RemoteResult<()> {
    if id.is_provisional() {
        return Err(RemoteError::Status {
            code: 400,
            message: format!("unknown id {id}"),
        });
    }
    Ok(())
}

impl RemoteService for FakeRemote {
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.state().reachable })
    }

    fn list_events<'a>(&'a self, filter: &'a EventFilter) -> RemoteFuture<'a, Vec<Event>> {
        Box::pin(async move {
            let state = self.enter("list_events".into())?;
            Ok(filter.apply(state.events.values().cloned()))
        })
    }

    fn list_events_page<'a>(
        &'a self,
        filter: &'a EventFilter,
        page: PageRequest,
    ) -> RemoteFuture<'a, Page<Event>> {
        Box::pin(async move {
            let state = self.enter(format!("list_events_page {}", page.page))?;
            Ok(paginate(filter.apply(state.events.values().cloned()), page))
        })
    }

    fn get_event<'a>(&'a self, id: &'a EventId) -> RemoteFuture<'a, Event> {
        Box::pin(async move {
            let state = self.enter(format!("get_event {id}"))?;
            state.events.get(id).cloned().ok_or(RemoteError::NotFound)
        })
    }

    fn create_event<'a>(&'a self, event: &'a Event) -> RemoteFuture<'a, Event> {
        Box::pin(async move {
            let mut state = self.enter_write(format!("create_event {}", event.title))?;
            let mut created = event.clone();
            created.id = EventId::new(state.next_id.to_string());
            state.next_id += 1;
            state.events.insert(created.id.clone(), created.clone());
            Ok(created)
        })
    }

    fn update_event<'a>(
        &'a self,
        id: &'a EventId,
        patch: &'a EventPatch,
    ) -> RemoteFuture<'a, Event> {
        Box::pin(async move {
            let mut state = self.enter_write(format!("update_event {id}"))?;
            reject_provisional(id)?;
            let event = state.events.get_mut(id).ok_or(RemoteError::NotFound)?;
            patch.apply(event);
            Ok(event.clone())
        })
    }

    fn delete_event<'a>(&'a self, id: &'a EventId) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.enter_write(format!("delete_event {id}"))?;
            reject_provisional(id)?;
            state.events.remove(id).ok_or(RemoteError::NotFound)?;
            state.interests.retain(|(_, e)| e != id);
            Ok(())
        })
    }

    fn owned_events<'a>(&'a self, user_id: &'a str) -> RemoteFuture<'a, Vec<Event>> {
        Box::pin(async move {
            let state = self.enter(format!("owned_events {user_id}"))?;
            Ok(state
                .events
                .values()
                .filter(|e| e.created_by.as_deref() == Some(user_id))
                .cloned()
                .collect())
        })
    }

    fn interested_events<'a>(&'a self, user_id: &'a str) -> RemoteFuture<'a, Vec<Event>> {
        Box::pin(async move {
            let state = self.enter(format!("interested_events {user_id}"))?;
            Ok(state
                .interests
                .iter()
                .filter(|(u, _)| u == user_id)
                .filter_map(|(_, e)| state.events.get(e).cloned())
                .collect())
        })
    }

    fn add_interest<'a>(
        &'a self,
        user_id: &'a str,
        event_id: &'a EventId,
    ) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            self.pass_gate().await;
            let mut state = self.enter_write(format!("add_interest {user_id} {event_id}"))?;
            reject_provisional(event_id)?;
            if !state.events.contains_key(event_id) {
                return Err(RemoteError::NotFound);
            }
            state.interests.insert((user_id.to_string(), event_id.clone()));
            Ok(())
        })
    }

    fn remove_interest<'a>(
        &'a self,
        user_id: &'a str,
        event_id: &'a EventId,
    ) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            self.pass_gate().await;
            let mut state = self.enter_write(format!("remove_interest {user_id} {event_id}"))?;
            reject_provisional(event_id)?;
            if state.interests.remove(&(user_id.to_string(), event_id.clone())) {
                Ok(())
            } else {
                Err(RemoteError::NotFound)
            }
        })
    }

    fn get_user<'a>(&'a self, user_id: &'a str) -> RemoteFuture<'a, User> {
        Box::pin(async move {
            let state = self.enter(format!("get_user {user_id}"))?;
            let mut user = state.users.get(user_id).cloned().ok_or(RemoteError::NotFound)?;
            user.interested_events = state
                .interests
                .iter()
                .filter(|(u, _)| u == user_id)
                .map(|(_, e)| e.clone())
                .collect();
            Ok(user)
        })
    }

    fn update_user<'a>(&'a self, user_id: &'a str, patch: &'a UserPatch) -> RemoteFuture<'a, User> {
        Box::pin(async move {
            let mut state = self.enter_write(format!("update_user {user_id}"))?;
            let user = state
                .users
                .entry(user_id.to_string())
                .or_insert_with(|| User::placeholder(user_id));
            patch.apply(user);
            Ok(user.clone())
        })
    }

    fn upload_file(&self, file: FileUpload) -> RemoteFuture<'_, StoredFile> {
        Box::pin(async move {
            let _state = self.enter_write(format!("upload_file {}", file.file_name))?;
            Ok(StoredFile {
                file_url: format!("https://files.test/{}", file.file_name),
                file_size: file.bytes.len() as u64,
                file_type: file.content_type,
                file_name: file.file_name,
            })
        })
    }

    fn recent_changes(&self, _since: DateTime<Utc>) -> RemoteFuture<'_, Vec<WireEvent>> {
        Box::pin(async move {
            let mut state = self.enter("recent_changes".into())?;
            Ok(std::mem::take(&mut state.recent))
        })
    }
}

/// Queues `event` to be served by the next `recent_changes` call.
pub fn push_recent(remote: &FakeRemote, event: &Event) {
    remote.state().recent.push(to_wire_format(event));
}

/// Opens a store over fresh in-memory storage. With `online`, the service
/// is probed so the status starts out online.
pub async fn make_store(remote: Arc<FakeRemote>, online: bool) -> (OfflineStore, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let store = open_store(Arc::clone(&remote), Arc::clone(&storage), online).await;
    (store, storage)
}

/// Opens a store over existing storage, as after a restart.
pub async fn open_store(
    remote: Arc<FakeRemote>,
    storage: Arc<MemoryStore>,
    online: bool,
) -> OfflineStore {
    let deps = StoreDeps {
        storage,
        remote,
        auth: Arc::new(StaticAuth::user("u1")),
        clock: Arc::new(FixedClock::at(1_000)),
        device_online: online,
    };
    let store = OfflineStore::open(deps).unwrap();
    if online {
        store.monitor().check_service().await;
    }
    store
}

/// One scripted frame for [`MockTransport`].
pub enum Frame {
    Text(String),
    Close,
}

/// Shared controls for a [`MockTransport`] handed to the channel.
#[derive(Clone)]
pub struct MockControl {
    tx: mpsc::UnboundedSender<Frame>,
    pub connects: Arc<AtomicU32>,
    /// Number of upcoming connects that fail.
    pub fail_connects: Arc<AtomicU32>,
    pub tokens: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockControl {
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.tx.send(Frame::Text(text.into()));
    }

    pub fn close(&self) {
        let _ = self.tx.send(Frame::Close);
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

/// Socket transport fed from a channel instead of a network.
pub struct MockTransport {
    frames: mpsc::UnboundedReceiver<Frame>,
    connected: bool,
    control: MockControl,
}

impl MockTransport {
    pub fn new() -> (Self, MockControl) {
        let (tx, frames) = mpsc::unbounded_channel();
        let control = MockControl {
            tx,
            connects: Arc::new(AtomicU32::new(0)),
            fail_connects: Arc::new(AtomicU32::new(0)),
            tokens: Arc::new(Mutex::new(Vec::new())),
        };
        (
            MockTransport {
                frames,
                connected: false,
                control: control.clone(),
            },
            control,
        )
    }
}

impl Transport for MockTransport {
    fn connect<'a>(
        &'a mut self,
        _url: &'a str,
        token: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + 'a>> {
        Box::pin(async move {
            self.control.connects.fetch_add(1, Ordering::SeqCst);
            self.control
                .tokens
                .lock()
                .unwrap()
                .push(token.map(str::to_string));
            let failing = self
                .control
                .fail_connects
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(TransportError::ConnectionFailed("mock refused".into()));
            }
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn recv(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<Option<String>>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            match self.frames.recv().await {
                Some(Frame::Text(text)) => Ok(Some(text)),
                Some(Frame::Close) | None => {
                    self.connected = false;
                    Ok(None)
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
