// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote service abstraction.
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌─────────────┐
//! │ SyncEngine  │────►│ RemoteService │────►│  HTTP API   │
//! │ OfflineStore│◄────│    (trait)    │◄────│             │
//! └─────────────┘     └───────────────┘     └─────────────┘
//! ```
//!
//! The trait speaks domain types. Translation to and from the service's
//! wire shapes lives in the implementation ([`HttpRemote`]), so the sync
//! engine and the tests never see wire structs.

mod http;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use evsync_core::{
    Event, EventFilter, EventId, EventPatch, Page, PageRequest, StoredFile, User, UserPatch,
    WireEvent,
};

pub use http::HttpRemote;

/// Boxed future returned by [`RemoteService`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = RemoteResult<T>> + Send + 'a>>;

/// Error type for remote calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-success status.
    #[error("service returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("not found")]
    NotFound,

    /// The response body did not decode.
    #[error("unreadable response: {0}")]
    Decode(String),

    #[error("request cancelled")]
    Cancelled,
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound)
    }

    /// Network failures and server-side errors are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Network(_) => true,
            RemoteError::Status { code, .. } => *code >= 500 || *code == 408 || *code == 429,
            _ => false,
        }
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// A file to upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The remote event service.
pub trait RemoteService: Send + Sync {
    /// Returns true if the service answers at all.
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;

    /// Every event matching `filter`. Records that fail to decode are
    /// skipped.
    fn list_events<'a>(&'a self, filter: &'a EventFilter) -> RemoteFuture<'a, Vec<Event>>;

    fn list_events_page<'a>(
        &'a self,
        filter: &'a EventFilter,
        page: PageRequest,
    ) -> RemoteFuture<'a, Page<Event>>;

    fn get_event<'a>(&'a self, id: &'a EventId) -> RemoteFuture<'a, Event>;

    /// Creates `event` and returns the server's copy, with its confirmed id.
    fn create_event<'a>(&'a self, event: &'a Event) -> RemoteFuture<'a, Event>;

    fn update_event<'a>(&'a self, id: &'a EventId, patch: &'a EventPatch)
        -> RemoteFuture<'a, Event>;

    fn delete_event<'a>(&'a self, id: &'a EventId) -> RemoteFuture<'a, ()>;

    fn owned_events<'a>(&'a self, user_id: &'a str) -> RemoteFuture<'a, Vec<Event>>;

    fn interested_events<'a>(&'a self, user_id: &'a str) -> RemoteFuture<'a, Vec<Event>>;

    fn add_interest<'a>(&'a self, user_id: &'a str, event_id: &'a EventId)
        -> RemoteFuture<'a, ()>;

    fn remove_interest<'a>(
        &'a self,
        user_id: &'a str,
        event_id: &'a EventId,
    ) -> RemoteFuture<'a, ()>;

    fn get_user<'a>(&'a self, user_id: &'a str) -> RemoteFuture<'a, User>;

    fn update_user<'a>(&'a self, user_id: &'a str, patch: &'a UserPatch) -> RemoteFuture<'a, User>;

    fn upload_file(&self, file: FileUpload) -> RemoteFuture<'_, StoredFile>;

    /// Events created or changed since `since`, in wire form. Used by the
    /// polling fallback of the real-time channel.
    fn recent_changes(&self, since: DateTime<Utc>) -> RemoteFuture<'_, Vec<WireEvent>>;
}

/// Adapts a [`RemoteService`] to the connectivity monitor's probe.
pub struct RemoteProbe(pub Arc<dyn RemoteService>);

impl crate::connectivity::ServiceProbe for RemoteProbe {
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        self.0.probe()
    }
}
