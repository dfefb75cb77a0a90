// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! evsync - An offline-first client for an event catalog service.
//!
//! Reads are served from a local cache whenever the service is not
//! reachable, and writes are applied optimistically and queued in a durable
//! operation log that drains when connectivity returns.
//!
//! # Main Components
//!
//! - [`OfflineStore`] - The API surface: reads, writes, sync and status
//! - [`ConnectivityMonitor`] - Tri-state connectivity (offline, server-down, online)
//! - [`SyncEngine`] - Drains the operation log and reconciles provisional ids
//! - [`realtime`] - Push channel with reconnect and a polling fallback
//! - [`RemoteService`] - The event service, with an HTTP implementation
//! - [`Config`] - TOML configuration
//!
//! # Usage
//!
//! ```rust,ignore
//! use evsync::{OfflineStore, StoreDeps};
//!
//! let store = OfflineStore::open(deps)?;
//! store.start(config.probe_interval());
//!
//! let receipt = store.create_event(draft).await?;
//! let event = store.get_event_by_id(&EventId::new(receipt.id), &cancel).await?;
//! ```

mod cli;

pub mod auth;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod oplog;
pub mod realtime;
pub mod remote;
pub mod replica;
pub mod request;
pub mod storage;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_helpers;

pub use auth::{AuthProvider, StaticAuth};
pub use cache::{LocalCache, Overlay, UserOverlay};
pub use cli::{open_store, run, Cli, Command};
pub use config::Config;
pub use connectivity::{ConnectivityMonitor, ConnectivityStatus, ServiceProbe};
pub use error::{Error, Result};
pub use oplog::OperationLog;
pub use remote::{FileUpload, HttpRemote, RemoteError, RemoteService};
pub use request::RequestSlot;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use store::{OfflineStore, StoreDeps, WriteReceipt, WriteStatus};
pub use sync::{SkipReason, SyncEngine, SyncReport};
