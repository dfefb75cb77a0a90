// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! evsync-core: Shared data layer for the evsync offline-first client
//!
//! This crate holds the pure, I/O-free pieces of the sync engine: the domain
//! model, the pending-operation log entries, the wire schema and the
//! transform between the two, the real-time message protocol, and the
//! validation rules applied before anything is queued.

pub mod clock;
pub mod error;
pub mod model;
pub mod op;
pub mod protocol;
pub mod query;
pub mod validate;
pub mod wire;

pub use clock::{ClockSource, OpClock, SystemClock};
pub use error::{Error, Result};
pub use model::{
    Event, EventDraft, EventId, EventPatch, InterestPair, StoredFile, User, UserId, UserPatch,
};
pub use op::{OpPayload, OperationId, OperationKind, PendingOperation, ResourceKind};
pub use protocol::{ChannelMessage, MessageKind};
pub use query::{EventFilter, Page, PageInfo, PageRequest, Sort, SortKey, SortOrder};
pub use wire::{to_domain_format, to_wire_format, WireEvent, WireEventPatch, WirePage, WireUser};
