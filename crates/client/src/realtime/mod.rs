// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Real-time change feed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   frames    ┌────────────┐   ChannelMessage   ┌───────────┐
//! │  Transport   │ ──────────► │  channel   │ ─────────────────► │ Dispatcher│──► listeners
//! │ (websocket)  │             │   task     │                    └───────────┘
//! └──────────────┘             │            │        ▲
//!                              │  polling   │ ───────┘ recent changes as event-created
//!          RemoteService ────► │  fallback  │
//!                              └────────────┘
//! ```
//!
//! The channel task owns reconnection (see [`state`]) and falls back to
//! polling once the socket gives up in `auto` mode.

mod channel;
mod dispatch;
mod state;
mod transport;

pub use channel::{spawn, ChannelConfig, ChannelContext, ChannelHandle, ChannelMode};
pub use dispatch::{Dispatcher, Listener, ListenerId};
pub use state::{transition, Backoff, ChannelEvent, ChannelState, ReconnectPolicy};
pub use transport::{with_token, Transport, TransportError, TransportResult, WebSocketTransport};
