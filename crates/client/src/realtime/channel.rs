// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background task driving the real-time channel.
//!
//! The task owns the transport and all timers. Cancelling its token (via
//! [`ChannelHandle::disconnect`]) stops a pending reconnect sleep, an
//! in-flight connect, and the polling interval alike.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use evsync_core::protocol;

use super::dispatch::Dispatcher;
use super::state::{transition, ChannelEvent, ChannelState, ReconnectPolicy};
use super::transport::Transport;
use crate::auth::AuthProvider;
use crate::connectivity::ConnectivityMonitor;
use crate::remote::RemoteService;

/// Which feed the channel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Socket first, polling once reconnects are exhausted.
    #[default]
    Auto,
    Socket,
    Polling,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Socket URL. Without one, `Auto` goes straight to polling.
    pub url: Option<String>,
    pub mode: ChannelMode,
    pub policy: ReconnectPolicy,
    pub poll_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            url: None,
            mode: ChannelMode::Auto,
            policy: ReconnectPolicy::default(),
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Collaborators the channel task needs.
#[derive(Clone)]
pub struct ChannelContext {
    pub dispatcher: Arc<Dispatcher>,
    pub remote: Arc<dyn RemoteService>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub auth: Arc<dyn AuthProvider>,
}

pub struct ChannelHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ChannelState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelHandle {
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Stops the channel and waits for the task to finish. Idempotent.
    pub async fn disconnect(&self) {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "channel task ended abnormally");
            }
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Starts the channel task.
pub fn spawn(config: ChannelConfig, transport: Box<dyn Transport>, ctx: ChannelContext) -> ChannelHandle {
    let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
    let cancel = CancellationToken::new();
    let driver = Driver {
        state: ChannelState::Disconnected,
        tx: state_tx,
        policy: config.policy,
    };
    let task = tokio::spawn(run(config, transport, ctx, driver, cancel.clone()));
    ChannelHandle {
        cancel,
        state: state_rx,
        task: Mutex::new(Some(task)),
    }
}

/// Applies events to the state machine and publishes the result.
struct Driver {
    state: ChannelState,
    tx: watch::Sender<ChannelState>,
    policy: ReconnectPolicy,
}

impl Driver {
    fn apply(&mut self, event: ChannelEvent) -> ChannelState {
        let next = transition(self.state, event, &self.policy);
        if next != self.state {
            info!(from = %self.state, to = %next, "channel state changed");
            self.state = next;
            self.tx.send_replace(next);
        }
        next
    }
}

async fn run(
    config: ChannelConfig,
    mut transport: Box<dyn Transport>,
    ctx: ChannelContext,
    mut driver: Driver,
    cancel: CancellationToken,
) {
    let socket_url = config
        .url
        .as_deref()
        .filter(|_| config.mode != ChannelMode::Polling);

    if let Some(url) = socket_url {
        run_socket(url, transport.as_mut(), &ctx, &mut driver, &cancel).await;
        if cancel.is_cancelled() {
            let _ = transport.disconnect().await;
            driver.apply(ChannelEvent::Disconnect);
            return;
        }
        if config.mode == ChannelMode::Socket {
            warn!("real-time channel gave up reconnecting");
            return;
        }
        warn!("socket unavailable, falling back to polling");
    } else if config.mode == ChannelMode::Socket {
        warn!("socket mode requested without a channel url");
        return;
    }

    driver.apply(ChannelEvent::Poll);
    run_polling(config.poll_interval, &ctx, &cancel).await;
    driver.apply(ChannelEvent::Disconnect);
}

/// What woke the socket loop.
enum Step {
    Cancelled,
    Connected(Result<(), super::TransportError>),
    Frame(super::TransportResult<Option<String>>),
    RetryDue,
}

async fn run_socket(
    url: &str,
    transport: &mut dyn Transport,
    ctx: &ChannelContext,
    driver: &mut Driver,
    cancel: &CancellationToken,
) {
    driver.apply(ChannelEvent::Connect);
    loop {
        let step = match driver.state {
            ChannelState::Connecting { .. } => {
                let token = ctx.auth.access_token();
                tokio::select! {
                    _ = cancel.cancelled() => Step::Cancelled,
                    r = transport.connect(url, token.as_deref()) => Step::Connected(r),
                }
            }
            ChannelState::Connected => {
                tokio::select! {
                    _ = cancel.cancelled() => Step::Cancelled,
                    r = transport.recv() => Step::Frame(r),
                }
            }
            ChannelState::Reconnecting { attempt } => {
                let delay = driver.policy.delay_for(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "waiting to reconnect");
                tokio::select! {
                    _ = cancel.cancelled() => Step::Cancelled,
                    _ = tokio::time::sleep(delay) => Step::RetryDue,
                }
            }
            _ => return,
        };

        match step {
            Step::Cancelled => return,
            Step::Connected(Ok(())) => {
                driver.apply(ChannelEvent::Opened);
            }
            Step::Connected(Err(e)) => {
                warn!(error = %e, "channel connect failed");
                driver.apply(ChannelEvent::Lost);
            }
            Step::Frame(Ok(Some(text))) => {
                ctx.dispatcher.dispatch_text(&text);
            }
            Step::Frame(Ok(None)) => {
                info!("channel closed by server");
                driver.apply(ChannelEvent::Lost);
            }
            Step::Frame(Err(e)) => {
                warn!(error = %e, "channel receive failed");
                let _ = transport.disconnect().await;
                driver.apply(ChannelEvent::Lost);
            }
            Step::RetryDue => {
                driver.apply(ChannelEvent::RetryDue);
            }
        }
    }
}

/// Fetches recent changes every `every` while the service is online and
/// dispatches them as `event-created` messages.
async fn run_polling(every: Duration, ctx: &ChannelContext, cancel: &CancellationToken) {
    let mut since = Utc::now();
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let status = ctx.monitor.status();
        if !status.is_online() {
            debug!(%status, "skipping poll");
            continue;
        }
        let started = Utc::now();
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            r = ctx.remote.recent_changes(since) => r,
        };
        match result {
            Ok(events) => {
                debug!(count = events.len(), "polled recent changes");
                for event in events {
                    ctx.dispatcher.dispatch(&protocol::created(event));
                }
                since = started;
            }
            Err(e) => warn!(error = %e, "polling recent changes failed"),
        }
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
