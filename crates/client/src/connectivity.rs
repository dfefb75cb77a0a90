// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tri-state connectivity: device network and remote service reachability.
//!
//! The two inputs are tracked separately. The device flag is driven by the
//! host (`set_device_online`); the service flag by a liveness probe that runs
//! periodically and immediately whenever the device comes back online.
//! Status changes are published on a `watch` channel.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectivityStatus {
    Offline,
    ServerDown,
    Online,
}

impl ConnectivityStatus {
    /// Offline dominates server-down, which dominates online.
    pub fn derive(device_online: bool, service_reachable: bool) -> Self {
        match (device_online, service_reachable) {
            (false, _) => ConnectivityStatus::Offline,
            (true, false) => ConnectivityStatus::ServerDown,
            (true, true) => ConnectivityStatus::Online,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityStatus::Offline => "offline",
            ConnectivityStatus::ServerDown => "server-down",
            ConnectivityStatus::Online => "online",
        }
    }

    pub fn is_online(&self) -> bool {
        *self == ConnectivityStatus::Online
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cheap liveness check against the remote service.
pub trait ServiceProbe: Send + Sync {
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Clears the in-flight flag when a probe finishes or is dropped.
struct ProbeGuard<'a>(&'a AtomicBool);

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ConnectivityMonitor {
    probe: Arc<dyn ServiceProbe>,
    device_online: AtomicBool,
    service_reachable: AtomicBool,
    probing: AtomicBool,
    last_checked: Mutex<Option<DateTime<Utc>>>,
    status_tx: watch::Sender<ConnectivityStatus>,
}

impl ConnectivityMonitor {
    /// Creates a monitor. The service counts as unreachable until the first
    /// probe succeeds.
    pub fn new(probe: Arc<dyn ServiceProbe>, device_online: bool) -> Self {
        let (status_tx, _) = watch::channel(ConnectivityStatus::derive(device_online, false));
        ConnectivityMonitor {
            probe,
            device_online: AtomicBool::new(device_online),
            service_reachable: AtomicBool::new(false),
            probing: AtomicBool::new(false),
            last_checked: Mutex::new(None),
            status_tx,
        }
    }

    pub fn is_online(&self) -> bool {
        self.device_online.load(Ordering::Acquire)
    }

    pub fn is_service_reachable(&self) -> bool {
        self.service_reachable.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ConnectivityStatus {
        ConnectivityStatus::derive(self.is_online(), self.is_service_reachable())
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status_tx.subscribe()
    }

    /// When the last probe finished, whatever its outcome.
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        *self
            .last_checked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the device network state. Coming back online probes the
    /// service right away.
    pub async fn set_device_online(&self, online: bool) {
        let was = self.device_online.swap(online, Ordering::AcqRel);
        self.publish();
        if online && !was {
            info!("device back online, probing service");
            self.check_service().await;
        } else if !online && was {
            info!("device went offline");
        }
    }

    pub fn set_service_reachable(&self, reachable: bool) {
        self.service_reachable.store(reachable, Ordering::Release);
        self.publish();
    }

    /// Probes the service and records the outcome.
    ///
    /// Returns `None` without probing if another probe is in flight.
    pub async fn check_service(&self) -> Option<bool> {
        if self
            .probing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("probe already in flight, skipping");
            return None;
        }
        let _guard = ProbeGuard(&self.probing);
        let reachable = self.probe.probe().await;
        *self
            .last_checked
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        self.set_service_reachable(reachable);
        Some(reachable)
    }

    fn publish(&self) {
        let status = self.status();
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            info!(%status, "connectivity changed");
        }
    }

    /// Probes now and then every `interval` until `cancel` fires.
    pub fn spawn(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = monitor.check_service() => {}
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
