// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::sync::atomic::AtomicUsize;
use tokio::sync::Notify;
use yare::parameterized;

#[derive(Default)]
struct StubProbe {
    up: AtomicBool,
    calls: AtomicUsize,
    gate: Option<Notify>,
}

impl StubProbe {
    fn up(up: bool) -> Arc<Self> {
        Arc::new(StubProbe {
            up: AtomicBool::new(up),
            ..Default::default()
        })
    }

    fn gated() -> Arc<Self> {
        Arc::new(StubProbe {
            up: AtomicBool::new(true),
            gate: Some(Notify::new()),
            ..Default::default()
        })
    }
}

impl ServiceProbe for StubProbe {
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.up.load(Ordering::SeqCst)
        })
    }
}

#[parameterized(
    offline_and_down = { false, false, ConnectivityStatus::Offline },
    offline_dominates = { false, true, ConnectivityStatus::Offline },
    server_down = { true, false, ConnectivityStatus::ServerDown },
    online = { true, true, ConnectivityStatus::Online },
)]
fn status_derivation(device: bool, service: bool, expected: ConnectivityStatus) {
    assert_eq!(ConnectivityStatus::derive(device, service), expected);
}

#[test]
fn status_serializes_kebab_case() {
    let json = serde_json::to_string(&ConnectivityStatus::ServerDown).unwrap();
    assert_eq!(json, "\"server-down\"");
    assert_eq!(ConnectivityStatus::ServerDown.to_string(), "server-down");
}

#[tokio::test]
async fn starts_server_down_until_probed() {
    let monitor = ConnectivityMonitor::new(StubProbe::up(true), true);
    assert_eq!(monitor.status(), ConnectivityStatus::ServerDown);
    assert_eq!(monitor.last_checked(), None);
    assert_eq!(monitor.check_service().await, Some(true));
    assert_eq!(monitor.status(), ConnectivityStatus::Online);
    assert!(monitor.last_checked().is_some());
}

#[tokio::test]
async fn failed_probe_marks_service_down_and_records_time() {
    let monitor = ConnectivityMonitor::new(StubProbe::up(false), true);
    monitor.set_service_reachable(true);
    assert_eq!(monitor.check_service().await, Some(false));
    assert_eq!(monitor.status(), ConnectivityStatus::ServerDown);
    assert!(monitor.last_checked().is_some());
}

#[tokio::test]
async fn regaining_network_probes_immediately() {
    let probe = StubProbe::up(true);
    let monitor = ConnectivityMonitor::new(Arc::clone(&probe) as Arc<dyn ServiceProbe>, false);
    assert_eq!(monitor.status(), ConnectivityStatus::Offline);

    monitor.set_device_online(true).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(monitor.status(), ConnectivityStatus::Online);

    // Going offline again does not probe.
    monitor.set_device_online(false).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(monitor.status(), ConnectivityStatus::Offline);
}

#[tokio::test]
async fn concurrent_probe_is_suppressed() {
    let probe = StubProbe::gated();
    let monitor = Arc::new(ConnectivityMonitor::new(
        Arc::clone(&probe) as Arc<dyn ServiceProbe>,
        true,
    ));
    let first = {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move { monitor.check_service().await })
    };
    tokio::task::yield_now().await;

    assert_eq!(monitor.check_service().await, None);
    probe.gate.as_ref().unwrap().notify_one();
    assert_eq!(first.await.unwrap(), Some(true));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

    // The flag is released once the probe finishes.
    probe.gate.as_ref().unwrap().notify_one();
    assert_eq!(monitor.check_service().await, Some(true));
}

#[tokio::test]
async fn subscribers_see_transitions() {
    let monitor = ConnectivityMonitor::new(StubProbe::up(true), true);
    let mut rx = monitor.subscribe();
    assert_eq!(*rx.borrow(), ConnectivityStatus::ServerDown);

    monitor.check_service().await;
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), ConnectivityStatus::Online);

    // Re-publishing the same status is not a change.
    monitor.set_service_reachable(true);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn spawned_loop_probes_periodically() {
    let probe = StubProbe::up(true);
    let monitor = Arc::new(ConnectivityMonitor::new(
        Arc::clone(&probe) as Arc<dyn ServiceProbe>,
        true,
    ));
    let cancel = CancellationToken::new();
    let handle = monitor.spawn(Duration::from_secs(30), cancel.clone());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

    cancel.cancel();
    handle.await.unwrap();
}
