// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync engine: drains the operation log against the remote service.
//!
//! A pass snapshots the unsynced entries, groups them by
//! (resource kind, operation kind) and sends each group in timestamp order.
//! Groups run in a fixed order so creates land before the updates, deletes
//! and interest changes that may reference them. Interest adds and removes
//! share one slot and go out interleaved by timestamp, so the last change to
//! a (user, event) pair is the one the service ends up with.
//!
//! # Reconciliation
//!
//! When an event create is confirmed, its provisional id is rewritten to the
//! server id in the cache and in every remaining log entry before the next
//! entry is sent. Entries that still reference a provisional id (because
//! their create has not been confirmed yet) are deferred, never sent.
//!
//! # Failure handling
//!
//! A failed entry gets its retry count bumped and its error recorded, then
//! the pass moves on. Nothing is dropped: the entry is retried on the next
//! pass. A delete answered with not-found counts as success.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use evsync_core::{
    Event, EventId, OpPayload, OperationId, OperationKind, PendingOperation, ResourceKind, User,
};

use crate::connectivity::{ConnectivityMonitor, ConnectivityStatus};
use crate::remote::{RemoteResult, RemoteService};
use crate::replica::{Replica, SharedReplica};

/// Order in which groups are sent within a pass. The two interest groups
/// share a slot.
pub const GROUP_ORDER: [(ResourceKind, OperationKind); 6] = [
    (ResourceKind::Event, OperationKind::Create),
    (ResourceKind::Event, OperationKind::Update),
    (ResourceKind::Event, OperationKind::Delete),
    (ResourceKind::User, OperationKind::Update),
    (ResourceKind::Interest, OperationKind::Create),
    (ResourceKind::Interest, OperationKind::Delete),
];

/// Why a sync request did not run a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySyncing,
    NotOnline(ConnectivityStatus),
}

/// Outcome of a sync request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries sent to the service.
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    /// Entries held back because they still reference a provisional id.
    pub deferred: usize,
    pub skipped: Option<SkipReason>,
    /// Provisional ids replaced during the pass, as (provisional, confirmed).
    pub confirmed_ids: Vec<(EventId, EventId)>,
}

impl SyncReport {
    fn skipped(reason: SkipReason) -> Self {
        SyncReport {
            skipped: Some(reason),
            ..Default::default()
        }
    }

    /// The confirmed id for `id`, if it was reconciled during this pass.
    pub fn confirmed_id(&self, id: &EventId) -> Option<&EventId> {
        self.confirmed_ids
            .iter()
            .find(|(provisional, _)| provisional == id)
            .map(|(_, confirmed)| confirmed)
    }
}

/// What a successful remote call handed back.
enum Applied {
    Created { provisional: EventId, event: Event },
    Event(Event),
    User(User),
    Done,
}

/// Clears the log's in-flight marker if a send is abandoned mid-call.
struct InFlight<'a> {
    replica: &'a SharedReplica,
    id: OperationId,
}

impl<'a> InFlight<'a> {
    fn mark(replica: &'a SharedReplica, id: &OperationId) -> Self {
        replica.with(|r| r.log.set_in_flight(Some(id.clone())));
        InFlight {
            replica,
            id: id.clone(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.replica.with(|r| r.log.clear_in_flight(&self.id));
    }
}

/// Clears the syncing flag when a pass ends, even if the future is dropped.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    replica: SharedReplica,
    remote: Arc<dyn RemoteService>,
    monitor: Arc<ConnectivityMonitor>,
    syncing: AtomicBool,
    /// Set when a sync is requested while a pass is running.
    rerun: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        replica: SharedReplica,
        remote: Arc<dyn RemoteService>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        SyncEngine {
            replica,
            remote,
            monitor,
            syncing: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.replica.read(|r| r.cache.last_sync())
    }

    /// Runs a sync pass if the service is online and no pass is running.
    ///
    /// A request that arrives during a pass is not lost: the running pass
    /// loops once more before returning.
    pub async fn sync(&self) -> SyncReport {
        let status = self.monitor.status();
        if !status.is_online() {
            debug!(%status, "sync skipped");
            return SyncReport::skipped(SkipReason::NotOnline(status));
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.rerun.store(true, Ordering::Release);
            return SyncReport::skipped(SkipReason::AlreadySyncing);
        }
        let _guard = SyncGuard(&self.syncing);

        let mut report = SyncReport::default();
        loop {
            self.rerun.store(false, Ordering::Release);
            self.run_pass(&mut report).await;
            if !self.rerun.swap(false, Ordering::AcqRel) || !self.monitor.status().is_online() {
                break;
            }
        }
        report
    }

    async fn run_pass(&self, report: &mut SyncReport) {
        let snapshot = self.replica.read(|r| r.log.list_unsynced());
        debug!(pending = snapshot.len(), "sync pass started");

        for op in in_send_order(snapshot) {
            self.process(&op.id, report).await;
        }

        self.replica.with(|r| {
            let purged = r.log.purge_synced();
            r.persist_log();
            r.cache.set_last_sync(Utc::now());
            debug!(purged, "purged synced operations");
        });
        info!(
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            deferred = report.deferred,
            "sync pass finished"
        );
    }

    async fn process(&self, id: &OperationId, report: &mut SyncReport) {
        // Re-read: an earlier entry may have rewritten this one's ids, and a
        // concurrent write may have cancelled it.
        let Some(op) = self
            .replica
            .read(|r| r.log.get(id).filter(|op| !op.synced).cloned())
        else {
            return;
        };

        if let Some(dep) = op.payload.pending_dependency() {
            let msg = format!("waiting for create of {dep}");
            debug!(op = %op.id, %dep, "deferring operation");
            self.replica.with(|r| {
                r.log.mark_failed(&op.id, &msg);
                r.persist_log();
            });
            report.deferred += 1;
            return;
        }

        let _in_flight = InFlight::mark(&self.replica, &op.id);
        report.attempted += 1;
        let result = self.send(&op.payload).await;

        self.replica.with(|r| {
            r.log.clear_in_flight(&op.id);
            match result {
                Ok(applied) => {
                    r.log.mark_synced(&op.id);
                    absorb(r, applied, report);
                    report.synced += 1;
                    debug!(op = %op.id, kind = %op.kind(), resource = %op.resource(), "synced");
                }
                Err(e) if e.is_not_found() && op.kind() == OperationKind::Delete => {
                    r.log.mark_synced(&op.id);
                    report.synced += 1;
                    debug!(op = %op.id, "delete target already gone, treating as synced");
                }
                Err(e) => {
                    r.log.mark_failed(&op.id, &e.to_string());
                    report.failed += 1;
                    warn!(
                        op = %op.id,
                        kind = %op.kind(),
                        resource = %op.resource(),
                        target = op.target_id().unwrap_or("-"),
                        transient = e.is_transient(),
                        error = %e,
                        "operation failed, will retry"
                    );
                }
            }
            r.persist_log();
        });
    }

    async fn send(&self, payload: &OpPayload) -> RemoteResult<Applied> {
        let remote = self.remote.as_ref();
        match payload {
            OpPayload::CreateEvent { event } => {
                let created = remote.create_event(event).await?;
                Ok(Applied::Created {
                    provisional: event.id.clone(),
                    event: created,
                })
            }
            OpPayload::UpdateEvent { event_id, patch } => remote
                .update_event(event_id, patch)
                .await
                .map(Applied::Event),
            OpPayload::DeleteEvent { event_id } => {
                remote.delete_event(event_id).await.map(|()| Applied::Done)
            }
            OpPayload::UpdateUser { user_id, patch } => {
                remote.update_user(user_id, patch).await.map(Applied::User)
            }
            OpPayload::AddInterest { user_id, event_id } => remote
                .add_interest(user_id, event_id)
                .await
                .map(|()| Applied::Done),
            OpPayload::RemoveInterest { user_id, event_id } => remote
                .remove_interest(user_id, event_id)
                .await
                .map(|()| Applied::Done),
        }
    }
}

/// Folds a confirmed result into the replica.
fn absorb(r: &mut Replica, applied: Applied, report: &mut SyncReport) {
    match applied {
        Applied::Created { provisional, event } => {
            let confirmed = event.id.clone();
            if provisional != confirmed {
                r.cache.rewrite_event_id(&provisional, &confirmed);
                let rewritten = r.log.rewrite_resource_id(&provisional, &confirmed);
                info!(%provisional, %confirmed, rewritten, "provisional id confirmed");
                report.confirmed_ids.push((provisional, confirmed));
            }
            r.accept_remote(event);
        }
        Applied::Event(event) => {
            r.accept_remote(event);
        }
        Applied::User(user) => {
            let overlay = r.log.user_overlay(&user.id);
            r.cache.merge_user(user, &overlay);
        }
        Applied::Done => {}
    }
}

/// Position of `op`'s group in [`GROUP_ORDER`]. Interest removes share the
/// slot of interest adds.
fn send_slot(op: &PendingOperation) -> usize {
    let group = match op.group() {
        (ResourceKind::Interest, _) => (ResourceKind::Interest, OperationKind::Create),
        group => group,
    };
    GROUP_ORDER
        .iter()
        .position(|g| *g == group)
        .unwrap_or(GROUP_ORDER.len())
}

/// Entries in the order a pass sends them. Also used by the CLI's `pending`
/// listing.
pub fn in_send_order(mut ops: Vec<PendingOperation>) -> Vec<PendingOperation> {
    ops.sort_by_key(|op| (send_slot(op), op.timestamp));
    ops
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
