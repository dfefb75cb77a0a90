// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending operations: durable intent to mutate remote state.
//!
//! Each entry carries a strongly-typed payload keyed by
//! (operation kind, resource kind). Payloads are validated before they
//! enter the log, so the sync engine never has to re-check them.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Event, EventId, EventPatch, UserId, UserPatch};
use crate::validate;

/// Locally generated, globally unique operation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn generate() -> Self {
        OperationId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        OperationId(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Event,
    User,
    #[serde(rename = "interest-relation")]
    Interest,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Event => "event",
            ResourceKind::User => "user",
            ResourceKind::Interest => "interest-relation",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutation a pending operation carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpPayload {
    /// Create an event. The event carries its provisional id.
    CreateEvent { event: Event },

    UpdateEvent { event_id: EventId, patch: EventPatch },

    DeleteEvent { event_id: EventId },

    UpdateUser { user_id: UserId, patch: UserPatch },

    /// Create a (user, event) interest relation.
    AddInterest { user_id: UserId, event_id: EventId },

    /// Delete a (user, event) interest relation.
    RemoveInterest { user_id: UserId, event_id: EventId },
}

impl OpPayload {
    pub fn kind(&self) -> OperationKind {
        match self {
            OpPayload::CreateEvent { .. } | OpPayload::AddInterest { .. } => OperationKind::Create,
            OpPayload::UpdateEvent { .. } | OpPayload::UpdateUser { .. } => OperationKind::Update,
            OpPayload::DeleteEvent { .. } | OpPayload::RemoveInterest { .. } => {
                OperationKind::Delete
            }
        }
    }

    pub fn resource(&self) -> ResourceKind {
        match self {
            OpPayload::CreateEvent { .. }
            | OpPayload::UpdateEvent { .. }
            | OpPayload::DeleteEvent { .. } => ResourceKind::Event,
            OpPayload::UpdateUser { .. } => ResourceKind::User,
            OpPayload::AddInterest { .. } | OpPayload::RemoveInterest { .. } => {
                ResourceKind::Interest
            }
        }
    }

    /// The id of the existing resource this operation targets.
    ///
    /// Absent for creates. Interest relations are addressed by their event.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            OpPayload::CreateEvent { .. } | OpPayload::AddInterest { .. } => None,
            OpPayload::UpdateEvent { event_id, .. }
            | OpPayload::DeleteEvent { event_id }
            | OpPayload::RemoveInterest { event_id, .. } => Some(event_id.as_str()),
            OpPayload::UpdateUser { user_id, .. } => Some(user_id.as_str()),
        }
    }

    /// The event this operation concerns, if any.
    pub fn event_id(&self) -> Option<&EventId> {
        match self {
            OpPayload::CreateEvent { event } => Some(&event.id),
            OpPayload::UpdateEvent { event_id, .. }
            | OpPayload::DeleteEvent { event_id }
            | OpPayload::AddInterest { event_id, .. }
            | OpPayload::RemoveInterest { event_id, .. } => Some(event_id),
            OpPayload::UpdateUser { .. } => None,
        }
    }

    /// Returns true if `id` appears anywhere in the target or payload.
    pub fn references(&self, id: &EventId) -> bool {
        self.event_id() == Some(id)
    }

    /// A provisional id this operation depends on, if it still has one.
    ///
    /// The create that introduced the id does not count as depending on it.
    pub fn pending_dependency(&self) -> Option<&EventId> {
        match self {
            OpPayload::CreateEvent { .. } => None,
            other => other.event_id().filter(|id| id.is_provisional()),
        }
    }

    /// Replaces `old` with `new` in target and payload. Returns true if
    /// anything changed.
    pub fn rewrite_event_id(&mut self, old: &EventId, new: &EventId) -> bool {
        let slot = match self {
            OpPayload::CreateEvent { event } => &mut event.id,
            OpPayload::UpdateEvent { event_id, .. }
            | OpPayload::DeleteEvent { event_id }
            | OpPayload::AddInterest { event_id, .. }
            | OpPayload::RemoveInterest { event_id, .. } => event_id,
            OpPayload::UpdateUser { .. } => return false,
        };
        if *slot == *old {
            *slot = new.clone();
            true
        } else {
            false
        }
    }

    /// Validates the payload shape before it enters the log.
    pub fn validate(&self) -> Result<()> {
        match self {
            OpPayload::CreateEvent { event } => validate::check_event(event),
            OpPayload::UpdateEvent { event_id, patch } => {
                validate::check_id(event_id.as_str())?;
                validate::check_patch(patch)
            }
            OpPayload::DeleteEvent { event_id } => validate::check_id(event_id.as_str()),
            OpPayload::UpdateUser { user_id, patch } => {
                validate::check_id(user_id)?;
                validate::check_user_patch(patch)
            }
            OpPayload::AddInterest { user_id, event_id }
            | OpPayload::RemoveInterest { user_id, event_id } => {
                validate::check_id(user_id)?;
                validate::check_id(event_id.as_str())
            }
        }
    }

    /// Returns true if `self` undoes `other` (add vs. remove of the same pair).
    pub fn is_inverse_of(&self, other: &OpPayload) -> bool {
        match (self, other) {
            (
                OpPayload::AddInterest { user_id: u1, event_id: e1 },
                OpPayload::RemoveInterest { user_id: u2, event_id: e2 },
            )
            | (
                OpPayload::RemoveInterest { user_id: u1, event_id: e1 },
                OpPayload::AddInterest { user_id: u2, event_id: e2 },
            ) => u1 == u2 && e1 == e2,
            _ => false,
        }
    }
}

/// An entry in the operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: OperationId,
    /// Creation time in milliseconds since the Unix epoch. Strictly
    /// increasing within one log.
    pub timestamp: u64,
    pub payload: OpPayload,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl PendingOperation {
    pub fn new(payload: OpPayload, timestamp: u64) -> Self {
        PendingOperation {
            id: OperationId::generate(),
            timestamp,
            payload,
            retry_count: 0,
            synced: false,
            last_error: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.payload.kind()
    }

    pub fn resource(&self) -> ResourceKind {
        self.payload.resource()
    }

    pub fn target_id(&self) -> Option<&str> {
        self.payload.target_id()
    }

    /// The sync group this entry belongs to.
    pub fn group(&self) -> (ResourceKind, OperationKind) {
        (self.resource(), self.kind())
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
