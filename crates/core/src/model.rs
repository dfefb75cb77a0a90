// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Domain model for the event catalog.
//!
//! These types are the client-side schema. They are persisted in the local
//! cache in this shape (camelCase keys) and converted to the server's wire
//! schema only at the remote boundary, see [`crate::wire`].

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::validate;

/// Prefix carried by every locally-assigned event id.
pub const PROVISIONAL_PREFIX: &str = "temp-";

/// User identifier as issued by the remote service.
pub type UserId = String;

/// Identifier of an event.
///
/// Either confirmed (assigned by the remote service) or provisional
/// (assigned locally while the create is still pending).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wraps an id string without checking it.
    pub fn new(id: impl Into<String>) -> Self {
        EventId(id.into())
    }

    /// Generates a fresh provisional id (`temp-<uuid>`).
    pub fn provisional() -> Self {
        EventId(format!("{PROVISIONAL_PREFIX}{}", Uuid::new_v4()))
    }

    /// Returns true if this id was assigned locally and not yet confirmed.
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        EventId(s.to_string())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        EventId(s)
    }
}

impl PartialEq<str> for EventId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for EventId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A catalog event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    pub location: String,
    pub category: String,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub created_by: Option<UserId>,
}

/// Caller-supplied fields for a new event.
///
/// The id is assigned by the store; the creator is the current user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    pub location: String,
    pub category: String,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub image: Option<String>,
}

impl EventDraft {
    /// Validates the draft and turns it into an event with the given id.
    pub fn into_event(self, id: EventId, created_by: Option<UserId>) -> Result<Event> {
        validate::check_text_fields(&self.title, &self.description, &self.location, &self.category)?;
        let date = self.date.ok_or(Error::Required { field: "date" })?;
        let event = Event {
            id,
            title: self.title.trim().to_string(),
            description: self.description,
            date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location.trim().to_string(),
            category: self.category,
            is_online: self.is_online,
            image: self.image.filter(|s| !s.trim().is_empty()),
            created_by,
        };
        validate::check_event(&event)?;
        Ok(event)
    }
}

/// Partial update of an event.
///
/// `None` leaves a field untouched. For the nullable fields, `Some(None)`
/// clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub start_time: Option<Option<NaiveTime>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub end_time: Option<Option<NaiveTime>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub image: Option<Option<String>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        *self == EventPatch::default()
    }

    /// Applies the set fields to `event` in place.
    pub fn apply(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            event.description = description.clone();
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(start) = self.start_time {
            event.start_time = start;
        }
        if let Some(end) = self.end_time {
            event.end_time = end;
        }
        if let Some(location) = &self.location {
            event.location = location.trim().to_string();
        }
        if let Some(category) = &self.category {
            event.category = category.clone();
        }
        if let Some(is_online) = self.is_online {
            event.is_online = is_online;
        }
        if let Some(image) = &self.image {
            event.image = image.clone().filter(|s| !s.trim().is_empty());
        }
    }

    /// Folds a later patch into this one. Fields set by `later` win.
    pub fn merge(&mut self, later: &EventPatch) {
        fn take<T: Clone>(slot: &mut Option<T>, later: &Option<T>) {
            if later.is_some() {
                slot.clone_from(later);
            }
        }
        take(&mut self.title, &later.title);
        take(&mut self.description, &later.description);
        take(&mut self.date, &later.date);
        take(&mut self.start_time, &later.start_time);
        take(&mut self.end_time, &later.end_time);
        take(&mut self.location, &later.location);
        take(&mut self.category, &later.category);
        take(&mut self.is_online, &later.is_online);
        take(&mut self.image, &later.image);
    }
}

/// Local profile projection of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Ids of events this user owns.
    #[serde(default)]
    pub events: Vec<EventId>,
    /// Ids of events this user marked as interesting. Authoritative locally.
    #[serde(default)]
    pub interested_events: Vec<EventId>,
}

impl User {
    /// An empty profile used until the real one has been fetched.
    pub fn placeholder(id: impl Into<UserId>) -> Self {
        User {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            avatar: None,
            events: Vec::new(),
            interested_events: Vec::new(),
        }
    }
}

/// Partial update of a user profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub avatar: Option<Option<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == UserPatch::default()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            user.description = description.clone();
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = avatar.clone();
        }
    }
}

/// A (user, event) interest relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestPair {
    pub user_id: UserId,
    pub event_id: EventId,
}

impl InterestPair {
    pub fn new(user_id: impl Into<UserId>, event_id: EventId) -> Self {
        InterestPair {
            user_id: user_id.into(),
            event_id,
        }
    }
}

/// Reference to a file stored by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub file_name: String,
    pub file_url: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_type: String,
}

/// Distinguishes an explicit `null` from an absent field.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
