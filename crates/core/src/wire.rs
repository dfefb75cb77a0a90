// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire schema and the transform between it and the domain schema.
//!
//! The remote service speaks snake_case JSON with loosely-typed values
//! (numeric ids, `"1"` for true, dates with a time suffix). Decoding is
//! lenient; encoding always emits the canonical form. Pushed real-time
//! messages may carry camelCase keys, which are accepted as aliases.

use chrono::{NaiveDate, NaiveTime};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{Event, EventId, EventPatch, User, UserPatch};
use crate::query::{EventFilter, Page, PageInfo, PageRequest};
use crate::validate;

/// An event as the remote service sends and accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_id")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "loose_date")]
    pub date: NaiveDate,
    #[serde(default, alias = "startTime", deserialize_with = "loose_time")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, alias = "endTime", deserialize_with = "loose_time")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, alias = "isOnline", deserialize_with = "loose_bool")]
    pub is_online: bool,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(
        default,
        alias = "createdBy",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "loose_id"
    )]
    pub created_by: Option<String>,
}

/// Converts a domain event to the wire schema.
pub fn to_wire_format(event: &Event) -> WireEvent {
    WireEvent {
        id: Some(event.id.as_str().to_string()),
        title: event.title.clone(),
        description: event.description.clone(),
        date: event.date,
        start_time: event.start_time,
        end_time: event.end_time,
        location: event.location.clone(),
        category: event.category.clone(),
        is_online: event.is_online,
        image: event.image.clone(),
        created_by: event.created_by.clone(),
    }
}

/// Converts a wire event to the domain schema. Fails without a usable id.
pub fn to_domain_format(wire: WireEvent) -> Result<Event> {
    let id = wire
        .id
        .ok_or_else(|| Error::Decode(format!("event '{}' has no id", wire.title)))?;
    validate::check_id(&id)?;
    Ok(Event {
        id: EventId::new(id),
        title: wire.title,
        description: wire.description,
        date: wire.date,
        start_time: wire.start_time,
        end_time: wire.end_time,
        location: wire.location,
        category: wire.category,
        is_online: wire.is_online,
        image: wire.image.filter(|s| !s.trim().is_empty()),
        created_by: wire.created_by,
    })
}

/// Body for a create request: the wire event without local bookkeeping.
///
/// Provisional ids never leave the client.
pub fn create_body(event: &Event) -> WireEvent {
    let mut wire = to_wire_format(event);
    if event.id.is_provisional() {
        wire.id = None;
    }
    wire
}

/// Partial update body. Only set fields are sent; cleared fields are `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WireEventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Option<NaiveTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Option<NaiveTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Option<String>>,
}

impl From<&EventPatch> for WireEventPatch {
    fn from(patch: &EventPatch) -> Self {
        WireEventPatch {
            title: patch.title.clone(),
            description: patch.description.clone(),
            date: patch.date,
            start_time: patch.start_time,
            end_time: patch.end_time,
            location: patch.location.clone(),
            category: patch.category.clone(),
            is_online: patch.is_online,
            image: patch.image.clone(),
        }
    }
}

/// A user profile as the remote service sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireUser {
    #[serde(deserialize_with = "required_loose_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "loose_id_list")]
    pub events: Vec<String>,
    #[serde(default, alias = "interestedEvents", deserialize_with = "loose_id_list")]
    pub interested_events: Vec<String>,
}

impl WireUser {
    pub fn into_domain(self) -> User {
        User {
            id: self.id,
            name: self.name,
            description: self.description,
            avatar: self.avatar.filter(|s| !s.trim().is_empty()),
            events: self.events.into_iter().map(EventId::new).collect(),
            interested_events: self
                .interested_events
                .into_iter()
                .map(EventId::new)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WireUserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Option<String>>,
}

impl From<&UserPatch> for WireUserPatch {
    fn from(patch: &UserPatch) -> Self {
        WireUserPatch {
            name: patch.name.clone(),
            description: patch.description.clone(),
            avatar: patch.avatar.clone(),
        }
    }
}

/// A list of events, either bare or wrapped in `{events: [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireEventList {
    Bare(Vec<WireEvent>),
    Wrapped { events: Vec<WireEvent> },
}

impl WireEventList {
    pub fn into_vec(self) -> Vec<WireEvent> {
        match self {
            WireEventList::Bare(events) | WireEventList::Wrapped { events } => events,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePagination {
    #[serde(alias = "total_items")]
    pub total_events: usize,
    #[serde(default)]
    pub total_pages: usize,
    #[serde(default = "first_page")]
    pub current_page: usize,
    #[serde(default)]
    pub page_size: usize,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_previous: bool,
}

fn first_page() -> usize {
    1
}

/// A paginated listing: `{events, pagination}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WirePage {
    pub events: Vec<WireEvent>,
    pub pagination: WirePagination,
}

impl WirePage {
    /// Converts to a domain page. Events without a usable id are dropped
    /// and counted in the second tuple field.
    pub fn into_page(self, req: PageRequest) -> (Page<Event>, usize) {
        let (items, skipped) = decode_events(self.events);
        let p = self.pagination;
        let page_size = if p.page_size == 0 { req.page_size } else { p.page_size };
        let info = PageInfo {
            total_items: p.total_events,
            total_pages: p.total_pages.max(1),
            current_page: p.current_page.max(1),
            page_size,
            has_next: p.has_next,
            has_previous: p.has_previous,
        };
        (Page { items, info }, skipped)
    }
}

/// Decodes a batch of wire events, skipping undecodable ones.
pub fn decode_events(events: Vec<WireEvent>) -> (Vec<Event>, usize) {
    let total = events.len();
    let decoded: Vec<Event> = events
        .into_iter()
        .filter_map(|w| to_domain_format(w).ok())
        .collect();
    let skipped = total - decoded.len();
    (decoded, skipped)
}

/// Query parameters for a filtered listing.
pub fn filter_params(filter: &EventFilter) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(start) = filter.start_date {
        params.push(("start_date", start.to_string()));
    }
    if let Some(end) = filter.end_date {
        params.push(("end_date", end.to_string()));
    }
    if let Some(category) = filter.effective_category() {
        params.push(("category", category.to_string()));
    }
    if let Some(online) = filter.is_online {
        params.push(("is_online", online.to_string()));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        params.push(("search", search.to_string()));
    }
    if let Some(sort) = filter.sort {
        params.push(("sort_by", sort.key.as_str().to_string()));
        params.push(("sort_order", sort.order.as_str().to_string()));
    }
    params
}

/// Query parameters selecting a page.
pub fn page_params(req: PageRequest) -> Vec<(&'static str, String)> {
    vec![
        ("pagination", "true".to_string()),
        ("page", req.page.to_string()),
        ("page_size", req.page_size.to_string()),
    ]
}

fn loose_id_value<E: serde::de::Error>(value: Value) -> std::result::Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(E::custom(format!("expected an id, got {other}"))),
    }
}

fn loose_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    loose_id_value(Value::deserialize(d)?)
}

fn required_loose_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    loose_id_value(Value::deserialize(d)?)?.ok_or_else(|| D::Error::custom("missing id"))
}

fn loose_id_list<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    let values = Option::<Vec<Value>>::deserialize(d)?.unwrap_or_default();
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        if let Some(id) = loose_id_value(value)? {
            out.push(id);
        }
    }
    Ok(out)
}

fn loose_date<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<NaiveDate, D::Error> {
    let raw = String::deserialize(d)?;
    let day = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| D::Error::custom(format!("invalid date '{raw}': {e}")))
}

/// Parses `HH:MM:SS`, `HH:MM:SS.fff` or `HH:MM`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn loose_time<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<NaiveTime>, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_time(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid time '{s}'"))),
    }
}

/// Coerces `true`, `"true"`, `1` and `"1"` to true. Everything else is false.
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true" || s == "1",
        Value::Number(n) => n.as_i64() == Some(1) || n.as_u64() == Some(1),
        _ => false,
    }
}

fn loose_bool<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    Ok(coerce_bool(&Value::deserialize(d)?))
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
