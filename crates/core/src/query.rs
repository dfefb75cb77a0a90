// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Event filtering, sorting and pagination.
//!
//! The same rules are applied to cached events while offline and sent as
//! query parameters while online, so both paths return the same shape.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::model::Event;

/// Category value that means "no category filter".
pub const ALL_CATEGORIES: &str = "All categories";

/// The fixed category catalog, starting with [`ALL_CATEGORIES`].
pub const CATEGORIES: &[&str] = &[
    ALL_CATEGORIES,
    "Technology",
    "Music",
    "Design",
    "Business",
    "Food",
    "Art",
    "Personal",
    "Work",
];

pub const DEFAULT_PAGE_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Date,
    Title,
    Category,
    Location,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Title => "title",
            SortKey::Category => "category",
            SortKey::Location => "location",
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "date" => Ok(SortKey::Date),
            "title" => Ok(SortKey::Title),
            "category" => Ok(SortKey::Category),
            "location" => Ok(SortKey::Location),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Sort { key, order }
    }

    pub fn compare(&self, a: &Event, b: &Event) -> Ordering {
        let primary = match self.key {
            SortKey::Date => a.date.cmp(&b.date).then(a.start_time.cmp(&b.start_time)),
            SortKey::Title => cmp_text(&a.title, &b.title),
            SortKey::Category => cmp_text(&a.category, &b.category),
            SortKey::Location => cmp_text(&a.location, &b.location),
        };
        let ordered = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        ordered.then_with(|| a.id.cmp(&b.id))
    }
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Criteria for listing events. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_online: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<Sort>,
}

impl EventFilter {
    /// Filter on a category alone.
    pub fn category(category: impl Into<String>) -> Self {
        EventFilter {
            category: Some(category.into()),
            ..Default::default()
        }
    }

    /// Free-text search alone.
    pub fn search(query: impl Into<String>) -> Self {
        EventFilter {
            search: Some(query.into()),
            ..Default::default()
        }
    }

    /// The category constraint, if any. [`ALL_CATEGORIES`] and blank values
    /// do not constrain.
    pub fn effective_category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
    }

    /// The lowercased search needle, if any.
    pub fn effective_search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(start) = self.start_date {
            if event.date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if event.date > end {
                return false;
            }
        }
        if let Some(category) = self.effective_category() {
            if event.category != category {
                return false;
            }
        }
        if let Some(online) = self.is_online {
            if event.is_online != online {
                return false;
            }
        }
        if let Some(needle) = self.effective_search() {
            let hit = [
                &event.title,
                &event.description,
                &event.location,
                &event.category,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }

    /// Filters and sorts `events`. Without an explicit sort, events come
    /// back ordered by date.
    pub fn apply(&self, events: impl IntoIterator<Item = Event>) -> Vec<Event> {
        let mut out: Vec<Event> = events.into_iter().filter(|e| self.matches(e)).collect();
        let sort = self.sort.unwrap_or_default();
        out.sort_by(|a, b| sort.compare(a, b));
        out
    }
}

/// A page request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        PageRequest {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub total_items: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub page_size: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PageInfo {
    /// Computes page metadata for `total_items` items. There is always at
    /// least one page.
    pub fn compute(total_items: usize, req: PageRequest) -> Self {
        let page_size = req.page_size.max(1);
        let current_page = req.page.max(1);
        let total_pages = total_items.div_ceil(page_size).max(1);
        PageInfo {
            total_items,
            total_pages,
            current_page,
            page_size,
            has_next: current_page < total_pages,
            has_previous: current_page > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub info: PageInfo,
}

/// Slices `items` to the requested page.
pub fn paginate<T>(items: Vec<T>, req: PageRequest) -> Page<T> {
    let info = PageInfo::compute(items.len(), req);
    let offset = (info.current_page - 1).saturating_mul(info.page_size);
    let items = items
        .into_iter()
        .skip(offset)
        .take(info.page_size)
        .collect();
    Page { items, info }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
