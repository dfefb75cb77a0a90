// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Input validation applied before anything reaches the cache or the log.

use crate::error::{Error, Result};
use crate::model::{Event, EventPatch, UserPatch};

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_LOCATION_LENGTH: usize = 200;
pub const MAX_CATEGORY_LENGTH: usize = 100;
pub const MAX_NAME_LENGTH: usize = 200;

fn required(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Required { field });
    }
    Ok(())
}

fn max_len(field: &'static str, value: &str, max: usize) -> Result<()> {
    let actual = value.trim().chars().count();
    if actual > max {
        return Err(Error::TooLong { field, actual, max });
    }
    Ok(())
}

/// Checks the required text fields of an event in display order.
pub fn check_text_fields(
    title: &str,
    description: &str,
    location: &str,
    category: &str,
) -> Result<()> {
    required("title", title)?;
    required("description", description)?;
    required("location", location)?;
    required("category", category)?;
    max_len("title", title, MAX_TITLE_LENGTH)?;
    max_len("location", location, MAX_LOCATION_LENGTH)?;
    max_len("category", category, MAX_CATEGORY_LENGTH)?;
    Ok(())
}

/// Validates a complete event.
pub fn check_event(event: &Event) -> Result<()> {
    check_id(event.id.as_str())?;
    check_text_fields(
        &event.title,
        &event.description,
        &event.location,
        &event.category,
    )?;
    if let (Some(start), Some(end)) = (event.start_time, event.end_time) {
        if start >= end {
            return Err(Error::Invalid {
                field: "end_time",
                reason: "must be after start_time".to_string(),
            });
        }
    }
    if event.image.as_deref().is_some_and(|s| s.trim().is_empty()) {
        return Err(Error::Invalid {
            field: "image",
            reason: "must not be blank".to_string(),
        });
    }
    Ok(())
}

/// Validates the fields an update sets. Cross-field checks run on the
/// patched event.
pub fn check_patch(patch: &EventPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(Error::EmptyPatch);
    }
    if let Some(title) = &patch.title {
        required("title", title)?;
        max_len("title", title, MAX_TITLE_LENGTH)?;
    }
    if let Some(description) = &patch.description {
        required("description", description)?;
    }
    if let Some(location) = &patch.location {
        required("location", location)?;
        max_len("location", location, MAX_LOCATION_LENGTH)?;
    }
    if let Some(category) = &patch.category {
        required("category", category)?;
        max_len("category", category, MAX_CATEGORY_LENGTH)?;
    }
    Ok(())
}

pub fn check_user_patch(patch: &UserPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(Error::EmptyPatch);
    }
    if let Some(name) = &patch.name {
        required("name", name)?;
        max_len("name", name, MAX_NAME_LENGTH)?;
    }
    Ok(())
}

/// Ids end up in URL paths, so they must be non-empty single segments.
pub fn check_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains('/') || id.chars().any(char::is_whitespace) {
        return Err(Error::InvalidId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
