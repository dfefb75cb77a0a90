// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for evsync-core operations.

use thiserror::Error;

/// All possible errors that can occur in evsync-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("{field} too long ({actual} chars, max {max})")]
    TooLong {
        field: &'static str,
        actual: usize,
        max: usize,
    },

    #[error("nothing to update\n  hint: set at least one field")]
    EmptyPatch,

    #[error("invalid id: '{0}'")]
    InvalidId(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for errors raised by caller-supplied data failing checks.
    ///
    /// These are surfaced immediately and never queued.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Required { .. }
                | Error::Invalid { .. }
                | Error::TooLong { .. }
                | Error::EmptyPatch
                | Error::InvalidId(_)
        )
    }
}

/// A specialized Result type for evsync-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
