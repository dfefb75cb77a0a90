// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::realtime::TransportError;
use crate::remote::RemoteError;
use crate::storage::StorageError;

/// All possible errors that can occur in the evsync library.
///
/// Remote failures during writes are not errors: the write is kept locally
/// and reported through its receipt. What reaches the caller as `Err` is
/// either bad input, a missing prerequisite, or a failure to record intent.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(evsync_core::Error),

    #[error(transparent)]
    Core(evsync_core::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("request cancelled")]
    Cancelled,

    #[error("not signed in\n  hint: set [auth] user_id in the config file")]
    NotAuthenticated,

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("the service is not reachable (status: {0})\n  hint: this operation needs a live connection")]
    Offline(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<evsync_core::Error> for Error {
    fn from(err: evsync_core::Error) -> Self {
        if err.is_validation() {
            Error::Validation(err)
        } else {
            Error::Core(err)
        }
    }
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// A specialized Result type for evsync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
