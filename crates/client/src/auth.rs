// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Identity of the signed-in user.

use evsync_core::UserId;

/// Supplies the current user and the bearer token for requests.
pub trait AuthProvider: Send + Sync {
    fn is_authenticated(&self) -> bool {
        self.current_user_id().is_some()
    }

    fn current_user_id(&self) -> Option<UserId>;

    fn access_token(&self) -> Option<String>;
}

/// Fixed credentials, typically read from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user_id: Option<UserId>,
    token: Option<String>,
}

impl StaticAuth {
    pub fn new(user_id: Option<UserId>, token: Option<String>) -> Self {
        StaticAuth {
            user_id: user_id.filter(|u| !u.trim().is_empty()),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self::new(Some(user_id.into()), None)
    }
}

impl AuthProvider for StaticAuth {
    fn current_user_id(&self) -> Option<UserId> {
        self.user_id.clone()
    }

    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
