// ABOUTME: User identity record with linked credentials and query types
// ABOUTME: Users are provisioned during OAuth reconciliation or directly for testing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Credential;
use crate::errors::{AppError, AppResult};

/// A user in the system.
///
/// Users are normally created while reconciling an OAuth callback, but can
/// also be created directly (administration and tests).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Generated identifier, 0 until persisted
    pub id: i64,
    /// Preferred display name
    pub name: String,
    /// Email address, the natural link key between providers
    pub email: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Linked OAuth credentials, loaded on read and never persisted inline
    #[serde(rename = "auths", default)]
    pub credentials: Vec<Credential>,
}

impl User {
    /// Create an unsaved user
    pub fn new(name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            name: name.into(),
            email,
            ..Self::default()
        }
    }

    /// Email usable as a link key. Blank emails do not count.
    #[must_use]
    pub fn link_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| !email.trim().is_empty())
    }

    /// Basic field validation
    ///
    /// # Errors
    ///
    /// Returns an `invalid` error if the name is blank
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::invalid_input("User name required."));
        }
        Ok(())
    }

    /// Avatar URL from the first credential that provides one, or an empty string
    #[must_use]
    pub fn avatar_url(&self, size: u32) -> String {
        self.credentials
            .iter()
            .map(|credential| credential.avatar_url(size))
            .find(|url| !url.is_empty())
            .unwrap_or_default()
    }
}

/// Filter accepted by `UserService::query_users`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    /// Exact user ID
    pub id: Option<i64>,
    /// Exact email
    pub email: Option<String>,
    /// 1-based page, used with `limit`
    #[serde(default)]
    pub page: u32,
    /// Page size, 0 for no limit
    #[serde(default)]
    pub limit: u32,
}

/// Users matching a query along with the unpaginated total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserQueryResult {
    /// Users on the requested page
    pub users: Vec<User>,
    /// Total number of matching users
    pub total: i64,
}

impl From<(Vec<User>, i64)> for UserQueryResult {
    fn from((users, total): (Vec<User>, i64)) -> Self {
        Self { users, total }
    }
}

/// Fields that may be changed on an existing user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    /// New display name
    pub name: Option<String>,
    /// New email
    pub email: Option<String>,
}
