// ABOUTME: OAuth credential record linking one provider account to one local user
// ABOUTME: Includes validation, provider avatar lookup, and credential query types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;
use crate::constants::oauth::{AUTH_SOURCE_GITHUB, GITHUB_AVATAR_BASE_URL};
use crate::errors::{AppError, AppResult};

/// A set of OAuth credentials for one provider account.
///
/// At most one credential exists per (`source`, `source_id`) pair. Tokens and
/// the owning user ID are never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Generated identifier, 0 until persisted
    pub id: i64,
    /// Owning user ID, 0 when the caller does not know it yet
    #[serde(skip)]
    pub user_id: i64,
    /// In-memory owning user. Not persisted.
    #[serde(skip)]
    pub user: Option<User>,
    /// Provider name, e.g. "github"
    pub source: String,
    /// The provider's identifier for the account
    #[serde(rename = "sourceID")]
    pub source_id: String,
    /// OAuth access token
    #[serde(skip)]
    pub access_token: String,
    /// OAuth refresh token, absent for providers that do not issue one
    #[serde(skip)]
    pub refresh_token: Option<String>,
    /// Access token expiry
    #[serde(skip)]
    pub expiry: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Create an unsaved credential for a provider account
    pub fn new(
        source: impl Into<String>,
        source_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_id: source_id.into(),
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    /// Attach a transient user to be resolved or provisioned on creation
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Validate fields required before persisting
    ///
    /// # Errors
    ///
    /// Returns an `invalid` error naming the first missing field
    pub fn validate(&self) -> AppResult<()> {
        if self.user_id == 0 {
            Err(AppError::invalid_input("User required."))
        } else if self.source.is_empty() {
            Err(AppError::invalid_input("Source required."))
        } else if self.source_id.is_empty() {
            Err(AppError::invalid_input("Source ID required."))
        } else if self.access_token.is_empty() {
            Err(AppError::invalid_input("Access token required."))
        } else {
            Ok(())
        }
    }

    /// Avatar hosted by the authentication source, or an empty string for unknown sources
    #[must_use]
    pub fn avatar_url(&self, size: u32) -> String {
        match self.source.as_str() {
            AUTH_SOURCE_GITHUB => format!("{GITHUB_AVATAR_BASE_URL}/{}?s={size}", self.source_id),
            _ => String::new(),
        }
    }
}

/// Filter accepted by `AuthService::query_auths`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthQuery {
    /// Exact credential ID
    pub id: Option<i64>,
    /// Owning user ID
    pub user_id: Option<i64>,
    /// Provider name
    pub source: Option<String>,
    /// Provider account ID
    pub source_id: Option<String>,
    /// 1-based page, used with `limit`
    #[serde(default)]
    pub page: u32,
    /// Page size, 0 for no limit
    #[serde(default)]
    pub limit: u32,
}

/// Credentials matching a query along with the unpaginated total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthQueryResult {
    /// Credentials on the requested page
    pub auths: Vec<Credential>,
    /// Total number of matching credentials
    pub total: i64,
}

impl From<(Vec<Credential>, i64)> for AuthQueryResult {
    fn from((auths, total): (Vec<Credential>, i64)) -> Self {
        Self { auths, total }
    }
}
