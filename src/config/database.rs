// ABOUTME: Database configuration types for SQLite connections
// ABOUTME: Parses DATABASE_URL and pool sizing from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Default on-disk database location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/snippets.db";

/// Default maximum pool size for file-backed databases
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default time a writer waits for the database lock before failing
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 30;

/// Type-safe database location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Path to `SQLite` database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    ///
    /// # Errors
    ///
    /// Returns an `invalid` error for empty URLs and for `PostgreSQL` URLs,
    /// which this build does not support
    pub fn parse_url(s: &str) -> AppResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AppError::invalid_input("Database URL is empty."));
        }
        if s.starts_with("postgresql://") || s.starts_with("postgres://") {
            return Err(AppError::invalid_input(
                "PostgreSQL is not supported by this build; use a sqlite: URL.",
            ));
        }

        match s.strip_prefix("sqlite:") {
            Some(":memory:") => Ok(Self::Memory),
            Some(path) => {
                let path = path.strip_prefix("//").unwrap_or(path);
                if path.is_empty() {
                    return Err(AppError::invalid_input("SQLite database path is empty."));
                }
                Ok(Self::SQLite {
                    path: PathBuf::from(path),
                })
            }
            // Fallback: treat as SQLite file path
            None => Ok(Self::SQLite {
                path: PathBuf::from(s),
            }),
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".into(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/snippets.db"),
        }
    }
}

impl Display for DatabaseUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database location
    pub url: DatabaseUrl,
    /// Maximum number of pooled connections. In-memory databases always use one.
    pub max_connections: u32,
    /// Seconds a transaction waits for another writer to finish
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DatabaseUrl::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_secs: DEFAULT_BUSY_TIMEOUT_SECS,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a specific URL with default pool sizing
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed
    pub fn for_url(url: &str) -> AppResult<Self> {
        Ok(Self {
            url: DatabaseUrl::parse_url(url)?,
            ..Self::default()
        })
    }

    /// Load database configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` or
    /// `DATABASE_BUSY_TIMEOUT_SECS` is invalid
    pub fn from_env() -> AppResult<Self> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned());
        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(value) => value.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                AppError::invalid_input(format!("Invalid DATABASE_MAX_CONNECTIONS value: {value}"))
            })?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };
        let busy_timeout_secs = match env::var("DATABASE_BUSY_TIMEOUT_SECS") {
            Ok(value) => value.parse::<u64>().map_err(|_| {
                AppError::invalid_input(format!(
                    "Invalid DATABASE_BUSY_TIMEOUT_SECS value: {value}"
                ))
            })?,
            Err(_) => DEFAULT_BUSY_TIMEOUT_SECS,
        };

        Ok(Self {
            url: DatabaseUrl::parse_url(&url)?,
            max_connections,
            busy_timeout_secs,
        })
    }

    /// Pool size actually used for this configuration
    #[must_use]
    pub const fn effective_max_connections(&self) -> u32 {
        if self.url.is_memory() {
            1
        } else {
            self.max_connections
        }
    }
}
