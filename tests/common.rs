// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory databases with a controllable clock and seed helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `snippet_server`

use std::path::Path;
use std::sync::{Arc, Mutex, Once};

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use snippet_server::{
    constants::{oauth::AUTH_SOURCE_GITHUB, tables},
    database::{Clock, Database},
    models::{Credential, User},
};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Manually driven clock shared between a test and its database
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    /// Clock frozen at 2024-01-15 09:30:00.250 UTC
    pub fn new() -> Self {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).single().unwrap()
            + Duration::milliseconds(250);
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    pub fn as_clock(&self) -> Clock {
        let now = Arc::clone(&self.now);
        Arc::new(move || *now.lock().unwrap())
    }
}

/// Standard test database setup: in-memory `SQLite` driven by a [`TestClock`]
pub async fn create_test_database() -> Result<(Database, TestClock)> {
    init_test_logging();
    let clock = TestClock::new();
    let database = Database::new("sqlite::memory:")
        .await?
        .with_clock(clock.as_clock());
    Ok((database, clock))
}

/// File-backed database under `dir`, for tests that need several pooled connections
pub async fn create_file_database(dir: &Path) -> Result<Database> {
    init_test_logging();
    let url = format!("sqlite:{}", dir.join("snippets.db").display());
    Ok(Database::new(&url).await?)
}

/// GitHub credential carrying a transient user to reconcile
pub fn github_credential(source_id: &str, name: &str, email: Option<&str>) -> Credential {
    Credential::new(AUTH_SOURCE_GITHUB, source_id, format!("gho_{source_id}"))
        .with_user(User::new(name, email.map(str::to_owned)))
}

/// Insert and commit a user
pub async fn seed_user(db: &Database, name: &str, email: Option<&str>) -> Result<User> {
    let mut user = User::new(name, email.map(str::to_owned));
    let mut tx = db.begin().await?;
    tx.insert(&mut user, tables::USERS).await?;
    tx.commit().await?;
    Ok(user)
}

/// Number of rows in a table, read outside any transaction
pub async fn count_rows(db: &Database, table: &str) -> Result<i64> {
    let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db.pool())
        .await?;
    Ok(count.0)
}
