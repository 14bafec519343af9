// ABOUTME: Database connection management, schema migrations, and transaction entry point
// ABOUTME: Owns the SQLite pool and the clock used to stamp every transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

//! # Database Management
//!
//! [`Database`] owns the connection pool. All reads and writes go through a
//! [`Tx`] obtained from [`Database::begin`], which pins a single "now"
//! timestamp for the whole unit of work.
//!
//! Units of work that write start with [`Database::begin_write`], which takes
//! the `SQLite` write lock up front (`BEGIN IMMEDIATE`). Concurrent writers
//! then queue on the busy timeout instead of failing when a read snapshot
//! cannot be upgraded. File databases run in WAL mode so readers never wait.
//!
//! The handle is explicit: the host process calls [`Database::connect`] at
//! startup and [`Database::close`] at shutdown. Closing the pool makes every
//! outstanding acquisition fail, so in-flight work aborts and rolls back
//! instead of committing partially.

mod credentials;
mod mapper;
mod query;
mod rows;
mod transaction;
mod users;

pub use mapper::{Column, ColumnRole, Entity, EntitySchema};
pub use query::{build_in_query, format_limit_offset, QueryArg, SqlValue, MAX_IN_LIST_LEN};
pub use transaction::Tx;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use snippet_core::constants::tables;
use snippet_core::models::{Credential, User};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use tracing::{debug, info};

use crate::config::{DatabaseConfig, DatabaseUrl};
use crate::errors::{AppError, AppResult};

/// Source of the current time for transactions
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Database manager for user and credential storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    clock: Clock,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("pool_size", &self.pool.size())
            .field("closed", &self.pool.is_closed())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Connect, validate entity schemas and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An entity schema declares a field without a column name
    /// - The connection cannot be established
    /// - Migrations fail
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        validate_entity_schemas()?;

        if let DatabaseUrl::SQLite { path } = &config.url {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::internal(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                    .with_source(e)
                })?;
            }
        }

        let mut options = SqliteConnectOptions::from_str(&config.url.to_connection_string())?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));
        if !config.url.is_memory() {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options =
            SqlitePoolOptions::new().max_connections(config.effective_max_connections());
        if config.url.is_memory() {
            // The in-memory database lives only as long as its connection
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let db = Self {
            pool,
            clock: Arc::new(Utc::now),
        };
        db.migrate().await?;

        info!(url = %config.url, "Database connected");
        Ok(db)
    }

    /// Connect to a database URL with default pool settings
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the connection fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        Self::connect(&DatabaseConfig::for_url(database_url)?).await
    }

    /// Replace the clock used to stamp transactions
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Start a transaction stamped with the current time, truncated to whole seconds
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be acquired or the database is closed
    pub async fn begin(&self) -> AppResult<Tx> {
        let transaction = self.pool.begin().await?;
        Ok(self.stamp(transaction))
    }

    /// Start a transaction holding the database write lock.
    ///
    /// Waits up to the configured busy timeout while another writer is
    /// active, so check-then-insert sequences inside it cannot interleave
    /// with other writers.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be acquired, the database is
    /// closed, or the lock is not granted before the busy timeout
    pub async fn begin_write(&self) -> AppResult<Tx> {
        let transaction = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(self.stamp(transaction))
    }

    fn stamp(&self, transaction: Transaction<'static, Sqlite>) -> Tx {
        let now = (self.clock)().trunc_subsecs(0);
        debug!(%now, "Transaction started");
        Tx::new(transaction, now)
    }

    /// Close every pooled connection. Outstanding transactions fail and roll back.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database closed");
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any table or index cannot be created
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_users().await?;
        self.migrate_credentials().await?;
        Ok(())
    }

    async fn migrate_users(&self) -> AppResult<()> {
        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            tables::USERS
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn migrate_credentials(&self) -> AppResult<()> {
        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES {}(id) ON DELETE CASCADE,
                source TEXT NOT NULL,
                source_id TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                expiry TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(source, source_id)
            )
            ",
            tables::CREDENTIALS,
            tables::USERS
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_credentials_user_id ON {}(user_id)",
            tables::CREDENTIALS
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Check every persisted entity's column descriptors
///
/// # Errors
///
/// Returns an `internal` error for the first invalid descriptor
pub fn validate_entity_schemas() -> AppResult<()> {
    User::schema().validate()?;
    Credential::schema().validate()?;
    Ok(())
}
