// ABOUTME: Transaction context wrapping one SQLite transaction with a fixed timestamp
// ABOUTME: Requires explicit commit; anything dropped uncommitted is rolled back
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

//! Transaction context
//!
//! A [`Tx`] wraps a `SQLx` transaction together with the timestamp captured
//! when it started. Every mutation inside the transaction stamps that same
//! timestamp, which keeps multi-row writes consistent and lets tests control
//! time through [`Database::with_clock`](super::Database::with_clock).
//!
//! There is no implicit commit. Callers finish with [`Tx::commit`] or
//! [`Tx::rollback`]; a `Tx` dropped on an early return (`?`) or because its
//! future was cancelled rolls back.
//!
//! ```text
//! let mut tx = db.begin().await?;
//! tx.insert(&mut user, tables::USERS).await?;
//! tx.insert(&mut credential, tables::CREDENTIALS).await?;
//! tx.commit().await?;
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

/// One unit of atomic database work bound to a single "now"
#[derive(Debug)]
pub struct Tx {
    transaction: Option<Transaction<'static, Sqlite>>,
    now: DateTime<Utc>,
}

impl Tx {
    pub(super) const fn new(transaction: Transaction<'static, Sqlite>, now: DateTime<Utc>) -> Self {
        Self {
            transaction: Some(transaction),
            now,
        }
    }

    /// Timestamp captured when the transaction started
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Connection for executing queries inside the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction was already committed or rolled back
    pub fn conn(&mut self) -> AppResult<&mut SqliteConnection> {
        self.transaction
            .as_deref_mut()
            .ok_or_else(|| AppError::internal("Transaction already finished."))
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is persisted in that case
    pub async fn commit(mut self) -> AppResult<()> {
        let transaction = self
            .transaction
            .take()
            .ok_or_else(|| AppError::internal("Transaction already finished."))?;
        transaction
            .commit()
            .await
            .map_err(|e| AppError::from(e).wrap("commit transaction"))?;
        debug!(now = %self.now, "Transaction committed");
        Ok(())
    }

    /// Roll the transaction back
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback statement fails
    pub async fn rollback(mut self) -> AppResult<()> {
        let transaction = self
            .transaction
            .take()
            .ok_or_else(|| AppError::internal("Transaction already finished."))?;
        transaction
            .rollback()
            .await
            .map_err(|e| AppError::from(e).wrap("rollback transaction"))?;
        debug!(now = %self.now, "Transaction rolled back");
        Ok(())
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            // SQLx rolls the transaction back when it is dropped
            warn!(now = %self.now, "Transaction dropped without commit, rolling back");
        }
    }
}
