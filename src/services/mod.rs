// ABOUTME: Domain service layer for identity reconciliation and user lookups
// ABOUTME: Each service operation runs inside its own database transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

//! Domain service layer
//!
//! Services are the boundary handed to the HTTP layer. Every operation opens a
//! [`Tx`](crate::database::Tx), commits on success and rolls back on any error,
//! and reports failures through [`AppError`](crate::errors::AppError) so the
//! caller can map them to a status code.

/// OAuth credential reconciliation and credential lookups
pub mod auth;

/// User lookups and explicit user creation
pub mod users;

pub use auth::{AuthService, AuthServiceImpl};
pub use users::{UserService, UserServiceImpl};

use tracing::warn;

use crate::database::Tx;
use crate::errors::AppResult;

/// Commit on success, roll back and return the original error otherwise
async fn finish<T>(tx: Tx, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "Rollback failed");
            }
            Err(e)
        }
    }
}
