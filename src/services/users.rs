// ABOUTME: User lookups with linked credentials and explicit user creation
// ABOUTME: Update and delete are reported as not implemented through the error taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

use async_trait::async_trait;
use snippet_core::constants::tables;
use snippet_core::models::{User, UserQuery, UserUpdate};
use tracing::info;

use super::finish;
use crate::database::Database;
use crate::errors::{AppError, AppResult};

/// User management
#[async_trait]
pub trait UserService: Send + Sync {
    /// Get a user by ID with linked credentials
    async fn get_user_by_id(&self, id: i64) -> AppResult<User>;

    /// Users matching the query plus the unpaginated total
    async fn query_users(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)>;

    /// Create a user directly, outside OAuth reconciliation. `user` is only
    /// updated once the insert is committed.
    async fn create_user(&self, user: &mut User) -> AppResult<()>;

    /// Change a user's name or email
    async fn update_user(&self, id: i64, update: &UserUpdate) -> AppResult<User>;

    /// Remove a user and its credentials
    async fn delete_user(&self, id: i64) -> AppResult<()>;
}

/// `SQLite` implementation of [`UserService`]
#[derive(Debug, Clone)]
pub struct UserServiceImpl {
    db: Database,
}

impl UserServiceImpl {
    /// Create a new `UserService` with the given database connection
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn get_user_by_id(&self, id: i64) -> AppResult<User> {
        let mut tx = self.db.begin().await?;
        let result = tx.find_user_by_id(id).await;
        finish(tx, result).await
    }

    async fn query_users(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let mut tx = self.db.begin().await?;
        let result = tx.find_users(query).await;
        finish(tx, result).await
    }

    async fn create_user(&self, user: &mut User) -> AppResult<()> {
        user.validate()?;
        let mut created = user.clone();
        if created.link_email().is_none() {
            created.email = None;
        }

        let mut tx = self.db.begin_write().await?;
        let result = tx.insert(&mut created, tables::USERS).await;
        finish(tx, result).await?;

        info!(user.id = created.id, "Created user");
        *user = created;
        Ok(())
    }

    async fn update_user(&self, _id: i64, _update: &UserUpdate) -> AppResult<User> {
        Err(AppError::not_implemented("Updating users"))
    }

    async fn delete_user(&self, _id: i64) -> AppResult<()> {
        Err(AppError::not_implemented("Deleting users"))
    }
}
