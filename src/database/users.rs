// ABOUTME: User persistence mapping and identity store lookups for users
// ABOUTME: Finds users by ID or email and attaches their linked credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use snippet_core::constants::tables;
use snippet_core::models::{Credential, User, UserQuery};
use sqlx::Row;

use super::mapper::{Column, Entity, EntitySchema};
use super::query::{
    bind_value, bind_values, format_limit_offset, where_clause, QueryArg, SqlValue,
    MAX_IN_LIST_LEN,
};
use super::rows::{
    parse_credential_row, parse_rows, parse_user_row, CREDENTIAL_COLUMNS, USER_COLUMNS,
};
use super::Tx;
use crate::errors::{AppError, AppResult};

static USER_SCHEMA: EntitySchema = EntitySchema {
    table: tables::USERS,
    columns: &[
        Column::generated_id("id", "id"),
        Column::normal("name", "name"),
        Column::normal("email", "email"),
        Column::immutable("created_at", "created_at"),
        Column::normal("updated_at", "updated_at"),
        Column::transient("credentials"),
    ],
};

impl Entity for User {
    fn schema() -> &'static EntitySchema {
        &USER_SCHEMA
    }

    fn column_value(&self, field: &str) -> Option<SqlValue> {
        match field {
            "id" => Some(SqlValue::Integer(self.id)),
            "name" => Some(SqlValue::Text(self.name.clone())),
            "email" => Some(SqlValue::OptionalText(self.email.clone())),
            "created_at" => Some(SqlValue::Timestamp(self.created_at)),
            "updated_at" => Some(SqlValue::Timestamp(self.updated_at)),
            _ => None,
        }
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Tx {
    /// Get a user by ID with every linked credential attached
    ///
    /// # Errors
    ///
    /// Returns `not_found` if no user has the ID
    pub async fn find_user_by_id(&mut self, id: i64) -> AppResult<User> {
        let mut user = self.fetch_user("id = ?", SqlValue::Integer(id)).await?;
        self.attach_user_credentials(&mut user).await?;
        Ok(user)
    }

    /// Get a user by exact (case-sensitive) email. Credentials are not attached.
    ///
    /// # Errors
    ///
    /// Returns `not_found` if no user has the email
    pub async fn find_user_by_email(&mut self, email: &str) -> AppResult<User> {
        self.fetch_user("email = ?", SqlValue::Text(email.to_owned()))
            .await
    }

    async fn fetch_user(&mut self, condition: &str, value: SqlValue) -> AppResult<User> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM {} WHERE {condition}",
            tables::USERS
        );
        let row = bind_value(sqlx::query(&sql), value)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        parse_user_row(&row)
    }

    /// Replace `user.credentials` with every credential the user owns
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn attach_user_credentials(&mut self, user: &mut User) -> AppResult<()> {
        user.credentials = self.list_credentials_for_user(user.id).await?;
        Ok(())
    }

    /// Attach credentials to many users with one `IN (...)` query per
    /// [`MAX_IN_LIST_LEN`] users
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn attach_credentials_to_users(&mut self, users: &mut [User]) -> AppResult<()> {
        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM {} WHERE user_id IN (?) ORDER BY id",
            tables::CREDENTIALS
        );

        let mut by_user: HashMap<i64, Vec<Credential>> = HashMap::new();
        for chunk in users.chunks(MAX_IN_LIST_LEN) {
            let ids = chunk.iter().map(|user| SqlValue::Integer(user.id)).collect();
            let rows = self.fetch_all_in(&sql, vec![QueryArg::List(ids)]).await?;
            for credential in parse_rows(&rows, parse_credential_row)? {
                by_user.entry(credential.user_id).or_default().push(credential);
            }
        }
        for user in users.iter_mut() {
            user.credentials = by_user.remove(&user.id).unwrap_or_default();
        }
        Ok(())
    }

    /// Users matching `query` ordered by ID, plus the unpaginated match count.
    /// Credentials are attached to every returned user.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn find_users(&mut self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();
        if let Some(id) = query.id {
            conditions.push("id = ?");
            values.push(SqlValue::Integer(id));
        }
        if let Some(email) = &query.email {
            conditions.push("email = ?");
            values.push(SqlValue::Text(email.clone()));
        }
        let filter = where_clause(&conditions);

        let count_sql = format!("SELECT COUNT(*) FROM {} {filter}", tables::USERS);
        let total: i64 = bind_values(sqlx::query(&count_sql), values.clone())
            .fetch_one(self.conn()?)
            .await?
            .try_get(0)?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM {} {filter} ORDER BY id {}",
            tables::USERS,
            format_limit_offset(query.limit, query.page)
        );
        let rows = bind_values(sqlx::query(&sql), values)
            .fetch_all(self.conn()?)
            .await?;
        let mut users = parse_rows(&rows, parse_user_row)?;

        self.attach_credentials_to_users(&mut users).await?;
        Ok((users, total))
    }
}
