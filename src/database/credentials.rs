// ABOUTME: Credential persistence mapping and identity store lookups for OAuth links
// ABOUTME: Resolves credentials by provider account, by ID, by owner, or by filter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

use chrono::{DateTime, Utc};
use snippet_core::constants::tables;
use snippet_core::models::{AuthQuery, Credential};
use sqlx::Row;

use super::mapper::{Column, Entity, EntitySchema};
use super::query::{bind_values, format_limit_offset, where_clause, SqlValue};
use super::rows::{parse_credential_row, parse_rows, CREDENTIAL_COLUMNS};
use super::Tx;
use crate::errors::{AppError, AppResult};

// The owning user is fixed once the credential exists
static CREDENTIAL_SCHEMA: EntitySchema = EntitySchema {
    table: tables::CREDENTIALS,
    columns: &[
        Column::generated_id("id", "id"),
        Column::immutable("user_id", "user_id"),
        Column::transient("user"),
        Column::normal("source", "source"),
        Column::normal("source_id", "source_id"),
        Column::normal("access_token", "access_token"),
        Column::normal("refresh_token", "refresh_token"),
        Column::normal("expiry", "expiry"),
        Column::immutable("created_at", "created_at"),
        Column::normal("updated_at", "updated_at"),
    ],
};

impl Entity for Credential {
    fn schema() -> &'static EntitySchema {
        &CREDENTIAL_SCHEMA
    }

    fn column_value(&self, field: &str) -> Option<SqlValue> {
        match field {
            "id" => Some(SqlValue::Integer(self.id)),
            "user_id" => Some(SqlValue::Integer(self.user_id)),
            "source" => Some(SqlValue::Text(self.source.clone())),
            "source_id" => Some(SqlValue::Text(self.source_id.clone())),
            "access_token" => Some(SqlValue::Text(self.access_token.clone())),
            "refresh_token" => Some(SqlValue::OptionalText(self.refresh_token.clone())),
            "expiry" => Some(SqlValue::OptionalTimestamp(self.expiry)),
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
    /// Get the credential for one provider account
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the provider account was never linked
    pub async fn find_credential_by_source_id(
        &mut self,
        source: &str,
        source_id: &str,
    ) -> AppResult<Credential> {
        self.fetch_credential(
            "source = ? AND source_id = ?",
            vec![
                SqlValue::Text(source.to_owned()),
                SqlValue::Text(source_id.to_owned()),
            ],
        )
        .await
    }

    /// Get a credential by ID with its owning user attached
    ///
    /// # Errors
    ///
    /// Returns `not_found` if no credential has the ID
    pub async fn find_credential_by_id(&mut self, id: i64) -> AppResult<Credential> {
        let mut credential = self
            .fetch_credential("id = ?", vec![SqlValue::Integer(id)])
            .await?;
        credential.user = Some(self.find_user_by_id(credential.user_id).await?);
        Ok(credential)
    }

    async fn fetch_credential(
        &mut self,
        condition: &str,
        values: Vec<SqlValue>,
    ) -> AppResult<Credential> {
        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM {} WHERE {condition}",
            tables::CREDENTIALS
        );
        let row = bind_values(sqlx::query(&sql), values)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| AppError::not_found("Auth"))?;
        parse_credential_row(&row)
    }

    /// Every credential owned by a user, in insertion order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_credentials_for_user(&mut self, user_id: i64) -> AppResult<Vec<Credential>> {
        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM {} WHERE user_id = ? ORDER BY id",
            tables::CREDENTIALS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(self.conn()?)
            .await?;
        parse_rows(&rows, parse_credential_row)
    }

    /// Credentials matching `query` ordered by ID, plus the unpaginated match count
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn find_credentials(
        &mut self,
        query: &AuthQuery,
    ) -> AppResult<(Vec<Credential>, i64)> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();
        if let Some(id) = query.id {
            conditions.push("id = ?");
            values.push(SqlValue::Integer(id));
        }
        if let Some(user_id) = query.user_id {
            conditions.push("user_id = ?");
            values.push(SqlValue::Integer(user_id));
        }
        if let Some(source) = &query.source {
            conditions.push("source = ?");
            values.push(SqlValue::Text(source.clone()));
        }
        if let Some(source_id) = &query.source_id {
            conditions.push("source_id = ?");
            values.push(SqlValue::Text(source_id.clone()));
        }
        let filter = where_clause(&conditions);

        let count_sql = format!("SELECT COUNT(*) FROM {} {filter}", tables::CREDENTIALS);
        let total: i64 = bind_values(sqlx::query(&count_sql), values.clone())
            .fetch_one(self.conn()?)
            .await?
            .try_get(0)?;

        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM {} {filter} ORDER BY id {}",
            tables::CREDENTIALS,
            format_limit_offset(query.limit, query.page)
        );
        let rows = bind_values(sqlx::query(&sql), values)
            .fetch_all(self.conn()?)
            .await?;
        Ok((parse_rows(&rows, parse_credential_row)?, total))
    }
}
