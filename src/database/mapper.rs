// ABOUTME: Entity mapper synthesizing INSERT and UPDATE statements from column descriptors
// ABOUTME: Stamps timestamps and writes generated identifiers back onto records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

//! Entity ↔ SQL statement mapping
//!
//! Each persisted record type describes its table with a static
//! [`EntitySchema`]: an ordered list of fields, their column names and a
//! [`ColumnRole`]. The mapper builds parameterized statements from that
//! description instead of hand-written bind chains.
//!
//! Schemas are checked once at [`Database::connect`](super::Database::connect)
//! and again before every statement, so a field without a column name is
//! reported as an `internal` error rather than silently skipped.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use super::query::{bind_value, SqlValue};
use super::Tx;
use crate::errors::{AppError, AppResult};

/// How a field takes part in generated statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Database-generated primary key; never written, returned by `INSERT`
    GeneratedId,
    /// Written on insert, never changed by update (owning scope, creation time)
    Immutable,
    /// Written on insert and update
    Normal,
    /// In-memory only (relations); never written
    Transient,
}

/// Field-to-column descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Field name on the record
    pub field: &'static str,
    /// Column name, `None` if the field was never mapped
    pub column: Option<&'static str>,
    /// Statement participation
    pub role: ColumnRole,
}

impl Column {
    /// Generated primary key column
    #[must_use]
    pub const fn generated_id(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column: Some(column),
            role: ColumnRole::GeneratedId,
        }
    }

    /// Column written on insert only
    #[must_use]
    pub const fn immutable(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column: Some(column),
            role: ColumnRole::Immutable,
        }
    }

    /// Regular column
    #[must_use]
    pub const fn normal(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column: Some(column),
            role: ColumnRole::Normal,
        }
    }

    /// Field that is not persisted
    #[must_use]
    pub const fn transient(field: &'static str) -> Self {
        Self {
            field,
            column: None,
            role: ColumnRole::Transient,
        }
    }

    /// Column name of a persisted field.
    ///
    /// # Errors
    ///
    /// Returns an `internal` error if the field declares no column name
    pub fn name(&self) -> AppResult<&'static str> {
        self.column.filter(|name| !name.is_empty()).ok_or_else(|| {
            AppError::internal(format!(
                "Field '{}' does not declare a column name.",
                self.field
            ))
        })
    }
}

/// Static description of a persisted record type
#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    /// Default table name
    pub table: &'static str,
    /// Every field of the record, in statement order
    pub columns: &'static [Column],
}

impl EntitySchema {
    /// Check that every persisted field has a column name and that there is
    /// exactly one generated identifier
    ///
    /// # Errors
    ///
    /// Returns an `internal` error describing the first problem found
    pub fn validate(&self) -> AppResult<()> {
        let mut generated_ids = 0;
        for column in self.columns {
            match column.role {
                ColumnRole::Transient => {}
                ColumnRole::GeneratedId => {
                    column.name()?;
                    generated_ids += 1;
                }
                ColumnRole::Immutable | ColumnRole::Normal => {
                    column.name()?;
                }
            }
        }

        if generated_ids != 1 {
            return Err(AppError::internal(format!(
                "Entity for table '{}' must declare exactly one generated identifier, found {generated_ids}.",
                self.table
            )));
        }
        Ok(())
    }

    /// Persisted columns for `INSERT`
    fn insert_columns(&self) -> impl Iterator<Item = &'static Column> {
        self.columns
            .iter()
            .filter(|c| matches!(c.role, ColumnRole::Immutable | ColumnRole::Normal))
    }

    /// Persisted columns for `UPDATE`
    fn update_columns(&self) -> impl Iterator<Item = &'static Column> {
        self.columns
            .iter()
            .filter(|c| c.role == ColumnRole::Normal)
    }
}

/// A record that can be written by the entity mapper
pub trait Entity {
    /// Column descriptors for this record type
    fn schema() -> &'static EntitySchema;

    /// Current value of a persisted field, `None` for unknown fields
    fn column_value(&self, field: &str) -> Option<SqlValue>;

    /// Primary key, 0 until persisted
    fn id(&self) -> i64;

    /// Store the generated primary key
    fn set_id(&mut self, id: i64);

    /// Stamp the creation time
    fn set_created_at(&mut self, at: DateTime<Utc>);

    /// Stamp the last update time
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// Collect `(column, value)` pairs for the given descriptors
fn column_values<'a, E: Entity>(
    entity: &E,
    columns: impl Iterator<Item = &'a Column>,
) -> AppResult<Vec<(&'static str, SqlValue)>> {
    columns
        .map(|column| {
            let name = column.name()?;
            let value = entity.column_value(column.field).ok_or_else(|| {
                AppError::internal(format!("Field '{}' has no value accessor.", column.field))
            })?;
            Ok((name, value))
        })
        .collect()
}

impl Tx {
    /// Insert a record into `table`.
    ///
    /// Stamps the creation and update timestamps with the transaction time,
    /// runs `INSERT ... RETURNING id` and writes the generated ID back.
    ///
    /// # Errors
    ///
    /// Returns an `internal` error for invalid column metadata; statement
    /// failures are converted from `sqlx::Error` (unique violations become
    /// `conflict`)
    pub async fn insert<E: Entity + Send>(
        &mut self,
        entity: &mut E,
        table: &str,
    ) -> AppResult<()> {
        let schema = E::schema();
        schema.validate()?;

        let now = self.now();
        entity.set_created_at(now);
        entity.set_updated_at(now);

        let values = column_values(entity, schema.insert_columns())?;
        let columns: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({}) RETURNING id",
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        let query = values
            .into_iter()
            .fold(sqlx::query(&sql), |query, (_, value)| bind_value(query, value));
        let row = query.fetch_one(self.conn()?).await?;
        let id: i64 = row.try_get(0)?;
        entity.set_id(id);

        debug!(table, id, "Inserted record");
        Ok(())
    }

    /// Update a persisted record in `table`, keyed by its ID.
    ///
    /// Stamps a fresh update timestamp. Immutable columns (creation time,
    /// owning scope) are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `invalid` for unsaved records, `not_found` if no row has the
    /// ID, `internal` for invalid column metadata
    pub async fn update<E: Entity + Send>(
        &mut self,
        entity: &mut E,
        table: &str,
    ) -> AppResult<()> {
        let schema = E::schema();
        schema.validate()?;

        let id = entity.id();
        if id == 0 {
            return Err(AppError::invalid_input(
                "Cannot update a record that was never saved.",
            ));
        }

        entity.set_updated_at(self.now());

        let values = column_values(entity, schema.update_columns())?;
        let assignments: Vec<String> = values
            .iter()
            .map(|(name, _)| format!("{name} = ?"))
            .collect();
        let sql = format!("UPDATE {table} SET {} WHERE id = ?", assignments.join(", "));

        let query = values
            .into_iter()
            .fold(sqlx::query(&sql), |query, (_, value)| bind_value(query, value))
            .bind(id);
        let result = query.execute(self.conn()?).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Record"));
        }

        debug!(table, id, "Updated record");
        Ok(())
    }
}
