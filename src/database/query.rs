// ABOUTME: Query parameter values, IN-clause expansion, and pagination helpers
// ABOUTME: Binds dynamic values onto SQLite queries without per-call bind chains
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

//! Query parameters
//!
//! IN-list rebinding is available both as the pure [`build_in_query`] rewrite
//! and, inside a transaction, as [`Tx::fetch_all_in`], which expands, binds
//! and runs the statement in one step.

use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::Sqlite;

use super::Tx;
use crate::errors::{AppError, AppResult};

/// Largest list bound to a single `IN (...)`, well under `SQLite`'s
/// bound-parameter limit
pub const MAX_IN_LIST_LEN: usize = 500;

/// A value that can be bound to a query parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// `INTEGER`
    Integer(i64),
    /// `TEXT`
    Text(String),
    /// Nullable `TEXT`
    OptionalText(Option<String>),
    /// Timestamp stored as RFC 3339 text
    Timestamp(DateTime<Utc>),
    /// Nullable timestamp
    OptionalTimestamp(Option<DateTime<Utc>>),
}

/// Argument for [`build_in_query`]: a single value or a list expanded in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryArg {
    /// Binds to one placeholder
    Value(SqlValue),
    /// Expands one placeholder into one per element, for `IN (?)`
    List(Vec<SqlValue>),
}

pub(super) type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind one value onto a query
pub(super) fn bind_value(query: SqliteQuery<'_>, value: SqlValue) -> SqliteQuery<'_> {
    match value {
        SqlValue::Integer(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::OptionalText(v) => query.bind(v),
        SqlValue::Timestamp(v) => query.bind(v),
        SqlValue::OptionalTimestamp(v) => query.bind(v),
    }
}

/// Bind values in order
pub(super) fn bind_values(
    query: SqliteQuery<'_>,
    values: impl IntoIterator<Item = SqlValue>,
) -> SqliteQuery<'_> {
    values.into_iter().fold(query, bind_value)
}

/// `WHERE` clause joining conditions with `AND`, empty if there are none
pub(super) fn where_clause(conditions: &[&str]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

/// Expand list arguments of a `?`-parameterized query.
///
/// Each `?` consumes one argument. A [`QueryArg::List`] turns its `?` into
/// `?, ?, ...` with one placeholder per element, so
/// `"... WHERE user_id IN (?)"` can be bound to any number of IDs. Returns the
/// rewritten SQL and the flattened values. Placeholders inside string
/// literals are not supported.
///
/// # Errors
///
/// Returns an `internal` error if the placeholder and argument counts differ
/// or a list argument is empty
pub fn build_in_query(base: &str, args: Vec<QueryArg>) -> AppResult<(String, Vec<SqlValue>)> {
    let placeholders = base.matches('?').count();
    if placeholders != args.len() {
        return Err(AppError::internal(format!(
            "Query has {placeholders} placeholders but {} arguments were supplied.",
            args.len()
        )));
    }

    let mut sql = String::with_capacity(base.len());
    let mut values = Vec::with_capacity(args.len());
    let mut args = args.into_iter();
    for ch in base.chars() {
        if ch != '?' {
            sql.push(ch);
            continue;
        }
        match args.next() {
            Some(QueryArg::Value(value)) => {
                sql.push('?');
                values.push(value);
            }
            Some(QueryArg::List(list)) => {
                if list.is_empty() {
                    return Err(AppError::internal("Empty list bound to IN clause."));
                }
                sql.push_str(&vec!["?"; list.len()].join(", "));
                values.extend(list);
            }
            None => return Err(AppError::internal("Query ran out of arguments.")),
        }
    }

    Ok((sql, values))
}

impl Tx {
    /// Run a `?`-parameterized `SELECT` after expanding its list arguments
    /// with [`build_in_query`]
    ///
    /// # Errors
    ///
    /// Returns an `internal` error for mismatched or empty list arguments, or
    /// the converted database error if the query fails
    pub async fn fetch_all_in(
        &mut self,
        base: &str,
        args: Vec<QueryArg>,
    ) -> AppResult<Vec<SqliteRow>> {
        let (sql, values) = build_in_query(base, args)?;
        let rows = bind_values(sqlx::query(&sql), values)
            .fetch_all(self.conn()?)
            .await?;
        Ok(rows)
    }
}

/// SQL suffix for a limit and 1-based page.
///
/// Clauses are only added if limit and/or page are set.
#[must_use]
pub fn format_limit_offset(limit: u32, page: u32) -> String {
    if limit > 0 && page > 1 {
        format!("LIMIT {limit} OFFSET {}", u64::from(page - 1) * u64::from(limit))
    } else if limit > 0 {
        format!("LIMIT {limit}")
    } else {
        String::new()
    }
}
