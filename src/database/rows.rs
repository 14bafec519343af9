// ABOUTME: SQLite row to model conversion for users and credentials
// ABOUTME: Reports missing or mistyped columns as internal errors naming the column
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

use snippet_core::models::{Credential, User};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, Type};

use crate::errors::{AppError, AppResult};

/// Column list shared by every user `SELECT`
pub(super) const USER_COLUMNS: &str = "id, name, email, created_at, updated_at";

/// Column list shared by every credential `SELECT`
pub(super) const CREDENTIAL_COLUMNS: &str =
    "id, user_id, source, source_id, access_token, refresh_token, expiry, created_at, updated_at";

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> AppResult<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name).map_err(|e| {
        AppError::internal(format!("Failed to get column '{name}': {e}")).with_source(e)
    })
}

/// Parse a user from a row selected with [`USER_COLUMNS`]. Credentials are left empty.
pub(super) fn parse_user_row(row: &SqliteRow) -> AppResult<User> {
    Ok(User {
        id: column(row, "id")?,
        name: column(row, "name")?,
        email: column(row, "email")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        credentials: Vec::new(),
    })
}

/// Parse a credential from a row selected with [`CREDENTIAL_COLUMNS`]
pub(super) fn parse_credential_row(row: &SqliteRow) -> AppResult<Credential> {
    Ok(Credential {
        id: column(row, "id")?,
        user_id: column(row, "user_id")?,
        user: None,
        source: column(row, "source")?,
        source_id: column(row, "source_id")?,
        access_token: column(row, "access_token")?,
        refresh_token: column(row, "refresh_token")?,
        expiry: column(row, "expiry")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

/// Parse every row with `parse`
pub(super) fn parse_rows<T>(
    rows: &[SqliteRow],
    parse: fn(&SqliteRow) -> AppResult<T>,
) -> AppResult<Vec<T>> {
    rows.iter().map(parse).collect()
}
