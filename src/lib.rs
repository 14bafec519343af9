// ABOUTME: Main library entry point for the snippet server backend
// ABOUTME: OAuth identity reconciliation on top of a transactional entity persistence layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

#![deny(unsafe_code)]

//! # Snippet Server
//!
//! Backend core of an OAuth-authenticated web application. It resolves
//! third-party login credentials into durable local users and persists users
//! and credentials in `SQLite`.
//!
//! ## Architecture
//!
//! - **Config**: environment-driven database and logging settings
//! - **Database**: connection lifetime, migrations, the transaction context,
//!   the entity mapper and identity store lookups
//! - **Services**: `AuthService` (credential reconciliation) and `UserService`
//! - **Errors**: the closed error taxonomy shared with the HTTP layer
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use snippet_server::database::Database;
//! use snippet_server::errors::AppResult;
//! use snippet_server::models::{Credential, User};
//! use snippet_server::services::{AuthService, AuthServiceImpl};
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let db = Database::new("sqlite::memory:").await?;
//!     let auths = AuthServiceImpl::new(db.clone());
//!
//!     let mut credential = Credential::new("github", "1024", "gho_token")
//!         .with_user(User::new("Ada", Some("ada@example.com".to_owned())));
//!     auths.create_auth(&mut credential).await?;
//!
//!     db.close().await;
//!     Ok(())
//! }
//! ```

/// Environment-driven configuration
pub mod config;

/// Connection management, transactions, entity mapping and identity store
pub mod database;

/// Structured logging setup
pub mod logging;

/// Domain services handed to the HTTP layer
pub mod services;

pub use snippet_core::{constants, errors, models};
