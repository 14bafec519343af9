// ABOUTME: Core types and constants for the snippet server identity layer
// ABOUTME: Foundation crate with the error taxonomy, identity models, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

#![deny(unsafe_code)]

//! # Snippet Core
//!
//! Foundation crate shared by the server and its tests. It is kept free of
//! database and transport dependencies (sqlx only behind the
//! `database-errors` feature) so it changes rarely.
//!
//! ## Modules
//!
//! - **errors**: Closed error taxonomy with `AppError`, `ErrorCode` and status mapping
//! - **models**: `User` and `Credential` records plus their query filters
//! - **constants**: Provider identifiers and table names

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Identity data models (User, Credential, query filters)
pub mod models;
