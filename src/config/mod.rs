// ABOUTME: Configuration module for environment-driven server settings
// ABOUTME: Exposes the database connection configuration loaded at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

//! Configuration module for the snippet server
//!
//! All settings come from environment variables; there is no configuration
//! file. The host binary may override individual values from its command line.

/// Database connection configuration
pub mod database;

pub use database::{DatabaseConfig, DatabaseUrl};
