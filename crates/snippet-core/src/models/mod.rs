// ABOUTME: Identity data models for users and their linked OAuth credentials
// ABOUTME: Re-exports User, Credential and the query/filter types used by services
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

//! # Data Models
//!
//! A [`User`] is the durable local identity. A [`Credential`] ties one
//! external OAuth account (`source`, `source_id`) to exactly one user, so a
//! single user can sign in through several providers.

mod credential;
mod user;

pub use credential::{AuthQuery, AuthQueryResult, Credential};
pub use user::{User, UserQuery, UserQueryResult, UserUpdate};
