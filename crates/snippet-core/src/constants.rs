// ABOUTME: Application-wide constants for OAuth providers and identity records
// ABOUTME: Provider identifiers and avatar endpoints shared by models and services
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

/// OAuth provider constants
pub mod oauth {
    /// GitHub authentication source. Other providers plug in with their own source name.
    pub const AUTH_SOURCE_GITHUB: &str = "github";

    /// Base URL of GitHub-hosted avatar images, keyed by the GitHub user ID
    pub const GITHUB_AVATAR_BASE_URL: &str = "https://avatars1.githubusercontent.com/u";
}

/// Persisted table names
pub mod tables {
    /// Users table
    pub const USERS: &str = "users";

    /// OAuth credential links
    pub const CREDENTIALS: &str = "credentials";
}
