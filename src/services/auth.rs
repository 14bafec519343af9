// ABOUTME: Identity reconciliation turning OAuth callback credentials into linked local users
// ABOUTME: Refreshes known credentials, links by email, or provisions new users atomically
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

//! # OAuth identity reconciliation
//!
//! [`AuthService::create_auth`] runs on every authentication callback. Inside a
//! single transaction it decides between three outcomes:
//!
//! 1. The provider account is already linked: its tokens and expiry are
//!    refreshed and nothing else changes.
//! 2. The credential carries a transient user whose email matches an existing
//!    user: the credential is linked to that account.
//! 3. Otherwise the transient user is provisioned and the credential is
//!    linked to it.
//!
//! Each call holds the database write lock for its whole transaction, so
//! concurrent callbacks run one after another: a second callback for the same
//! provider account sees the first one's row and takes the refresh branch.
//! The unique constraints on `credentials(source, source_id)` and
//! `users(email)` back this up; a violation surfaces as `conflict`.
//!
//! Nothing from a failed call is committed and the caller's credential is left
//! exactly as it was passed in, so the same value can be retried.

use async_trait::async_trait;
use snippet_core::constants::tables;
use snippet_core::models::{AuthQuery, Credential, User};
use tracing::{debug, info};

use super::finish;
use crate::database::{Database, Tx};
use crate::errors::{AppError, AppResult, ErrorCode};

/// OAuth credential management
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Get a credential by ID with its owning user attached
    async fn get_auth_by_id(&self, id: i64) -> AppResult<Credential>;

    /// Credentials matching the query plus the unpaginated total
    async fn query_auths(&self, query: &AuthQuery) -> AppResult<(Vec<Credential>, i64)>;

    /// Reconcile a provider credential with the local user base.
    ///
    /// If `credential.user_id` is 0 and `credential.user` is set, the user is
    /// looked up by email and created when missing. On success
    /// `credential.id` and `credential.user_id` are populated; on failure
    /// `credential` is unchanged.
    async fn create_auth(&self, credential: &mut Credential) -> AppResult<()>;

    /// Remove a credential
    async fn delete_auth(&self, id: i64) -> AppResult<()>;
}

/// `SQLite` implementation of [`AuthService`]
#[derive(Debug, Clone)]
pub struct AuthServiceImpl {
    db: Database,
}

impl AuthServiceImpl {
    /// Create a new `AuthService` with the given database connection
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn get_auth_by_id(&self, id: i64) -> AppResult<Credential> {
        let mut tx = self.db.begin().await?;
        let result = tx.find_credential_by_id(id).await;
        finish(tx, result).await
    }

    async fn query_auths(&self, query: &AuthQuery) -> AppResult<(Vec<Credential>, i64)> {
        let mut tx = self.db.begin().await?;
        let result = tx.find_credentials(query).await;
        finish(tx, result).await
    }

    async fn create_auth(&self, credential: &mut Credential) -> AppResult<()> {
        let mut tx = self.db.begin_write().await?;
        let mut reconciled = credential.clone();
        let result = reconcile(&mut tx, &mut reconciled).await;
        finish(tx, result).await?;

        *credential = reconciled;
        Ok(())
    }

    async fn delete_auth(&self, _id: i64) -> AppResult<()> {
        Err(AppError::not_implemented("Deleting auths"))
    }
}

async fn reconcile(tx: &mut Tx, credential: &mut Credential) -> AppResult<()> {
    let lookup = tx
        .find_credential_by_source_id(&credential.source, &credential.source_id)
        .await;
    match lookup {
        Ok(existing) => return refresh_credential(tx, credential, existing).await,
        Err(e) if e.code == ErrorCode::NotFound => {}
        Err(e) => return Err(e.wrap("find credential by source id failed")),
    }

    if credential.user_id == 0 {
        if let Some(user) = credential.user.take() {
            let owner = resolve_owner(tx, user).await?;
            credential.user_id = owner.id;
            credential.user = Some(owner);
        }
    }

    credential.validate()?;
    tx.insert(credential, tables::CREDENTIALS)
        .await
        .map_err(|e| e.wrap("cannot create credential"))?;

    info!(
        credential.id = credential.id,
        user.id = credential.user_id,
        source = %credential.source,
        "Linked new credential"
    );
    Ok(())
}

/// Find the user owning `candidate`'s email, or provision `candidate`
async fn resolve_owner(tx: &mut Tx, mut candidate: User) -> AppResult<User> {
    if let Some(email) = candidate.link_email() {
        match tx.find_user_by_email(email).await {
            Ok(existing) => {
                debug!(user.id = existing.id, "Linking credential to existing user");
                return Ok(existing);
            }
            Err(e) if e.code == ErrorCode::NotFound => {}
            Err(e) => return Err(e.wrap("find user by email failed")),
        }
    } else {
        candidate.email = None;
    }

    candidate
        .validate()
        .map_err(|e| e.wrap("cannot create user"))?;
    tx.insert(&mut candidate, tables::USERS)
        .await
        .map_err(|e| e.wrap("cannot create user"))?;

    info!(user.id = candidate.id, "Provisioned new user");
    Ok(candidate)
}

/// Rotate the tokens of an already linked provider account
async fn refresh_credential(
    tx: &mut Tx,
    incoming: &mut Credential,
    mut existing: Credential,
) -> AppResult<()> {
    if incoming.user_id != 0 && incoming.user_id != existing.user_id {
        return Err(AppError::conflict("Auth is already linked to a different user."));
    }

    existing.access_token.clone_from(&incoming.access_token);
    existing.refresh_token.clone_from(&incoming.refresh_token);
    existing.expiry = incoming.expiry;
    existing.validate()?;

    tx.update(&mut existing, tables::CREDENTIALS)
        .await
        .map_err(|e| e.wrap("cannot update credential"))?;
    existing.user = Some(tx.find_user_by_id(existing.user_id).await?);

    info!(
        credential.id = existing.id,
        user.id = existing.user_id,
        source = %existing.source,
        "Refreshed credential tokens"
    );
    *incoming = existing;
    Ok(())
}
