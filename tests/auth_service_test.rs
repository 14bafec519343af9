// ABOUTME: Integration tests for OAuth credential reconciliation
// ABOUTME: Covers provisioning, email linking, token refresh, conflicts, rollback and concurrency
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

mod common;

use chrono::Duration;
use common::{
    count_rows, create_file_database, create_test_database, github_credential, seed_user,
};
use snippet_server::constants::tables;
use snippet_server::errors::ErrorCode;
use snippet_server::models::{AuthQuery, AuthQueryResult, Credential};
use snippet_server::services::{AuthService, AuthServiceImpl, UserService, UserServiceImpl};

#[tokio::test]
async fn test_new_identity_provisions_user_and_credential() {
    let (db, clock) = create_test_database().await.unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut credential = github_credential("1001", "Ada Lovelace", Some("ada@example.com"));
    auths.create_auth(&mut credential).await.unwrap();

    assert_ne!(credential.id, 0);
    assert_ne!(credential.user_id, 0);
    assert_eq!(count_rows(&db, tables::USERS).await.unwrap(), 1);
    assert_eq!(count_rows(&db, tables::CREDENTIALS).await.unwrap(), 1);

    let owner = credential.user.as_ref().unwrap();
    assert_eq!(owner.id, credential.user_id);
    assert_eq!(owner.email.as_deref(), Some("ada@example.com"));

    // Transaction time is truncated to whole seconds
    let expected = clock.now() - Duration::milliseconds(250);
    assert_eq!(credential.created_at, expected);
    assert_eq!(owner.created_at, expected);

    let users = UserServiceImpl::new(db.clone());
    let stored = users.get_user_by_id(credential.user_id).await.unwrap();
    assert_eq!(stored.name, "Ada Lovelace");
    assert_eq!(stored.credentials.len(), 1);
    assert_eq!(stored.credentials[0].id, credential.id);
    assert_eq!(stored.credentials[0].access_token, "gho_1001");
}

#[tokio::test]
async fn test_existing_email_links_to_existing_user() {
    let (db, _clock) = create_test_database().await.unwrap();
    let existing = seed_user(&db, "Grace Hopper", Some("grace@example.com"))
        .await
        .unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut credential = github_credential("2002", "grace-h", Some("grace@example.com"));
    auths.create_auth(&mut credential).await.unwrap();

    assert_eq!(credential.user_id, existing.id);
    assert_eq!(credential.user.as_ref().unwrap().name, "Grace Hopper");
    assert_eq!(count_rows(&db, tables::USERS).await.unwrap(), 1);
    assert_eq!(count_rows(&db, tables::CREDENTIALS).await.unwrap(), 1);
}

#[tokio::test]
async fn test_email_match_is_case_sensitive() {
    let (db, _clock) = create_test_database().await.unwrap();
    seed_user(&db, "Grace", Some("grace@example.com"))
        .await
        .unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut credential = github_credential("2003", "Grace", Some("Grace@Example.com"));
    auths.create_auth(&mut credential).await.unwrap();

    assert_eq!(count_rows(&db, tables::USERS).await.unwrap(), 2);
}

#[tokio::test]
async fn test_rediscovery_refreshes_tokens_without_duplicates() {
    let (db, clock) = create_test_database().await.unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut first = github_credential("3003", "Linus", Some("linus@example.com"));
    auths.create_auth(&mut first).await.unwrap();

    clock.advance(Duration::minutes(5));
    let expiry = clock.now() + Duration::hours(8);
    let mut second = github_credential("3003", "Linus", Some("linus@example.com"));
    second.access_token = "gho_rotated".into();
    second.refresh_token = Some("ghr_rotated".into());
    second.expiry = Some(expiry);
    auths.create_auth(&mut second).await.unwrap();

    assert_eq!(count_rows(&db, tables::USERS).await.unwrap(), 1);
    assert_eq!(count_rows(&db, tables::CREDENTIALS).await.unwrap(), 1);
    assert_eq!(second.id, first.id);
    assert_eq!(second.user_id, first.user_id);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);

    let stored = auths.get_auth_by_id(first.id).await.unwrap();
    assert_eq!(stored.access_token, "gho_rotated");
    assert_eq!(stored.refresh_token.as_deref(), Some("ghr_rotated"));
    assert_eq!(stored.expiry, Some(expiry));
    assert_eq!(stored.created_at, first.created_at);
    assert_eq!(stored.user.unwrap().id, first.user_id);
}

#[tokio::test]
async fn test_rediscovery_for_a_different_user_is_conflict() {
    let (db, _clock) = create_test_database().await.unwrap();
    let other = seed_user(&db, "Other", Some("other@example.com"))
        .await
        .unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut first = github_credential("4004", "Owner", Some("owner@example.com"));
    auths.create_auth(&mut first).await.unwrap();

    let mut hijack = Credential::new("github", "4004", "gho_other");
    hijack.user_id = other.id;
    let err = auths.create_auth(&mut hijack).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);
    assert_eq!(err.http_status(), 409);

    let stored = auths.get_auth_by_id(first.id).await.unwrap();
    assert_eq!(stored.access_token, "gho_4004");
}

#[tokio::test]
async fn test_transient_user_without_email_is_provisioned() {
    let (db, _clock) = create_test_database().await.unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut first = github_credential("5005", "No Mail", None);
    auths.create_auth(&mut first).await.unwrap();
    let mut second = github_credential("5006", "Blank Mail", Some("  "));
    auths.create_auth(&mut second).await.unwrap();

    assert_ne!(first.user_id, second.user_id);
    assert_eq!(count_rows(&db, tables::USERS).await.unwrap(), 2);
    assert_eq!(second.user.unwrap().email, None);
}

#[tokio::test]
async fn test_missing_owner_is_invalid() {
    let (db, _clock) = create_test_database().await.unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut credential = Credential::new("github", "6006", "gho_6006");
    let err = auths.create_auth(&mut credential).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Invalid);
    assert_eq!(err.message, "User required.");
    assert_eq!(count_rows(&db, tables::CREDENTIALS).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unnamed_new_user_is_rejected_and_nothing_is_written() {
    let (db, _clock) = create_test_database().await.unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut credential = github_credential("6007", "", Some("nameless@example.com"));
    let err = auths.create_auth(&mut credential).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Invalid);
    assert_eq!(err.labels(), ["cannot create user"]);
    assert_eq!(count_rows(&db, tables::USERS).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_credential_insert_rolls_back_new_user() {
    let (db, _clock) = create_test_database().await.unwrap();
    sqlx::query(
        r"
        CREATE TRIGGER fail_credential_insert BEFORE INSERT ON credentials
        BEGIN
            SELECT RAISE(ABORT, 'simulated failure');
        END
        ",
    )
    .execute(db.pool())
    .await
    .unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut credential = github_credential("7007", "Ghost", Some("ghost@example.com"));
    let err = auths.create_auth(&mut credential).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Internal);
    assert_eq!(err.labels(), ["cannot create credential"]);
    assert_eq!(err.user_message(), "Internal error.");

    let mut tx = db.begin().await.unwrap();
    let lookup = tx.find_user_by_email("ghost@example.com").await;
    assert_eq!(lookup.unwrap_err().code, ErrorCode::NotFound);
    tx.rollback().await.unwrap();
    assert_eq!(count_rows(&db, tables::USERS).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_reconciliation_leaves_credential_retryable() {
    let (db, _clock) = create_test_database().await.unwrap();
    sqlx::query(
        r"
        CREATE TRIGGER fail_credential_insert BEFORE INSERT ON credentials
        BEGIN
            SELECT RAISE(ABORT, 'simulated failure');
        END
        ",
    )
    .execute(db.pool())
    .await
    .unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut credential = github_credential("7008", "Retry", Some("retry@example.com"));
    let original = credential.clone();
    let err = auths.create_auth(&mut credential).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Internal);
    assert_eq!(credential.id, 0);
    assert_eq!(credential.user_id, 0);
    assert_eq!(credential.user, original.user);

    sqlx::query("DROP TRIGGER fail_credential_insert")
        .execute(db.pool())
        .await
        .unwrap();

    auths.create_auth(&mut credential).await.unwrap();
    assert_ne!(credential.id, 0);
    assert_eq!(credential.user.as_ref().unwrap().id, credential.user_id);
    assert_eq!(count_rows(&db, tables::USERS).await.unwrap(), 1);
    assert_eq!(count_rows(&db, tables::CREDENTIALS).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_user_validation_keeps_transient_user() {
    let (db, _clock) = create_test_database().await.unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut credential = github_credential("7009", "", Some("later@example.com"));
    let err = auths.create_auth(&mut credential).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Invalid);

    let user = credential.user.as_mut().unwrap();
    assert_eq!(user.email.as_deref(), Some("later@example.com"));
    user.name = "Named Later".into();
    auths.create_auth(&mut credential).await.unwrap();
    assert_eq!(credential.user.unwrap().name, "Named Later");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_new_identities_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_file_database(dir.path()).await.unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let handles: Vec<_> = (0..16)
        .map(|n| {
            let auths = auths.clone();
            tokio::spawn(async move {
                let email = format!("parallel{n}@example.com");
                let mut credential =
                    github_credential(&format!("p{n}"), "Parallel", Some(email.as_str()));
                auths.create_auth(&mut credential).await.map(|()| credential)
            })
        })
        .collect();

    let mut user_ids = Vec::new();
    for handle in handles {
        let credential = handle.await.unwrap().unwrap();
        user_ids.push(credential.user_id);
    }
    user_ids.sort_unstable();
    user_ids.dedup();
    assert_eq!(user_ids.len(), 16);
    assert_eq!(count_rows(&db, tables::USERS).await.unwrap(), 16);
    assert_eq!(count_rows(&db, tables::CREDENTIALS).await.unwrap(), 16);
    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callbacks_for_one_account_link_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_file_database(dir.path()).await.unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let auths = auths.clone();
            tokio::spawn(async move {
                let mut credential = github_credential("same", "Same", Some("same@example.com"));
                credential.access_token = format!("gho_same_{n}");
                auths.create_auth(&mut credential).await.map(|()| credential)
            })
        })
        .collect();

    let mut credential_ids = Vec::new();
    for handle in handles {
        let credential = handle.await.unwrap().unwrap();
        credential_ids.push(credential.id);
    }
    credential_ids.dedup();
    assert_eq!(credential_ids.len(), 1);
    assert_eq!(count_rows(&db, tables::USERS).await.unwrap(), 1);
    assert_eq!(count_rows(&db, tables::CREDENTIALS).await.unwrap(), 1);
    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_links_to_different_users_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_file_database(dir.path()).await.unwrap();
    let mut owners = Vec::new();
    for n in 0..8 {
        let email = format!("owner{n}@example.com");
        owners.push(seed_user(&db, "Owner", Some(email.as_str())).await.unwrap());
    }
    let auths = AuthServiceImpl::new(db.clone());

    let handles: Vec<_> = owners
        .iter()
        .map(|owner| {
            let auths = auths.clone();
            let owner_id = owner.id;
            tokio::spawn(async move {
                let mut credential = Credential::new("github", "contested", "gho_contested");
                credential.user_id = owner_id;
                auths.create_auth(&mut credential).await
            })
        })
        .collect();

    let mut linked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => linked += 1,
            Err(e) => assert_eq!(e.code, ErrorCode::Conflict, "{e}"),
        }
    }
    assert_eq!(linked, 1);
    assert_eq!(count_rows(&db, tables::CREDENTIALS).await.unwrap(), 1);
    db.close().await;
}

#[tokio::test]
async fn test_unknown_lookups_are_not_found() {
    let (db, _clock) = create_test_database().await.unwrap();
    let auths = AuthServiceImpl::new(db.clone());
    let users = UserServiceImpl::new(db.clone());

    let err = users.get_user_by_id(999_999).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.message, "User not found.");
    assert_eq!(err.http_status(), 404);

    let err = auths.get_auth_by_id(999_999).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let mut tx = db.begin().await.unwrap();
    let err = tx
        .find_credential_by_source_id("github", "does-not-exist")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.message, "Auth not found.");
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_query_auths_filters_and_paginates() {
    let (db, _clock) = create_test_database().await.unwrap();
    let auths = AuthServiceImpl::new(db.clone());

    let mut ids = Vec::new();
    for n in 0..3 {
        let mut credential =
            github_credential(&format!("80{n}"), "Margaret", Some("margaret@example.com"));
        auths.create_auth(&mut credential).await.unwrap();
        ids.push(credential.id);
    }
    let mut stranger = github_credential("900", "Stranger", Some("stranger@example.com"));
    auths.create_auth(&mut stranger).await.unwrap();

    let owner_id = auths.get_auth_by_id(ids[0]).await.unwrap().user_id;
    let query = AuthQuery {
        user_id: Some(owner_id),
        limit: 2,
        page: 2,
        ..AuthQuery::default()
    };
    let (page, total) = auths.query_auths(&query).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, ids[2]);

    let query = AuthQuery {
        source: Some("github".into()),
        source_id: Some("900".into()),
        ..AuthQuery::default()
    };
    let result = AuthQueryResult::from(auths.query_auths(&query).await.unwrap());
    assert_eq!(result.total, 1);
    assert_eq!(result.auths[0].id, stranger.id);
}

#[tokio::test]
async fn test_delete_auth_is_not_implemented() {
    let (db, _clock) = create_test_database().await.unwrap();
    let auths = AuthServiceImpl::new(db);

    let err = auths.delete_auth(1).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotImplemented);
    assert_eq!(err.http_status(), 501);
}
