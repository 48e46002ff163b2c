//! End-to-end sign-in and sign-out against a mock Twitch server

mod common;

use std::sync::Arc;

use anyhow::Result;
use mockito::Matcher;

use common::{session_for, RedirectPrompt, TEST_CLIENT_ID, TEST_STATE};
use streamdata_lib::http_client::{AUTHORIZATION_HEADER, CLIENT_ID_HEADER};
use streamdata_lib::{ErrorCode, SessionState, SignInOutcome, SignOutOutcome, User};

const USER_BODY: &str = r#"{"data":[{"id":"1","login":"foo","display_name":"foo","email":"foo@x.com","profile_image_url":"url"}]}"#;

fn foo() -> User {
    User {
        id: 1,
        display_name: "foo".to_string(),
        email: "foo@x.com".to_string(),
        profile_image_url: "url".to_string(),
    }
}

#[tokio::test]
async fn test_sign_in_fetches_profile_with_bearer_token() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let users = server
        .mock("GET", "/users")
        .match_header("authorization", "Bearer tok1")
        .match_header("client-id", TEST_CLIENT_ID)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(USER_BODY)
        .create_async()
        .await;

    let prompt = Arc::new(RedirectPrompt::approving("tok1"));
    let session = session_for(&server.url(), prompt.clone());

    let outcome = session.sign_in().await?;

    users.assert_async().await;
    assert_eq!(outcome, SignInOutcome::SignedIn(foo()));
    assert_eq!(session.user(), Some(foo()));
    assert!(!session.is_logging_in());
    assert_eq!(
        session.api().default_header(AUTHORIZATION_HEADER).as_deref(),
        Some("Bearer tok1")
    );
    assert!(prompt.urls()[0].contains(&format!("state={}", TEST_STATE)));

    Ok(())
}

#[tokio::test]
async fn test_state_mismatch_never_calls_api() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let users = server
        .mock("GET", "/users")
        .with_status(200)
        .with_body(USER_BODY)
        .expect(0)
        .create_async()
        .await;

    let prompt = Arc::new(RedirectPrompt::approving("tok1").with_state("wrong"));
    let session = session_for(&server.url(), prompt);

    let err = session.sign_in().await.unwrap_err();

    users.assert_async().await;
    assert_eq!(err.code(), ErrorCode::AccessDenied);
    assert!(err.to_string().contains("access_denied"));
    assert_eq!(session.snapshot(), SessionState::default());
    assert_eq!(session.api().default_header(AUTHORIZATION_HEADER), None);

    Ok(())
}

#[tokio::test]
async fn test_unauthorized_profile_leaves_session_signed_out() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/users")
        .with_status(401)
        .with_body(r#"{"error":"Unauthorized","status":401,"message":"Invalid OAuth token"}"#)
        .create_async()
        .await;

    let session = session_for(&server.url(), Arc::new(RedirectPrompt::approving("tok1")));

    let err = session.sign_in().await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::ApiRequestFailed);
    assert!(err.to_string().contains("401"));
    assert!(!session.is_logging_in());
    assert!(!session.is_authenticated());
    assert_eq!(session.api().default_header(AUTHORIZATION_HEADER), None);

    Ok(())
}

#[tokio::test]
async fn test_sign_out_revokes_token() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/users")
        .with_status(200)
        .with_body(USER_BODY)
        .create_async()
        .await;
    let revoke = server
        .mock("POST", "/oauth2/revoke")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("client_id".into(), TEST_CLIENT_ID.into()),
            Matcher::UrlEncoded("token".into(), "tok1".into()),
        ]))
        .with_status(200)
        .create_async()
        .await;

    let session = session_for(&server.url(), Arc::new(RedirectPrompt::approving("tok1")));
    session.sign_in().await?;

    assert_eq!(session.sign_out().await, SignOutOutcome::Revoked);

    revoke.assert_async().await;
    assert_eq!(session.snapshot(), SessionState::default());
    assert_eq!(session.api().default_header(AUTHORIZATION_HEADER), None);
    assert_eq!(
        session.api().default_header(CLIENT_ID_HEADER).as_deref(),
        Some(TEST_CLIENT_ID)
    );

    Ok(())
}

#[tokio::test]
async fn test_sign_out_clears_session_when_revocation_rejected() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/users")
        .with_status(200)
        .with_body(USER_BODY)
        .create_async()
        .await;
    server
        .mock("POST", "/oauth2/revoke")
        .with_status(400)
        .with_body(r#"{"status":400,"message":"Invalid token"}"#)
        .create_async()
        .await;

    let session = session_for(&server.url(), Arc::new(RedirectPrompt::approving("tok1")));
    session.sign_in().await?;
    let mut watcher = session.subscribe();

    assert_eq!(session.sign_out().await, SignOutOutcome::RevocationFailed);

    assert!(watcher.has_changed()?);
    let state = watcher.borrow_and_update().clone();
    assert_eq!(state, SessionState::default());
    assert_eq!(session.api().default_header(AUTHORIZATION_HEADER), None);

    // A second sign-out sends nothing and ends in the same state
    assert_eq!(session.sign_out().await, SignOutOutcome::NoToken);
    assert_eq!(session.snapshot(), SessionState::default());

    Ok(())
}
