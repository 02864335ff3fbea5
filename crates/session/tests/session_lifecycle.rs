//! State-machine behavior across startup, login, profile completion, and
//! logout, including the required distinction between "credential
//! rejected" and "backend unreachable".

mod support;

use std::time::Duration;

use serde_json::Value;
use support::{Backend, credential, dead_base_url, seeded_session, spawn};

use stride_session::{
    ApiRequest, CredentialStore, GuardDecision, Route, RouteGuard, SessionError, SessionState,
    parse_redirect_fragment,
};

#[tokio::test]
async fn rejected_credential_at_startup_clears_and_signs_out() {
    let backend = Backend::new();
    let base_url = spawn(backend.clone()).await;

    // Expired an hour ago, and the backend no longer accepts it either.
    let hour_ago = stride_session::Credential {
        expires_at_epoch_ms: Some(1),
        ..credential("stale", "refresh-gone", None)
    };
    let (session, _dir, path) = seeded_session(base_url, hour_ago);

    let state = session.initialize().await.unwrap();
    assert_eq!(state, SessionState::Unauthenticated);
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(session.identity().is_none());
    assert!(CredentialStore::open(Some(path)).load().is_none());
}

#[tokio::test]
async fn unreachable_backend_is_not_a_sign_out() {
    let base_url = dead_base_url().await;
    let (session, _dir, path) = seeded_session(base_url, credential("access-0", "refresh-0", None));

    let result = session.initialize().await;
    let error = result.unwrap_err();
    assert!(error.is_retryable(), "expected retryable, got {error:?}");

    // Distinguishable from a sign-out: state is still settling and the
    // credential survives for a later retry.
    assert_eq!(session.state(), SessionState::Verifying);
    assert!(CredentialStore::open(Some(path)).load().is_some());
}

#[tokio::test]
async fn login_then_profile_completion_updates_guards_atomically() {
    let backend = Backend::new();
    backend.set_profile_complete(false);
    let base_url = spawn(backend.clone()).await;

    let (session, _dir, _path) = seeded_session(base_url, credential("ignored", "r", None));

    let fragment = "accessToken=access-0&refreshToken=refresh-0&tokenType=Bearer&expiresIn=3600";
    let state = session.login_from_redirect(fragment).await.unwrap();
    assert_eq!(state, SessionState::AuthenticatedIncomplete);

    assert_eq!(
        RouteGuard::RequiresIncomplete.evaluate(session.state()),
        GuardDecision::Allow
    );
    assert_eq!(
        RouteGuard::RequiresComplete.evaluate(session.state()),
        GuardDecision::Redirect(Route::ProfileSetup)
    );

    let state = session
        .complete_profile(stride_session::IdentityPatch::completed())
        .await
        .unwrap();
    assert_eq!(state, SessionState::AuthenticatedComplete);

    // A guard checked immediately afterwards admits the user.
    assert_eq!(
        RouteGuard::RequiresComplete.evaluate(session.state()),
        GuardDecision::Allow
    );
    assert!(session.identity().unwrap().profile_complete);
}

#[tokio::test]
async fn rejected_login_clears_the_saved_credential() {
    let backend = Backend::new();
    let base_url = spawn(backend.clone()).await;

    let (session, _dir, path) = seeded_session(base_url.clone(), credential("x", "y", None));

    let result = session
        .login(parse_redirect_fragment("accessToken=wrong&refreshToken=nope").unwrap())
        .await;
    assert!(matches!(result, Err(SessionError::Unauthorized)));
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(CredentialStore::open(Some(path)).load().is_none());
}

#[tokio::test]
async fn logout_is_idempotent() {
    let backend = Backend::new();
    let base_url = spawn(backend.clone()).await;

    let (session, _dir, path) = seeded_session(base_url, credential("access-0", "refresh-0", None));
    let state = session.initialize().await.unwrap();
    assert_eq!(state, SessionState::AuthenticatedComplete);

    session.logout().await;
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(CredentialStore::open(Some(path.clone())).load().is_none());

    // A second logout is a no-op, not an error.
    session.logout().await;
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(CredentialStore::open(Some(path)).load().is_none());
}

#[tokio::test]
async fn session_teardown_discards_a_pending_verify_result() {
    let backend = Backend::new();
    backend.set_whoami_delay(Duration::from_millis(300));
    backend.set_reject_all_access(true);
    backend.set_reject_refresh(true);
    let base_url = spawn(backend.clone()).await;

    let (session, _dir, path) = seeded_session(base_url, credential("access-0", "refresh-0", None));

    // Start a verify that will succeed, slowly.
    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.initialize().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Meanwhile a protected request exhausts its refresh and tears the
    // session down.
    let dispatcher = session.dispatcher();
    let result = dispatcher.send_json::<Value>(ApiRequest::get("/ping")).await;
    assert!(matches!(result, Err(SessionError::RefreshExhausted)));
    assert_eq!(session.state(), SessionState::Unauthenticated);

    // The verify settles afterwards; its result must be discarded rather
    // than resurrecting the session.
    let state = pending.await.unwrap().unwrap();
    assert_eq!(state, SessionState::Unauthenticated);
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(CredentialStore::open(Some(path)).load().is_none());
}

#[tokio::test]
async fn logout_queues_behind_a_pending_initialize() {
    let backend = Backend::new();
    backend.set_whoami_delay(Duration::from_millis(200));
    let base_url = spawn(backend.clone()).await;

    let (session, _dir, _path) = seeded_session(base_url, credential("access-0", "refresh-0", None));

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.initialize().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Applied strictly after the initialize settles; the end state is
    // the logout's, not the verify's.
    session.logout().await;

    pending.await.unwrap().unwrap();
    assert_eq!(session.state(), SessionState::Unauthenticated);
}
