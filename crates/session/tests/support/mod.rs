//! In-process mock backend for session tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tempfile::TempDir;
use url::Url;

use stride_session::{Credential, CredentialStore, Session, SessionConfig};

/// A tiny backend with counters, so tests can assert exactly how many
/// refresh calls went over the wire.
#[derive(Clone)]
pub struct Backend {
    pub refresh_calls: Arc<AtomicUsize>,
    pub whoami_calls: Arc<AtomicUsize>,
    pub ping_calls: Arc<AtomicUsize>,
    state: Arc<Mutex<BackendState>>,
}

struct BackendState {
    valid_access: String,
    valid_refresh: String,
    reject_refresh: bool,
    refresh_delay: Duration,
    whoami_delay: Duration,
    profile_complete: bool,
    /// When set, protected endpoints reject every token, refreshed or not.
    reject_all_access: bool,
}

impl Backend {
    pub fn new() -> Self {
        Self {
            refresh_calls: Arc::new(AtomicUsize::new(0)),
            whoami_calls: Arc::new(AtomicUsize::new(0)),
            ping_calls: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(Mutex::new(BackendState {
                valid_access: "access-0".to_owned(),
                valid_refresh: "refresh-0".to_owned(),
                reject_refresh: false,
                refresh_delay: Duration::ZERO,
                whoami_delay: Duration::ZERO,
                profile_complete: true,
                reject_all_access: false,
            })),
        }
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.lock().unwrap().refresh_delay = delay;
    }

    pub fn set_whoami_delay(&self, delay: Duration) {
        self.state.lock().unwrap().whoami_delay = delay;
    }

    pub fn set_reject_refresh(&self, reject: bool) {
        self.state.lock().unwrap().reject_refresh = reject;
    }

    pub fn set_reject_all_access(&self, reject: bool) {
        self.state.lock().unwrap().reject_all_access = reject;
    }

    pub fn set_profile_complete(&self, complete: bool) {
        self.state.lock().unwrap().profile_complete = complete;
    }

    pub fn valid_access(&self) -> String {
        self.state.lock().unwrap().valid_access.clone()
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn ping_count(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.state.lock().unwrap().valid_access);
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }
}

async fn whoami(State(backend): State<Backend>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    backend.whoami_calls.fetch_add(1, Ordering::SeqCst);
    let delay = backend.state.lock().unwrap().whoami_delay;
    tokio::time::sleep(delay).await;

    if !backend.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" })));
    }
    let profile_complete = backend.state.lock().unwrap().profile_complete;
    (
        StatusCode::OK,
        Json(json!({
            "user": { "userId": "u1", "name": "Hana" },
            "profileComplete": profile_complete
        })),
    )
}

async fn refresh(
    State(backend): State<Backend>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = backend.state.lock().unwrap().refresh_delay;
    tokio::time::sleep(delay).await;

    let mut state = backend.state.lock().unwrap();
    let presented = body
        .get("refreshToken")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if state.reject_refresh || presented != state.valid_refresh {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid refresh token" })),
        );
    }

    let n = backend.refresh_calls.load(Ordering::SeqCst);
    state.valid_access = format!("access-{n}");
    state.valid_refresh = format!("refresh-{n}");
    (
        StatusCode::OK,
        Json(json!({
            "accessToken": state.valid_access,
            "refreshToken": state.valid_refresh,
            "tokenType": "Bearer",
            "expiresIn": 3600
        })),
    )
}

async fn ping(State(backend): State<Backend>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    backend.ping_calls.fetch_add(1, Ordering::SeqCst);
    let reject_all = backend.state.lock().unwrap().reject_all_access;
    if reject_all || !backend.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" })));
    }
    (StatusCode::OK, Json(json!({ "ok": true })))
}

async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Serve the backend on an ephemeral port and return its base URL.
pub async fn spawn(backend: Backend) -> Url {
    let app = Router::new()
        .route("/auth/me", get(whoami))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/ping", get(ping))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// An address nothing is listening on, for unreachable-backend tests.
pub async fn dead_base_url() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}")).unwrap()
}

pub fn credential(access: &str, refresh: &str, expires_at_epoch_ms: Option<i64>) -> Credential {
    Credential {
        access_token: access.to_owned(),
        refresh_token: refresh.to_owned(),
        token_type: "Bearer".to_owned(),
        expires_at_epoch_ms,
    }
}

/// A session whose store is pre-seeded with `credential`, as if a login
/// had happened in an earlier process.
pub fn seeded_session(
    base_url: Url,
    credential: Credential,
) -> (Session, TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    CredentialStore::open(Some(path.clone())).save(credential);

    let config = SessionConfig::new(base_url)
        .with_storage_path(path.clone())
        .with_timeout(Duration::from_secs(5));
    let session = Session::new(config).unwrap();
    (session, dir, path)
}
