use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};

use crate::config::{SessionConfig, build_client};
use crate::credential::{Credential, parse_redirect_fragment};
use crate::dispatch::RequestDispatcher;
use crate::error::SessionError;
use crate::identity::{Identity, IdentityPatch, resolve_identity};
use crate::refresh::RefreshCoordinator;
use crate::store::CredentialStore;

/// The single authoritative authentication state, consumed by route
/// guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `initialize` has not run yet.
    Uninitialized,
    /// A stored credential is being verified against the backend. Also
    /// covers the degraded case where verification failed retryably;
    /// the stored credential is kept and `initialize` may be called
    /// again.
    Verifying,
    /// Signed in, profile setup not finished.
    AuthenticatedIncomplete,
    /// Signed in with a complete profile.
    AuthenticatedComplete,
    /// Signed out, or the credential was rejected beyond recovery.
    Unauthenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Verifying => "verifying",
            SessionState::AuthenticatedIncomplete => "authenticated (profile incomplete)",
            SessionState::AuthenticatedComplete => "authenticated",
            SessionState::Unauthenticated => "unauthenticated",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
struct Snapshot {
    state: SessionState,
    identity: Option<Identity>,
}

/// Shared state behind a [`Session`] and its dispatchers.
pub(crate) struct SessionCore {
    pub(crate) config: SessionConfig,
    pub(crate) client: reqwest::Client,
    pub(crate) store: CredentialStore,
    pub(crate) refresh: RefreshCoordinator,
    snapshot: RwLock<Snapshot>,
    /// Serializes state transitions: an `initialize` still in flight
    /// queues a concurrent `logout` or `complete_profile` rather than
    /// interleaving with it.
    transition: tokio::sync::Mutex<()>,
    /// Bumped whenever the session is torn down outside the transition
    /// lock, so a pending verify discards its eventual result instead of
    /// resurrecting a dead session.
    generation: AtomicU64,
}

impl SessionCore {
    pub(crate) fn state(&self) -> SessionState {
        self.snapshot.read().state
    }

    fn set_snapshot(&self, state: SessionState, identity: Option<Identity>) {
        let mut snapshot = self.snapshot.write();
        snapshot.state = state;
        snapshot.identity = identity;
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Tear the session down: clear storage, drop the identity, land in
    /// `Unauthenticated`, and invalidate any pending verify result.
    /// Called from request paths (refresh exhausted, replay rejected) as
    /// well as from `logout`.
    pub(crate) fn force_unauthenticated(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.clear();
        self.set_snapshot(SessionState::Unauthenticated, None);
    }
}

/// An authenticated session against the Stride backend.
///
/// Owns the credential store, the refresh coordinator, and the state
/// machine; hands out [`RequestDispatcher`]s for protected calls. All
/// state transitions are strictly sequential.
#[derive(Clone)]
pub struct Session {
    core: Arc<SessionCore>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let client = build_client(&config)?;
        let store = CredentialStore::open(config.storage_path.clone());
        Ok(Self {
            core: Arc::new(SessionCore {
                config,
                client,
                store,
                refresh: RefreshCoordinator::new(),
                snapshot: RwLock::new(Snapshot {
                    state: SessionState::Uninitialized,
                    identity: None,
                }),
                transition: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        })
    }

    /// Current state, synchronous. This is what route guards read.
    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    /// The verified identity, when one is established.
    pub fn identity(&self) -> Option<Identity> {
        self.core.snapshot.read().identity.clone()
    }

    /// A dispatcher for protected API calls. Cheap to clone.
    pub fn dispatcher(&self) -> RequestDispatcher {
        RequestDispatcher::new(Arc::clone(&self.core))
    }

    /// Verify any stored credential and establish the session state.
    ///
    /// With no stored credential this lands in `Unauthenticated`. A
    /// rejected credential is cleared and also lands in
    /// `Unauthenticated`. A retryable failure (backend unreachable,
    /// unusable payload) keeps the credential, leaves the state in
    /// `Verifying`, and returns the error so the caller can offer a
    /// retry instead of a sign-in prompt.
    pub async fn initialize(&self) -> Result<SessionState, SessionError> {
        let _transition = self.core.transition.lock().await;
        let generation = self.core.generation();

        let Some(credential) = self.core.store.load() else {
            self.core.set_snapshot(SessionState::Unauthenticated, None);
            return Ok(SessionState::Unauthenticated);
        };

        self.core.set_snapshot(SessionState::Verifying, None);
        let resolved = resolve_identity(&self.core.client, &self.core.config, &credential).await;

        if self.core.generation() != generation {
            debug!("session ended while verifying, discarding result");
            return Ok(self.core.state());
        }

        match resolved {
            Ok(identity) => {
                let state = state_for(&identity);
                self.core.store.save_identity(Some(identity.clone()));
                self.core.set_snapshot(state, Some(identity));
                Ok(state)
            }
            Err(SessionError::Unauthorized) => {
                debug!("stored credential rejected, clearing it");
                self.core.store.clear();
                self.core.set_snapshot(SessionState::Unauthenticated, None);
                Ok(SessionState::Unauthenticated)
            }
            Err(e) => {
                // Not signed out, we just could not tell. Stay in the
                // degraded verifying state and keep the credential.
                warn!(error = %e, "could not verify stored credential");
                Err(e)
            }
        }
    }

    /// Establish a session from a freshly issued credential, resolving
    /// the identity from the backend.
    pub async fn login(&self, credential: Credential) -> Result<SessionState, SessionError> {
        let _transition = self.core.transition.lock().await;
        let generation = self.core.generation();

        self.core.store.save(credential.clone());
        self.core.store.save_identity(None);
        self.core.set_snapshot(SessionState::Verifying, None);

        let resolved = resolve_identity(&self.core.client, &self.core.config, &credential).await;

        if self.core.generation() != generation {
            debug!("session ended during login, discarding result");
            return Ok(self.core.state());
        }

        match resolved {
            Ok(identity) => {
                let state = state_for(&identity);
                self.core.store.save_identity(Some(identity.clone()));
                self.core.set_snapshot(state, Some(identity));
                Ok(state)
            }
            Err(SessionError::Unauthorized) => {
                self.core.store.clear();
                self.core.set_snapshot(SessionState::Unauthenticated, None);
                Err(SessionError::Unauthorized)
            }
            Err(e) => {
                // The credential is saved; a later `initialize` can
                // finish the job once the backend is reachable again.
                warn!(error = %e, "could not resolve identity after login");
                Err(e)
            }
        }
    }

    /// [`login`](Session::login) from the redirect the backend issues at
    /// the end of its OAuth flow.
    pub async fn login_from_redirect(&self, redirect: &str) -> Result<SessionState, SessionError> {
        let credential = parse_redirect_fragment(redirect)?;
        self.login(credential).await
    }

    /// Merge a profile patch into the identity.
    ///
    /// The identity update and the resulting state transition happen
    /// under a single write lock, so a route guard can never observe a
    /// half-updated identity.
    pub async fn complete_profile(
        &self,
        patch: IdentityPatch,
    ) -> Result<SessionState, SessionError> {
        let _transition = self.core.transition.lock().await;

        let updated = {
            let mut snapshot = self.core.snapshot.write();
            let identity = match (snapshot.state, snapshot.identity.as_mut()) {
                (
                    SessionState::AuthenticatedIncomplete | SessionState::AuthenticatedComplete,
                    Some(identity),
                ) => identity,
                _ => return Err(SessionError::NotAuthenticated),
            };
            patch.apply(identity);
            let updated = identity.clone();
            snapshot.state = state_for(&updated);
            updated
        };

        self.core.store.save_identity(Some(updated));
        Ok(self.core.state())
    }

    /// Sign out. Always succeeds locally: the backend is notified on a
    /// best-effort basis, and local state is cleared regardless, so a
    /// backend outage can never strand the user in an
    /// authenticated-looking state. Idempotent.
    pub async fn logout(&self) {
        let _transition = self.core.transition.lock().await;

        if let Some(credential) = self.core.store.load() {
            match self.core.config.endpoint("/auth/logout") {
                Ok(url) => {
                    let result = self
                        .core
                        .client
                        .post(url)
                        .header(AUTHORIZATION, credential.authorization_value())
                        .timeout(Duration::from_secs(5))
                        .send()
                        .await;
                    if let Err(e) = result {
                        debug!(error = %e, "backend logout failed, clearing local state anyway");
                    }
                }
                Err(e) => debug!(error = %e, "skipping backend logout"),
            }
        }

        self.core.force_unauthenticated();
    }
}

fn state_for(identity: &Identity) -> SessionState {
    if identity.profile_complete {
        SessionState::AuthenticatedComplete
    } else {
        SessionState::AuthenticatedIncomplete
    }
}
