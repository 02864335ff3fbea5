//! De-duplicated token refresh.
//!
//! When an access credential expires, every in-flight request observes a
//! 401 at roughly the same time. This coordinator guarantees that exactly
//! one `POST /auth/refresh` call is issued regardless of how many callers
//! need it: the first caller becomes the leader, everyone else is queued
//! and receives the leader's outcome in arrival order.

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::credential::{Credential, TokenGrant};
use crate::error::SessionError;
use crate::session::SessionCore;

type RefreshResult = Result<Credential, SessionError>;

pub(crate) struct RefreshCoordinator {
    slot: Mutex<RefreshSlot>,
}

#[derive(Default)]
struct RefreshSlot {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<RefreshResult>>,
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(RefreshSlot::default()),
        }
    }

    /// Obtain a refreshed credential, joining an in-flight refresh when
    /// one exists.
    ///
    /// Failure semantics: a rejection from the refresh endpoint is
    /// terminal for the session (store cleared, state machine driven to
    /// unauthenticated, `RefreshExhausted` broadcast). A transport
    /// failure leaves the stored credential untouched and is broadcast
    /// as `Unreachable`; callers may retry later.
    pub(crate) async fn obtain_refreshed_credential(&self, core: &SessionCore) -> RefreshResult {
        let waiter = {
            let mut slot = self.slot.lock();
            if slot.in_flight {
                let (tx, rx) = oneshot::channel();
                slot.waiters.push(tx);
                Some(rx)
            } else {
                slot.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            debug!("refresh already in flight, queueing");
            return match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(SessionError::Unreachable(
                    "refresh aborted before settling".to_owned(),
                )),
            };
        }

        // Leader path. The settle guard releases the slot and drains the
        // queue even if this future is dropped mid-call.
        let mut settle = Settle {
            coordinator: self,
            outcome: None,
        };
        let outcome = run_refresh(core).await;
        settle.outcome = Some(outcome.clone());
        drop(settle);
        outcome
    }
}

struct Settle<'a> {
    coordinator: &'a RefreshCoordinator,
    outcome: Option<RefreshResult>,
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| {
            Err(SessionError::Unreachable(
                "refresh aborted before settling".to_owned(),
            ))
        });
        let waiters = {
            let mut slot = self.coordinator.slot.lock();
            slot.in_flight = false;
            std::mem::take(&mut slot.waiters)
        };
        // Arrival order; receivers that gave up are ignored.
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

async fn run_refresh(core: &SessionCore) -> RefreshResult {
    let Some(current) = core.store.load() else {
        warn!("refresh requested with no stored credential");
        core.force_unauthenticated();
        return Err(SessionError::RefreshExhausted);
    };
    if current.refresh_token.is_empty() {
        warn!("no refresh token available, ending session");
        core.force_unauthenticated();
        return Err(SessionError::RefreshExhausted);
    }

    let url = core.config.endpoint("/auth/refresh")?;
    debug!("refreshing access credential");

    // Issued on the bare client: the refresh call must not pass through
    // the dispatcher's own 401 interception.
    let response = core
        .client
        .post(url)
        .json(&serde_json::json!({ "refreshToken": current.refresh_token }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        // A rejected refresh token is never retried; the user must sign
        // in again.
        warn!(%status, "refresh rejected, ending session");
        core.force_unauthenticated();
        return Err(SessionError::RefreshExhausted);
    }

    let bytes = response.bytes().await?;
    let grant: TokenGrant = serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::MalformedResponse(e.to_string()))?;

    let refreshed = grant.into_credential(Some(current.refresh_token));
    core.store.save(refreshed.clone());
    debug!("credential refresh successful");
    Ok(refreshed)
}
