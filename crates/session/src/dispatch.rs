use std::sync::Arc;

use reqwest::{Method, Response, StatusCode, header::AUTHORIZATION};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::session::SessionCore;

/// A rebuildable description of an outbound request.
///
/// Replays after a credential refresh are fresh builds from this value,
/// and the retry budget travels with the call instead of living as a
/// flag on a shared request object.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<P: Into<String>>(path: P) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put<P: Into<String>>(path: P) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete<P: Into<String>>(path: P) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, SessionError> {
        self.body = Some(
            serde_json::to_value(body)
                .map_err(|e| SessionError::MalformedResponse(format!("request body: {e}")))?,
        );
        Ok(self)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Every outbound request to the protected API passes through here.
///
/// The dispatcher attaches the current credential, intercepts 401
/// responses, funnels them through the refresh coordinator, and replays
/// the request at most once with the refreshed credential. Successful
/// responses pass through unmodified.
#[derive(Clone)]
pub struct RequestDispatcher {
    core: Arc<SessionCore>,
}

impl RequestDispatcher {
    pub(crate) fn new(core: Arc<SessionCore>) -> Self {
        Self { core }
    }

    /// Send a request, transparently recovering from a single credential
    /// expiry.
    ///
    /// A request is never replayed more than once: if the backend still
    /// rejects the refreshed credential the session is ended and
    /// [`SessionError::RefreshExhausted`] is returned.
    pub async fn send(&self, request: ApiRequest) -> Result<Response, SessionError> {
        let mut retries_remaining: u8 = 1;
        loop {
            let response = self.execute(&request).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if retries_remaining == 0 {
                warn!(path = %request.path, "still unauthorized after replay, ending session");
                self.core.force_unauthenticated();
                return Err(SessionError::RefreshExhausted);
            }
            retries_remaining -= 1;

            debug!(path = %request.path, "authorization failure, obtaining refreshed credential");
            self.core
                .refresh
                .obtain_refreshed_credential(&self.core)
                .await?;
        }
    }

    /// Send a request and decode a JSON response body.
    ///
    /// Non-2xx statuses (other than the intercepted 401) surface as
    /// retryable errors; payloads that fail to decode surface as
    /// [`SessionError::MalformedResponse`].
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, SessionError> {
        let path = request.path.clone();
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Unreachable(format!(
                "{path} returned {status}"
            )));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SessionError::MalformedResponse(format!("{path}: {e}")))
    }

    async fn execute(&self, request: &ApiRequest) -> Result<Response, SessionError> {
        let url = self.core.config.endpoint(&request.path)?;
        let mut builder = self.core.client.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        // Attach the credential unless it is locally known to be expired;
        // an omitted header turns into a 401 and takes the refresh path.
        if let Some(credential) = self.core.store.load() {
            if !credential.is_expired_now() {
                builder = builder.header(AUTHORIZATION, credential.authorization_value());
            }
        }

        Ok(builder.send().await?)
    }
}
