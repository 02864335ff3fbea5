use thiserror::Error;

/// Failure classes for session and request handling.
///
/// The distinction between [`Unauthorized`](SessionError::Unauthorized)
/// and [`Unreachable`](SessionError::Unreachable) is load-bearing: only a
/// credential rejection may trigger a refresh or end the session, while
/// transport failures are always surfaced as retryable.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("credential rejected by the backend")]
    Unauthorized,
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("token refresh failed, sign-in required")]
    RefreshExhausted,
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
    #[error("no credential is stored")]
    NotAuthenticated,
    #[error("invalid login redirect: {0}")]
    InvalidRedirect(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http client error: {0}")]
    Client(String),
}

impl SessionError {
    /// Whether the operation may be retried without re-authenticating.
    ///
    /// Malformed payloads count as retryable: the session itself may
    /// still be valid, only this response was unusable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Unreachable(_) | SessionError::MalformedResponse(_)
        )
    }
}

// reqwest errors out of `send()`/`bytes()` are transport-level; HTTP
// status codes are classified at the call sites.
impl From<reqwest::Error> for SessionError {
    fn from(error: reqwest::Error) -> Self {
        SessionError::Unreachable(error.to_string())
    }
}
