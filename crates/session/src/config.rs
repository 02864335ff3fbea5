use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use crate::error::SessionError;

pub const DEFAULT_USER_AGENT: &str = "stride-client/0.1";

/// Total request timeout. Generous on purpose: the backend runs on
/// scale-to-zero hosting and cold starts can take the better part of a
/// minute.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the Stride backend. Request paths are joined onto it.
    pub base_url: Url,

    /// Overall timeout for each HTTP request.
    pub timeout: Duration,

    /// Connection timeout (time to establish the initial connection).
    pub connect_timeout: Duration,

    /// User agent string.
    pub user_agent: String,

    /// Where the session record is persisted. `None` keeps the session
    /// in memory only for the lifetime of the process.
    pub storage_path: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            storage_path: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_storage_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Resolve an absolute request path against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, SessionError> {
        self.base_url
            .join(path)
            .map_err(|e| SessionError::InvalidUrl(format!("{path}: {e}")))
    }

    pub(crate) fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        headers
    }
}

/// Build the shared HTTP client for a session.
pub(crate) fn build_client(config: &SessionConfig) -> Result<Client, SessionError> {
    Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(SessionConfig::default_headers())
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|e| SessionError::Client(e.to_string()))
}
