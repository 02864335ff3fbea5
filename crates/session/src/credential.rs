use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::SessionError;

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// The access/refresh token pair and its expiry metadata.
///
/// Tokens are opaque strings; the only interpretation the client applies
/// is the local expiry check, and even that is advisory: the backend is
/// the final authority on whether a token is still accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    /// Empty when the login flow did not hand one out; refresh is then
    /// impossible and a rejection ends the session immediately.
    pub refresh_token: String,
    pub token_type: String,
    /// Absolute expiry deadline. `None` means unknown, assume valid.
    pub expires_at_epoch_ms: Option<i64>,
}

impl Credential {
    /// The `Authorization` header value: `<tokenType> <accessToken>`.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// True when the expiry deadline is known and in the past.
    pub fn is_expired(&self, now_epoch_ms: i64) -> bool {
        match self.expires_at_epoch_ms {
            Some(deadline) => deadline <= now_epoch_ms,
            None => false,
        }
    }

    pub fn is_expired_now(&self) -> bool {
        self.is_expired(now_epoch_ms())
    }
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Token payload as issued by the backend, either in the login redirect
/// fragment or in the `/auth/refresh` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Validity in seconds. Zero or absent means unknown.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenGrant {
    /// Convert into a [`Credential`], keeping `fallback_refresh` when the
    /// grant did not rotate the refresh token.
    pub fn into_credential(self, fallback_refresh: Option<String>) -> Credential {
        let expires_at_epoch_ms = self
            .expires_in
            .filter(|s| *s > 0)
            .map(|s| now_epoch_ms() + s * 1000);

        Credential {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or(fallback_refresh)
                .unwrap_or_default(),
            token_type: self
                .token_type
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned()),
            expires_at_epoch_ms,
        }
    }
}

/// Parse the fragment of a login redirect into a [`Credential`].
///
/// The backend finishes OAuth by redirecting to the client with the token
/// grant in the URL fragment
/// (`#accessToken=...&refreshToken=...&tokenType=...&expiresIn=...`).
/// Accepts a full redirect URL or the bare fragment.
pub fn parse_redirect_fragment(redirect: &str) -> Result<Credential, SessionError> {
    let fragment = match redirect.split_once('#') {
        Some((_, fragment)) => fragment,
        None => redirect,
    };

    let mut grant = TokenGrant {
        access_token: String::new(),
        refresh_token: None,
        token_type: None,
        expires_in: None,
    };

    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "accessToken" => grant.access_token = value.into_owned(),
            "refreshToken" => grant.refresh_token = Some(value.into_owned()),
            "tokenType" => grant.token_type = Some(value.into_owned()),
            "expiresIn" => grant.expires_in = value.parse().ok(),
            _ => {}
        }
    }

    if grant.access_token.is_empty() {
        return Err(SessionError::InvalidRedirect(
            "no accessToken in redirect fragment".to_owned(),
        ));
    }

    Ok(grant.into_credential(None))
}
