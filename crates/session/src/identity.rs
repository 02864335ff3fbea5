use reqwest::{Client, StatusCode, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::credential::Credential;
use crate::error::SessionError;

/// The verified user record, as normalized from `/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(alias = "id")]
    pub user_id: String,
    #[serde(default, alias = "name")]
    pub display_name: String,
    #[serde(default)]
    pub profile_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<String>,
}

/// Partial identity update applied by profile flows.
#[derive(Debug, Clone, Default)]
pub struct IdentityPatch {
    pub display_name: Option<String>,
    pub headline: Option<String>,
    pub interests: Option<Vec<String>>,
    pub profile_complete: Option<bool>,
}

impl IdentityPatch {
    /// The patch produced by finishing profile setup.
    pub fn completed() -> Self {
        Self {
            profile_complete: Some(true),
            ..Self::default()
        }
    }

    pub fn apply(&self, identity: &mut Identity) {
        if let Some(display_name) = &self.display_name {
            identity.display_name = display_name.clone();
        }
        if let Some(headline) = &self.headline {
            identity.headline = Some(headline.clone());
        }
        if let Some(interests) = &self.interests {
            identity.interests = interests.clone();
        }
        if let Some(profile_complete) = self.profile_complete {
            identity.profile_complete = profile_complete;
        }
    }
}

/// Verify a credential against `GET /auth/me` and decode the identity.
///
/// Only a 401 maps to [`SessionError::Unauthorized`]; every other
/// failure (timeouts, 5xx, unusable payloads) is retryable and must not
/// tear the session down.
pub(crate) async fn resolve_identity(
    client: &Client,
    config: &SessionConfig,
    credential: &Credential,
) -> Result<Identity, SessionError> {
    let url = config.endpoint("/auth/me")?;
    let response = client
        .get(url)
        .header(AUTHORIZATION, credential.authorization_value())
        .send()
        .await?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(SessionError::Unauthorized);
    }
    if !status.is_success() {
        return Err(SessionError::Unreachable(format!(
            "whoami returned {status}"
        )));
    }

    let bytes = response.bytes().await?;
    let payload: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::MalformedResponse(e.to_string()))?;

    normalize_identity(&payload)
}

/// Normalize the whoami payload into the canonical flat [`Identity`].
///
/// Two shapes are accepted: the user object nested under `user` with
/// `profileComplete` as a sibling, and a flat user object carrying
/// `profileComplete` itself. The sibling flag wins when both are present.
pub(crate) fn normalize_identity(payload: &serde_json::Value) -> Result<Identity, SessionError> {
    if let Some(user) = payload.get("user").filter(|u| u.is_object()) {
        let mut identity: Identity = serde_json::from_value(user.clone())
            .map_err(|e| SessionError::MalformedResponse(format!("whoami user object: {e}")))?;
        if let Some(complete) = payload.get("profileComplete").and_then(|v| v.as_bool()) {
            identity.profile_complete = complete;
        }
        debug!(user_id = %identity.user_id, "decoded nested whoami payload");
        return Ok(identity);
    }

    if payload.get("userId").is_some() || payload.get("id").is_some() {
        let identity: Identity = serde_json::from_value(payload.clone())
            .map_err(|e| SessionError::MalformedResponse(format!("whoami payload: {e}")))?;
        return Ok(identity);
    }

    warn!(%payload, "unrecognized whoami payload shape");
    Err(SessionError::MalformedResponse(
        "unrecognized whoami payload shape".to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_shape_with_sibling_flag() {
        let payload = json!({
            "user": { "userId": "u1", "name": "Hana", "profileComplete": false },
            "profileComplete": true
        });
        let identity = normalize_identity(&payload).unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.display_name, "Hana");
        // The sibling flag takes precedence over the nested one.
        assert!(identity.profile_complete);
    }

    #[test]
    fn flat_shape() {
        let payload = json!({
            "userId": "u2",
            "displayName": "Min",
            "profileComplete": true,
            "interests": ["data", "design"]
        });
        let identity = normalize_identity(&payload).unwrap();
        assert_eq!(identity.user_id, "u2");
        assert!(identity.profile_complete);
        assert_eq!(identity.interests.len(), 2);
    }

    #[test]
    fn flat_shape_defaults_completeness() {
        let payload = json!({ "userId": "u3", "name": "Ji" });
        let identity = normalize_identity(&payload).unwrap();
        assert!(!identity.profile_complete);
    }

    #[test]
    fn unrecognized_shape_is_malformed_not_unauthorized() {
        let payload = json!({ "ok": true });
        let result = normalize_identity(&payload);
        assert!(matches!(result, Err(SessionError::MalformedResponse(_))));
        assert!(result.unwrap_err().is_retryable());
    }

    #[test]
    fn patch_applies_atomically_visible_fields() {
        let mut identity = Identity {
            user_id: "u1".to_owned(),
            display_name: "Hana".to_owned(),
            profile_complete: false,
            email: None,
            headline: None,
            interests: vec![],
        };
        let patch = IdentityPatch {
            headline: Some("Backend engineer".to_owned()),
            profile_complete: Some(true),
            ..IdentityPatch::default()
        };
        patch.apply(&mut identity);
        assert!(identity.profile_complete);
        assert_eq!(identity.headline.as_deref(), Some("Backend engineer"));
        assert_eq!(identity.display_name, "Hana");
    }
}
