//! Google ID token verification for "Sign in with Google".
//!
//! Tokens are introspected through Google's `tokeninfo` endpoint, which
//! checks signature and expiry; this module then enforces the audience and
//! the claims the session manager needs.

use std::time::Duration;

use axum::async_trait;
use serde::{Deserialize, Deserializer};

use crate::auth::error::AuthError;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Identity asserted by an external provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

/// Verifies third-party identity tokens
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<ExternalIdentity, AuthError>;
}

/// Subset of the `tokeninfo` response we rely on
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleTokenInfo {
    pub aud: Option<String>,
    pub iss: Option<String>,
    pub email: Option<String>,
    /// Sent as `"true"`/`"false"` by tokeninfo, as a boolean in decoded ID tokens
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(value)) => value,
        Some(Flag::Text(value)) => value.eq_ignore_ascii_case("true"),
        None => false,
    })
}

impl GoogleTokenInfo {
    /// Check audience and issuer, then extract the identity
    pub fn into_identity(self, expected_audience: &str) -> Result<ExternalIdentity, AuthError> {
        match self.aud.as_deref() {
            Some(aud) if aud == expected_audience => {}
            Some(aud) => {
                return Err(AuthError::ExternalTokenInvalid(format!(
                    "unexpected audience: {}",
                    aud
                )))
            }
            None => return Err(AuthError::ExternalTokenInvalid("missing audience".to_string())),
        }

        if let Some(iss) = self.iss.as_deref() {
            if !GOOGLE_ISSUERS.contains(&iss) {
                return Err(AuthError::ExternalTokenInvalid(format!(
                    "unexpected issuer: {}",
                    iss
                )));
            }
        }

        let email = self
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AuthError::ExternalTokenInvalid("missing email claim".to_string()))?;
        // An unverified address must not unlock an existing account with that email
        if !self.email_verified {
            return Err(AuthError::ExternalTokenInvalid("email not verified".to_string()));
        }
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| AuthError::ExternalTokenInvalid("missing name claim".to_string()))?;

        Ok(ExternalIdentity {
            email,
            name,
            picture: self.picture.filter(|p| !p.is_empty()),
        })
    }
}

/// Verifier backed by Google's `tokeninfo` endpoint
pub struct GoogleIdentityVerifier {
    http_client: reqwest::Client,
    client_id: String,
    tokeninfo_url: String,
}

impl GoogleIdentityVerifier {
    /// Create a verifier expecting tokens issued for `client_id`
    pub fn new(client_id: impl Into<String>) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| AuthError::ConfigError(format!("failed building Google HTTP client: {}", e)))?;

        let client_id = client_id.into();
        tracing::info!(client_id = %client_id, "Initialized Google identity verifier");

        Ok(Self {
            http_client,
            client_id,
            tokeninfo_url: TOKENINFO_URL.to_string(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<ExternalIdentity, AuthError> {
        if self.client_id.is_empty() {
            return Err(AuthError::ConfigError("GOOGLE_CLIENT_ID not configured".to_string()));
        }

        let response = self
            .http_client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", token)])
            .send()
            .await
            .map_err(|e| AuthError::UpstreamError(format!("tokeninfo request failed: {}", e)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AuthError::UpstreamError(format!(
                "tokeninfo returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(AuthError::ExternalTokenInvalid(format!(
                "tokeninfo returned {}",
                status
            )));
        }

        let info: GoogleTokenInfo = response.json().await.map_err(|e| {
            AuthError::UpstreamError(format!("unreadable tokeninfo response: {}", e))
        })?;

        info.into_identity(&self.client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_ID: &str = "movietalk.apps.googleusercontent.com";

    fn info() -> GoogleTokenInfo {
        GoogleTokenInfo {
            aud: Some(CLIENT_ID.to_string()),
            iss: Some("https://accounts.google.com".to_string()),
            email: Some("dana@gmail.com".to_string()),
            email_verified: true,
            name: Some("Dana".to_string()),
            picture: Some("https://lh3.googleusercontent.com/a/pic".to_string()),
        }
    }

    #[test]
    fn test_valid_claims_produce_identity() {
        let identity = info().into_identity(CLIENT_ID).unwrap();
        assert_eq!(identity.email, "dana@gmail.com");
        assert_eq!(identity.name, "Dana");
        assert!(identity.picture.is_some());
    }

    #[test]
    fn test_wrong_audience_is_rejected() {
        let result = info().into_identity("someone-else.apps.googleusercontent.com");
        assert!(matches!(result, Err(AuthError::ExternalTokenInvalid(_))));
    }

    #[test]
    fn test_foreign_issuer_is_rejected() {
        let mut claims = info();
        claims.iss = Some("https://evil.example.com".to_string());
        assert!(matches!(
            claims.into_identity(CLIENT_ID),
            Err(AuthError::ExternalTokenInvalid(_))
        ));
    }

    #[test]
    fn test_missing_email_or_name_is_rejected() {
        let mut no_email = info();
        no_email.email = None;
        assert!(matches!(
            no_email.into_identity(CLIENT_ID),
            Err(AuthError::ExternalTokenInvalid(_))
        ));

        let mut blank_name = info();
        blank_name.name = Some("  ".to_string());
        assert!(matches!(
            blank_name.into_identity(CLIENT_ID),
            Err(AuthError::ExternalTokenInvalid(_))
        ));
    }

    #[test]
    fn test_unverified_email_is_rejected() {
        let mut unverified = info();
        unverified.email_verified = false;
        assert!(matches!(
            unverified.into_identity(CLIENT_ID),
            Err(AuthError::ExternalTokenInvalid(_))
        ));
    }

    #[test]
    fn test_email_verified_flag_parsing() {
        let parse = |flag: &str| -> bool {
            let body = format!(
                r#"{{"aud": "{}", "email": "dana@gmail.com", "name": "Dana"{}}}"#,
                CLIENT_ID, flag
            );
            serde_json::from_str::<GoogleTokenInfo>(&body)
                .unwrap()
                .email_verified
        };

        assert!(parse(r#", "email_verified": "true""#));
        assert!(parse(r#", "email_verified": true"#));
        assert!(!parse(r#", "email_verified": "false""#));
        assert!(!parse(r#", "email_verified": null"#));
        assert!(!parse(""));
    }

    #[test]
    fn test_tokeninfo_json_parses() {
        let body = r#"{
            "iss": "accounts.google.com",
            "aud": "movietalk.apps.googleusercontent.com",
            "sub": "110169484474386276334",
            "email": "dana@gmail.com",
            "email_verified": "true",
            "name": "Dana",
            "exp": "1700000000"
        }"#;
        let parsed: GoogleTokenInfo = serde_json::from_str(body).unwrap();
        let identity = parsed.into_identity(CLIENT_ID).unwrap();
        assert_eq!(identity.picture, None);
    }
}
