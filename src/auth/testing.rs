// Test doubles shared by the session and HTTP tests

use axum::async_trait;

use crate::auth::{error::AuthError, google::ExternalIdentity, google::IdentityVerifier};

/// The one Google ID token the stand-in verifier accepts
pub const GOOGLE_TOKEN: &str = "valid-google-id-token";
/// Token that simulates the identity provider being unreachable
pub const GOOGLE_UNAVAILABLE_TOKEN: &str = "google-down";

pub fn google_identity() -> ExternalIdentity {
    ExternalIdentity {
        email: "Dana@Gmail.com".to_string(),
        name: "Dana Levi".to_string(),
        picture: Some("https://lh3.googleusercontent.com/a/dana".to_string()),
    }
}

/// Identity provider stand-in returning a fixed identity for a single token
pub struct StaticIdentityVerifier {
    identity: ExternalIdentity,
}

impl Default for StaticIdentityVerifier {
    fn default() -> Self {
        Self {
            identity: google_identity(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<ExternalIdentity, AuthError> {
        match token {
            GOOGLE_TOKEN => Ok(self.identity.clone()),
            GOOGLE_UNAVAILABLE_TOKEN => {
                Err(AuthError::UpstreamError("connect timeout".to_string()))
            }
            _ => Err(AuthError::ExternalTokenInvalid("unknown token".to_string())),
        }
    }
}
