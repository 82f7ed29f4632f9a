// JWT token issuing and verification service

use crate::auth::error::AuthError;
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // user id
    pub nonce: u64,      // decorrelates tokens minted in the same second
    pub exp: i64,        // expiration timestamp
    pub iat: i64,        // issued at timestamp
}

impl Claims {
    /// Parse the subject back into a user id
    pub fn user_id(&self) -> Result<Uuid, VerificationFailure> {
        Uuid::parse_str(&self.sub).map_err(|_| VerificationFailure::Malformed)
    }
}

/// Why a token failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationFailure {
    #[error("token is missing or malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token has expired")]
    Expired,
    #[error("token secret is not configured")]
    ConfigurationMissing,
}

/// Access and refresh tokens minted together
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Token service for JWT operations
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    access_token_duration: i64,  // in seconds
    refresh_token_duration: i64, // in seconds
}

impl TokenService {
    /// Create a new TokenService
    ///
    /// Nothing is validated here; missing settings surface as errors when a
    /// token is issued or verified.
    pub fn new(secret: String, access_token_duration: i64, refresh_token_duration: i64) -> Self {
        Self {
            secret,
            access_token_duration,
            refresh_token_duration,
        }
    }

    /// Whether a signing secret is available
    pub fn is_configured(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Issue an access/refresh pair for a user
    ///
    /// Both tokens carry the same fresh nonce and differ only in expiry.
    pub fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair, AuthError> {
        if !self.is_configured() {
            return Err(AuthError::ConfigError("token secret not configured".to_string()));
        }
        if self.access_token_duration <= 0 || self.refresh_token_duration <= 0 {
            return Err(AuthError::ConfigError("token expiry not configured".to_string()));
        }

        let nonce: u64 = rand::thread_rng().gen();
        let now = Utc::now().timestamp();

        let access_token = self.sign(user_id, nonce, now, self.access_token_duration)?;
        let refresh_token = self.sign(user_id, nonce, now, self.refresh_token_duration)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    fn sign(&self, user_id: Uuid, nonce: u64, now: i64, duration: i64) -> Result<String, AuthError> {
        let exp = now
            .checked_add(duration)
            .ok_or_else(|| AuthError::ConfigError("token expiry out of range".to_string()))?;
        let claims = Claims {
            sub: user_id.to_string(),
            nonce,
            iat: now,
            exp,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenGenerationError(e.to_string()))
    }

    /// Verify signature and expiry of any token issued by this service
    pub fn verify(&self, token: &str) -> Result<Claims, VerificationFailure> {
        if !self.is_configured() {
            return Err(VerificationFailure::ConfigurationMissing);
        }
        if token.trim().is_empty() {
            return Err(VerificationFailure::Malformed);
        }

        // Expiry is exact, no clock skew allowance
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => VerificationFailure::Expired,
            ErrorKind::InvalidSignature => VerificationFailure::SignatureInvalid,
            _ => VerificationFailure::Malformed,
        })
    }
}
