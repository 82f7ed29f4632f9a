// Password hashing and validation service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::auth::error::AuthError;

/// Stored in place of a hash for accounts created through Google sign-in.
/// It is not a valid PHC string, so it can never verify against a password.
pub const EXTERNAL_ACCOUNT_PASSWORD: &str = "google-signin";

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Password service for hashing and verification
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl PasswordService {
    /// Argon2id with explicit cost parameters
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, AuthError> {
        let params = Params::new(m_cost, t_cost, p_cost, None).map_err(|e| {
            AuthError::ConfigError(format!("invalid argon2 parameters: {}", e))
        })?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password using Argon2id with a random salt
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                tracing::error!("Argon2 hashing failed: {}", e);
                AuthError::PasswordHashError
            })
    }

    /// Verify a password against a stored hash
    ///
    /// Returns `Ok(false)` on mismatch and `Err` only when the stored hash
    /// itself cannot be parsed.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            tracing::error!("Stored password hash is malformed: {}", e);
            AuthError::PasswordHashError
        })?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => {
                tracing::error!("Argon2 verification failed: {}", e);
                Err(AuthError::PasswordHashError)
            }
        }
    }

    /// Validate password strength requirements
    pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::ValidationError(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }

    /// Whether a stored hash marks an external-identity-only account
    pub fn is_external_account(hash: &str) -> bool {
        hash == EXTERNAL_ACCOUNT_PASSWORD
    }
}
