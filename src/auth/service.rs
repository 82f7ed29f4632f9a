// Authentication service - session lifecycle business logic

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    error::AuthError,
    google::IdentityVerifier,
    models::{
        ChangePasswordRequest, GoogleLoginRequest, LoginRequest, LoginResponse, NewUser,
        RefreshRequest, RegisterRequest, TokenPairResponse, UpdateProfileRequest, User,
        UserResponse,
    },
    password::{PasswordService, EXTERNAL_ACCOUNT_PASSWORD},
    repository::{fingerprint, UserStore},
    token::TokenService,
};

/// Trim and lowercase an email so registration and lookup agree
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Return the trimmed value if present and non-blank
fn required_field(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Authentication service coordinating all auth operations
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    password_service: PasswordService,
    token_service: TokenService,
    identity_verifier: Arc<dyn IdentityVerifier>,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        store: Arc<dyn UserStore>,
        password_service: PasswordService,
        token_service: TokenService,
        identity_verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            store,
            password_service,
            token_service,
            identity_verifier,
        }
    }

    pub fn token_service(&self) -> &TokenService {
        &self.token_service
    }

    /// Register a new user
    ///
    /// Registration does not log the user in; no tokens are issued.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, AuthError> {
        // Normalize before validating so surrounding whitespace is not a format error
        let request = RegisterRequest {
            email: required_field(request.email.as_deref()).map(normalize_email),
            ..request
        };

        let (email, password) = match (
            request.email.clone(),
            request.password.clone().filter(|p| !p.is_empty()),
        ) {
            (Some(email), Some(password)) => (email, password),
            _ => {
                return Err(AuthError::ValidationError(
                    "missing email or password".to_string(),
                ))
            }
        };

        request
            .validate()
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;

        if self.store.find_by_email(&email).await?.is_some() {
            debug!("Registration rejected, email already in use");
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = self.password_service.hash_password(&password)?;
        let user = self
            .store
            .create_user(NewUser {
                email,
                password_hash,
                full_name: request.full_name.unwrap_or_default().trim().to_string(),
                profile_picture: String::new(),
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        Ok(user.into())
    }

    /// Login with email and password
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        let (email, password) = match (
            required_field(request.email.as_deref()),
            request.password.as_deref().filter(|p| !p.is_empty()),
        ) {
            (Some(email), Some(password)) => (normalize_email(email), password),
            _ => {
                return Err(AuthError::ValidationError(
                    "missing email or password".to_string(),
                ))
            }
        };

        // Unknown email and wrong password must be indistinguishable
        let user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if PasswordService::is_external_account(&user.password_hash) {
            return Err(AuthError::ExternalAccount);
        }

        if !self.password_service.verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        self.start_session(user).await
    }

    /// Login with a Google ID token, creating the account on first use
    pub async fn login_with_google(
        &self,
        request: GoogleLoginRequest,
    ) -> Result<LoginResponse, AuthError> {
        let token = required_field(request.token.as_deref())
            .ok_or_else(|| AuthError::ValidationError("missing token".to_string()))?;

        let identity = self.identity_verifier.verify(token).await?;
        let email = normalize_email(&identity.email);

        let user = match self.store.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                let created = self
                    .store
                    .create_user(NewUser {
                        email,
                        password_hash: EXTERNAL_ACCOUNT_PASSWORD.to_string(),
                        full_name: identity.name,
                        profile_picture: identity.picture.unwrap_or_default(),
                    })
                    .await?;
                info!(user_id = %created.id, "Created account from Google sign-in");
                created
            }
        };

        self.start_session(user).await
    }

    /// Revoke a single refresh token
    pub async fn logout(&self, request: RefreshRequest) -> Result<(), AuthError> {
        let refresh_token = required_field(request.refresh_token.as_deref())
            .ok_or_else(|| AuthError::ValidationError("missing refresh token".to_string()))?;

        let (user, presented) = self.claim_active_refresh_token(refresh_token).await?;

        let remaining: Vec<String> = user
            .refresh_tokens
            .into_iter()
            .filter(|t| *t != presented)
            .collect();
        self.persist_refresh_tokens(user.id, remaining).await?;

        info!(user_id = %user.id, "User logged out");
        Ok(())
    }

    /// Exchange a refresh token for a new pair (rotation)
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenPairResponse, AuthError> {
        let refresh_token = required_field(request.refresh_token.as_deref())
            .ok_or_else(|| AuthError::ValidationError("missing refresh token".to_string()))?;

        let (user, presented) = self.claim_active_refresh_token(refresh_token).await?;

        let pair = self.token_service.issue_token_pair(user.id)?;

        // Removal of the old token and addition of the new one land in one write
        let mut rotated: Vec<String> = user
            .refresh_tokens
            .into_iter()
            .filter(|t| *t != presented)
            .collect();
        rotated.push(fingerprint(&pair.refresh_token));
        self.persist_refresh_tokens(user.id, rotated).await?;

        debug!(user_id = %user.id, "Refresh token rotated");
        Ok(TokenPairResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }

    /// Get the profile of an authenticated user
    pub async fn get_current_user(&self, user_id: Uuid) -> Result<UserResponse, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(UserResponse::from)
            .ok_or(AuthError::UserNotFound)
    }

    /// Update display name and/or email of an authenticated user
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, AuthError> {
        let request = UpdateProfileRequest {
            full_name: request.full_name.map(|n| n.trim().to_string()),
            email: match request.email.as_deref() {
                Some(raw) if raw.trim().is_empty() => {
                    return Err(AuthError::ValidationError("email must not be empty".to_string()))
                }
                Some(raw) => Some(normalize_email(raw)),
                None => None,
            },
        };
        request
            .validate()
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;

        let UpdateProfileRequest { full_name, email } = request;

        let user = self
            .store
            .update_profile(user_id, full_name, email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(user_id = %user.id, "Profile updated");
        Ok(user.into())
    }

    /// Set a new local password for an authenticated user
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let password = request
            .password
            .ok_or_else(|| AuthError::ValidationError("missing password".to_string()))?;
        PasswordService::validate_password_strength(&password)?;

        let password_hash = self.password_service.hash_password(&password)?;
        if !self.store.update_password(user_id, &password_hash).await? {
            return Err(AuthError::UserNotFound);
        }

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Issue a pair, record the refresh token and build the login response
    async fn start_session(&self, user: User) -> Result<LoginResponse, AuthError> {
        let pair = self.token_service.issue_token_pair(user.id)?;

        let mut active = user.refresh_tokens;
        active.push(fingerprint(&pair.refresh_token));
        self.persist_refresh_tokens(user.id, active).await?;

        info!(user_id = %user.id, "User logged in");
        Ok(LoginResponse {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }

    /// Verify a refresh token and confirm it is still active for its user
    ///
    /// A verified token missing from the active set means it was already
    /// consumed or revoked. That is treated as replay: every session of the
    /// user is revoked before failing.
    async fn claim_active_refresh_token(&self, token: &str) -> Result<(User, String), AuthError> {
        if !self.token_service.is_configured() {
            return Err(AuthError::ConfigError("token secret not configured".to_string()));
        }

        let claims = self.token_service.verify(token)?;
        let user_id = claims.user_id().map_err(AuthError::TokenRejected)?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let presented = fingerprint(token);
        if !user.refresh_tokens.contains(&presented) {
            warn!(
                user_id = %user.id,
                revoked = user.refresh_tokens.len(),
                "Inactive refresh token presented, revoking all sessions"
            );
            self.persist_refresh_tokens(user.id, Vec::new()).await?;
            return Err(AuthError::InvalidToken);
        }

        Ok((user, presented))
    }

    /// Write the token set on a detached task so a dropped request cannot
    /// cancel it halfway
    async fn persist_refresh_tokens(&self, user_id: Uuid, tokens: Vec<String>) -> Result<(), AuthError> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move { store.set_refresh_tokens(user_id, tokens).await })
            .await
            .map_err(|e| AuthError::DatabaseError(format!("token persist task failed: {}", e)))?
    }
}
