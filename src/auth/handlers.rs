// HTTP handlers for authentication endpoints

use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;

use crate::auth::{
    error::AuthError,
    middleware::AuthenticatedUser,
    models::{
        ChangePasswordRequest, GoogleLoginRequest, LoginRequest, LoginResponse, MessageResponse,
        RefreshRequest, RegisterRequest, TokenPairResponse, UpdateProfileRequest, UserResponse,
    },
};
use crate::AppState;

/// JSON body extractor whose rejections use the auth error format
pub struct AuthJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AuthJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Register a new user
/// POST /auth/register
pub async fn register_handler(
    State(state): State<AppState>,
    AuthJson(request): AuthJson<RegisterRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state.auth_service.register(request).await?;
    Ok(Json(user))
}

/// Login with email and password
/// POST /auth/login
pub async fn login_handler(
    State(state): State<AppState>,
    AuthJson(request): AuthJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let response = state.auth_service.login(request).await?;
    Ok(Json(response))
}

/// Login with a Google ID token
/// POST /auth/login-with-google
pub async fn login_with_google_handler(
    State(state): State<AppState>,
    AuthJson(request): AuthJson<GoogleLoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let response = state.auth_service.login_with_google(request).await?;
    Ok(Json(response))
}

/// Revoke a refresh token
/// POST /auth/logout
pub async fn logout_handler(
    State(state): State<AppState>,
    AuthJson(request): AuthJson<RefreshRequest>,
) -> Result<(StatusCode, &'static str), AuthError> {
    state.auth_service.logout(request).await?;
    Ok((StatusCode::OK, "logged out"))
}

/// Rotate a refresh token
/// POST /auth/refresh
pub async fn refresh_handler(
    State(state): State<AppState>,
    AuthJson(request): AuthJson<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    let pair = state.auth_service.refresh(request).await?;
    Ok(Json(pair))
}

/// Get current user information (protected endpoint)
/// GET /auth/check
pub async fn check_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, AuthError> {
    let profile = state.auth_service.get_current_user(user.user_id).await?;
    Ok(Json(profile))
}

/// Update the caller's profile (protected endpoint)
/// PUT /auth/update-profile
pub async fn update_profile_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AuthJson(request): AuthJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    let profile = state
        .auth_service
        .update_profile(user.user_id, request)
        .await?;
    Ok(Json(profile))
}

/// Change the caller's password (protected endpoint)
/// PUT /auth/change-password
pub async fn change_password_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AuthJson(request): AuthJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state
        .auth_service
        .change_password(user.user_id, request)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password updated successfully".to_string(),
    }))
}
