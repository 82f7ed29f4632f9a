// Authentication error types

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::auth::token::VerificationFailure;

/// Authentication error types
///
/// Every failure in the session lifecycle is converted into one of these
/// before it reaches a client. Internal details are logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Email already exists")]
    EmailAlreadyExists,

    /// Same variant for unknown email and wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Password login attempted on an account created through Google sign-in
    #[error("Account uses external sign-in")]
    ExternalAccount,

    /// Refresh token is well-formed but unknown or no longer active
    #[error("Invalid token")]
    InvalidToken,

    /// Token failed signature, expiry or format checks
    #[error("Token rejected: {0}")]
    TokenRejected(VerificationFailure),

    #[error("Missing authentication token")]
    MissingToken,

    #[error("User not found")]
    UserNotFound,

    #[error("External token rejected: {0}")]
    ExternalTokenInvalid(String),

    #[error("Identity provider unavailable: {0}")]
    UpstreamError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Password hashing error")]
    PasswordHashError,

    #[error("Token generation error: {0}")]
    TokenGenerationError(String),
}

impl From<VerificationFailure> for AuthError {
    fn from(failure: VerificationFailure) -> Self {
        match failure {
            VerificationFailure::ConfigurationMissing => {
                AuthError::ConfigError("token secret not configured".to_string())
            }
            other => AuthError::TokenRejected(other),
        }
    }
}

/// Body extraction failures become validation errors with a fixed message
impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Request body rejected: {}", rejection.body_text());
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => "expected a JSON request body",
            JsonRejection::JsonSyntaxError(_) => "malformed JSON request body",
            JsonRejection::JsonDataError(_) => "invalid request body",
            _ => "unreadable request body",
        };
        AuthError::ValidationError(message.to_string())
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::ValidationError(msg) => debug!("Auth validation error: {}", msg),
            AuthError::InvalidCredentials => debug!("Login rejected: invalid credentials"),
            AuthError::ExternalAccount => debug!("Password login on external account"),
            AuthError::InvalidToken => warn!("Inactive or unknown refresh token presented"),
            AuthError::TokenRejected(kind) => warn!("Token rejected: {}", kind),
            AuthError::MissingToken => warn!("Missing token in request"),
            AuthError::ExternalTokenInvalid(reason) => warn!("Google token rejected: {}", reason),
            AuthError::UpstreamError(msg) => error!("Identity provider error: {}", msg),
            AuthError::ConfigError(msg) => error!("Auth configuration error: {}", msg),
            AuthError::DatabaseError(msg) => error!("Database error in auth: {}", msg),
            AuthError::PasswordHashError => error!("Password hashing error"),
            AuthError::TokenGenerationError(msg) => error!("Token generation error: {}", msg),
            AuthError::EmailAlreadyExists | AuthError::UserNotFound => {}
        }

        let body = Json(json!({
            "error": self.error_message(),
        }));

        (self.status_code(), body).into_response()
    }
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailAlreadyExists => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AuthError::ExternalAccount => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken => StatusCode::BAD_REQUEST,
            AuthError::TokenRejected(_) => StatusCode::FORBIDDEN,
            AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::ExternalTokenInvalid(_) => StatusCode::BAD_REQUEST,
            AuthError::UpstreamError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::PasswordHashError => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::TokenGenerationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a message that is safe to send to clients (no sensitive data)
    pub fn error_message(&self) -> String {
        match self {
            AuthError::ValidationError(msg) => msg.clone(),
            AuthError::EmailAlreadyExists => "Email already exists".to_string(),
            AuthError::InvalidCredentials => "wrong email or password".to_string(),
            AuthError::ExternalAccount => {
                "This account uses Google sign-in, please log in with Google".to_string()
            }
            AuthError::InvalidToken | AuthError::TokenRejected(_) => "invalid token".to_string(),
            AuthError::MissingToken => "missing token".to_string(),
            AuthError::UserNotFound => "User not found".to_string(),
            AuthError::ExternalTokenInvalid(_) => "invalid Google token".to_string(),
            AuthError::UpstreamError(_)
            | AuthError::ConfigError(_)
            | AuthError::DatabaseError(_)
            | AuthError::PasswordHashError
            | AuthError::TokenGenerationError(_) => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_missing_is_server_fault() {
        let err = AuthError::from(VerificationFailure::ConfigurationMissing);
        assert!(matches!(err, AuthError::ConfigError(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_verification_failures_are_client_faults() {
        for failure in [
            VerificationFailure::Malformed,
            VerificationFailure::SignatureInvalid,
            VerificationFailure::Expired,
        ] {
            let err = AuthError::from(failure);
            assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
            assert_eq!(err.error_message(), "invalid token");
        }
    }

    #[test]
    fn test_internal_errors_do_not_leak_details() {
        let errors = [
            AuthError::DatabaseError("connection refused on 10.0.0.5".to_string()),
            AuthError::UpstreamError("dns failure".to_string()),
            AuthError::ConfigError("TOKEN_SECRET unset".to_string()),
            AuthError::TokenGenerationError("bad key".to_string()),
        ];
        for err in errors {
            assert_eq!(err.error_message(), "Internal server error");
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_credential_failures_share_one_message() {
        assert_eq!(
            AuthError::InvalidCredentials.error_message(),
            "wrong email or password"
        );
        assert_eq!(AuthError::InvalidCredentials.status_code(), StatusCode::BAD_REQUEST);
    }
}
