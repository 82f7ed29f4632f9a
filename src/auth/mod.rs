// Authentication module
// JWT access/refresh sessions with rotation, Google sign-in and the gate for protected routes

pub mod error;
pub mod google;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;

// Re-export commonly used types
pub use error::AuthError;
pub use google::{ExternalIdentity, GoogleIdentityVerifier, IdentityVerifier};
pub use handlers::{
    change_password_handler, check_handler, login_handler, login_with_google_handler,
    logout_handler, refresh_handler, register_handler, update_profile_handler,
};
pub use middleware::{require_auth, AuthenticatedUser};
pub use models::{LoginResponse, TokenPairResponse, User, UserResponse};
pub use password::PasswordService;
pub use repository::{InMemoryUserStore, PgUserStore, UserStore};
pub use service::AuthService;
pub use token::{TokenService, VerificationFailure};

#[cfg(test)]
pub(crate) mod testing;
