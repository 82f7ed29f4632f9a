// MovieTalk API: authentication and session backend for the movie review app

pub mod auth;
pub mod config;
pub mod db;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use auth::{AuthService, TokenService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(auth_service: AuthService, request_timeout: Duration) -> Self {
        Self {
            auth_service: Arc::new(auth_service),
            request_timeout,
        }
    }
}

/// Lets the auth gate pull the token verifier out of the application state
impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        state.auth_service.token_service().clone()
    }
}

async fn root() -> &'static str {
    "MovieTalk Backend API is running!"
}

/// Creates and configures the application router
/// Maps all auth endpoints to their handlers and adds CORS, tracing and timeout layers
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/auth/check", get(auth::check_handler))
        .route("/auth/update-profile", put(auth::update_profile_handler))
        .route("/auth/change-password", put(auth::change_password_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/", get(root))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/login-with-google", post(auth::login_with_google_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .merge(protected)
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
