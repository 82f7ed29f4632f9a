use std::sync::Arc;

use movietalk_api::{
    auth::{AuthService, GoogleIdentityVerifier, PasswordService, PgUserStore, TokenService},
    config::Config,
    create_router, db, AppState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber for logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("MovieTalk API - Starting...");

    // Every auth setting is required, fail before accepting traffic
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url, config.request_timeout)
        .await
        .expect("Failed to create database pool");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let identity_verifier = GoogleIdentityVerifier::new(config.google_client_id.clone())
        .expect("Failed to initialize Google identity verifier");

    let auth_service = AuthService::new(
        Arc::new(PgUserStore::new(db_pool)),
        PasswordService::default(),
        TokenService::new(
            config.token_secret.clone(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        ),
        Arc::new(identity_verifier),
    );

    // Create the application router
    let app = create_router(AppState::new(auth_service, config.request_timeout));

    // Start the Axum server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("MovieTalk API is running on http://{}", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
