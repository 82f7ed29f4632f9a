// Authentication gate for protected routes

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{error::AuthError, token::TokenService};

/// Identity of the caller, attached by the gate for downstream handlers
///
/// The gate does not check that the user still exists; handlers that need
/// the record must look it up and fail themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verify the bearer access token in `headers`
pub fn authenticate(
    headers: &HeaderMap,
    token_service: &TokenService,
) -> Result<AuthenticatedUser, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;

    if !token_service.is_configured() {
        return Err(AuthError::ConfigError("token secret not configured".to_string()));
    }

    let claims = token_service.verify(token)?;
    let user_id = claims.user_id().map_err(AuthError::TokenRejected)?;

    Ok(AuthenticatedUser { user_id })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already verified by `require_auth` on this route
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(*user);
        }

        let token_service = TokenService::from_ref(state);
        authenticate(&parts.headers, &token_service)
    }
}

/// Middleware that rejects unauthenticated requests before any handler runs
/// and stores the caller identity in the request extensions
pub async fn require_auth(
    State(token_service): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let endpoint = request.uri().path().to_string();

    let user = authenticate(request.headers(), &token_service).map_err(|e| {
        warn!("Authentication failed for endpoint {}: {}", endpoint, e);
        e
    })?;

    debug!(user_id = %user.user_id, endpoint = %endpoint, "Request authenticated");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::Claims;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use proptest::prelude::*;
    use tower::ServiceExt;

    const TEST_SECRET: &str = "test_secret_key_for_testing_purposes";

    // Helper to create a test token service
    fn test_token_service() -> TokenService {
        TokenService::new(TEST_SECRET.to_string(), 900, 604_800)
    }

    // Helper to create test parts with Authorization header
    fn create_parts_with_auth(auth_value: &str) -> Parts {
        let req = HttpRequest::builder()
            .uri("/")
            .header(header::AUTHORIZATION, auth_value)
            .body(())
            .unwrap();

        let (parts, _) = req.into_parts();
        parts
    }

    // Helper to create test parts without Authorization header
    fn create_parts_without_auth() -> Parts {
        let req = HttpRequest::builder().uri("/").body(()).unwrap();
        let (parts, _) = req.into_parts();
        parts
    }

    fn expired_token() -> String {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            nonce: 1,
            iat: Utc::now().timestamp() - 1000,
            exp: Utc::now().timestamp() - 500, // Expired 500 seconds ago
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    async fn whoami(user: AuthenticatedUser) -> String {
        user.user_id.to_string()
    }

    fn gated_router(token_service: TokenService) -> Router {
        Router::new()
            .route("/protected", get(whoami))
            .route_layer(middleware::from_fn_with_state(
                token_service.clone(),
                require_auth,
            ))
            .with_state(token_service)
    }

    async fn call(router: Router, auth: Option<&str>) -> StatusCode {
        let mut builder = HttpRequest::builder().uri("/protected");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn test_valid_token_is_accepted() {
        let service = test_token_service();
        let user_id = Uuid::new_v4();
        let pair = service.issue_token_pair(user_id).unwrap();

        let mut parts = create_parts_with_auth(&format!("Bearer {}", pair.access_token));
        let user = AuthenticatedUser::from_request_parts(&mut parts, &service)
            .await
            .unwrap();

        assert_eq!(user.user_id, user_id);
    }

    #[tokio::test]
    async fn test_missing_authorization_header() {
        let mut parts = create_parts_without_auth();
        let result = AuthenticatedUser::from_request_parts(&mut parts, &test_token_service()).await;

        assert!(matches!(result.unwrap_err(), AuthError::MissingToken));
    }

    #[tokio::test]
    async fn test_non_bearer_schemes_count_as_missing() {
        let service = test_token_service();
        let pair = service.issue_token_pair(Uuid::new_v4()).unwrap();

        let values = [
            format!("JWT {}", pair.access_token),
            "Basic dXNlcjpwYXNz".to_string(),
            "token_without_scheme".to_string(),
            "Bearer ".to_string(),
        ];

        for value in values {
            let mut parts = create_parts_with_auth(&value);
            let result = AuthenticatedUser::from_request_parts(&mut parts, &service).await;
            assert!(matches!(result.unwrap_err(), AuthError::MissingToken));
        }
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let mut parts = create_parts_with_auth(&format!("Bearer {}", expired_token()));
        let result = AuthenticatedUser::from_request_parts(&mut parts, &test_token_service()).await;

        assert!(matches!(
            result.unwrap_err(),
            AuthError::TokenRejected(crate::auth::token::VerificationFailure::Expired)
        ));
    }

    #[tokio::test]
    async fn test_malformed_token_is_rejected() {
        let malformed_tokens = [
            "Bearer invalid_token",
            "Bearer not.a.valid.jwt",
            "Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.invalid.signature",
        ];

        for token in malformed_tokens {
            let mut parts = create_parts_with_auth(token);
            let result =
                AuthenticatedUser::from_request_parts(&mut parts, &test_token_service()).await;

            assert!(matches!(result.unwrap_err(), AuthError::TokenRejected(_)));
        }
    }

    #[tokio::test]
    async fn test_missing_secret_is_config_error() {
        let service = test_token_service();
        let pair = service.issue_token_pair(Uuid::new_v4()).unwrap();
        let unconfigured = TokenService::new(String::new(), 900, 604_800);

        let mut parts = create_parts_with_auth(&format!("Bearer {}", pair.access_token));
        let result = AuthenticatedUser::from_request_parts(&mut parts, &unconfigured).await;

        assert!(matches!(result.unwrap_err(), AuthError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_gate_status_matrix() {
        let service = test_token_service();
        let pair = service.issue_token_pair(Uuid::new_v4()).unwrap();
        let other = TokenService::new("another_secret".to_string(), 900, 604_800)
            .issue_token_pair(Uuid::new_v4())
            .unwrap();

        let router = gated_router(service.clone());

        assert_eq!(call(router.clone(), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            call(router.clone(), Some(&format!("Bearer {}", expired_token()))).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            call(router.clone(), Some(&format!("Bearer {}x", pair.access_token))).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            call(router.clone(), Some(&format!("Bearer {}", other.access_token))).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            call(router, Some(&format!("Bearer {}", pair.access_token))).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_gate_without_secret_is_server_error() {
        let pair = test_token_service().issue_token_pair(Uuid::new_v4()).unwrap();
        let router = gated_router(TokenService::new(String::new(), 900, 604_800));

        assert_eq!(
            call(router, Some(&format!("Bearer {}", pair.access_token))).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    proptest! {
        #[test]
        fn prop_malformed_tokens_rejected(malformed in "[a-zA-Z0-9]{10,50}") {
            let headers = create_parts_with_auth(&format!("Bearer {}", malformed)).headers;
            let result = authenticate(&headers, &test_token_service());

            prop_assert!(matches!(result, Err(AuthError::TokenRejected(_))));
        }

        #[test]
        fn prop_valid_tokens_accepted(bytes in any::<[u8; 16]>()) {
            let service = test_token_service();
            let user_id = Uuid::from_bytes(bytes);
            let pair = service.issue_token_pair(user_id)?;

            let headers = create_parts_with_auth(&format!("Bearer {}", pair.access_token)).headers;
            let user = authenticate(&headers, &service).unwrap();

            prop_assert_eq!(user.user_id, user_id);
        }
    }
}
