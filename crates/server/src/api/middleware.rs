//! Metrics, admin authentication and session middleware.

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, MatchedPath, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use lotto_core::{AuthRequest, Identity, Session};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use super::ErrorResponse;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "lotto_session";

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => normalize_path(request.uri().path()),
    };

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Admin authentication using the configured authenticator.
///
/// On success the caller's [`Identity`] is stored in the request extensions.
/// Missing or invalid credentials give 401, an unreachable key set gives 503.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let authenticator = state.authenticator();

    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    let source_ip = request
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest { headers, source_ip };

    match authenticator.authenticate(&auth_request).await {
        Ok(identity) => {
            tracing::debug!(user_id = %identity.user_id, method = %identity.method, "Admin authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            AUTH_FAILURES_TOTAL.with_label_values(&[e.reason()]).inc();
            if e.is_caller_fault() {
                tracing::warn!(error = %e, %source_ip, "Admin authentication failed");
            } else {
                tracing::error!(error = %e, %source_ip, "Admin authentication unavailable");
            }
            ErrorResponse::new(status, e.to_string()).into_response()
        }
    }
}

/// Resolves the session cookie and stores the live [`Session`] in the request
/// extensions. Unknown or expired tokens are treated as logged out.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.sessions().get_session(cookie.value()) {
            Ok(Some(session)) => {
                request.extensions_mut().insert(session);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Session lookup failed"),
        }
    }
    next.run(request).await
}

/// Extractor for the authenticated admin's user ID.
///
/// Falls back to "anonymous" when no identity is present.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user_id = parts
            .extensions
            .get::<Identity>()
            .map(|id| id.user_id.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        std::future::ready(Ok(AuthUser(user_id)))
    }
}

/// Extractor for the logged-in end user, if any.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Session>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let session = parts.extensions.get::<Session>().cloned();
        std::future::ready(Ok(MaybeUser(session)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request},
        middleware,
        routing::get,
        Router,
    };
    use chrono::Duration;
    use http_body_util::BodyExt;
    use lotto_core::testing::{fixtures, jwks, MockQrEncoder};
    use lotto_core::{
        create_audit_system, ApiKeyAuthenticator, AuditStore, Authenticator, JwksVerifier,
        JwtAuthenticator, Lottery, NoneAuthenticator, SessionStore, SqliteAuditStore,
        SqliteLotteryStore, SqliteSessionStore, UserProfile,
    };
    use tower::ServiceExt;

    async fn dummy_handler() -> &'static str {
        "OK"
    }

    async fn user_handler(AuthUser(user_id): AuthUser) -> String {
        user_id
    }

    async fn session_handler(MaybeUser(session): MaybeUser) -> String {
        session
            .map(|s| s.profile.sub)
            .unwrap_or_else(|| "nobody".to_string())
    }

    fn create_test_state(authenticator: Arc<dyn Authenticator>) -> Arc<AppState> {
        let audit_store = Arc::new(SqliteAuditStore::in_memory().unwrap()) as Arc<dyn AuditStore>;
        let (audit_handle, _writer) = create_audit_system(audit_store.clone(), 100);
        let lottery = Lottery::new(
            Arc::new(SqliteLotteryStore::in_memory().unwrap()),
            Arc::new(MockQrEncoder::new()),
            "http://localhost:5000",
        );
        let sessions = Arc::new(SqliteSessionStore::in_memory().unwrap()) as Arc<dyn SessionStore>;

        Arc::new(AppState::new(
            fixtures::config(),
            authenticator,
            lottery,
            audit_handle,
            audit_store,
            sessions,
            None,
        ))
    }

    fn admin_app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/test", get(dummy_handler))
            .route("/whoami", get(user_handler))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn body_string(response: Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_none_auth_allows_all() {
        let app = admin_app(create_test_state(Arc::new(NoneAuthenticator::new())));

        let request = Request::builder().uri("/whoami").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_api_key_auth_valid() {
        let app = admin_app(create_test_state(Arc::new(ApiKeyAuthenticator::new(
            "secret-key".to_string(),
        ))));

        let request = Request::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, "Bearer secret-key")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.starts_with("api_key:"));
    }

    #[tokio::test]
    async fn test_api_key_auth_invalid() {
        let app = admin_app(create_test_state(Arc::new(ApiKeyAuthenticator::new(
            "secret-key".to_string(),
        ))));

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer wrong-key")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("Invalid"));
    }

    #[tokio::test]
    async fn test_api_key_auth_missing() {
        let app = admin_app(create_test_state(Arc::new(ApiKeyAuthenticator::new(
            "secret-key".to_string(),
        ))));

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_x_api_key_header() {
        let app = admin_app(create_test_state(Arc::new(ApiKeyAuthenticator::new(
            "secret-key".to_string(),
        ))));

        let request = Request::builder()
            .uri("/test")
            .header("X-API-Key", "secret-key")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_jwt_auth_uses_subject_as_user() {
        let app = admin_app(create_test_state(Arc::new(JwtAuthenticator::new(
            jwks::test_verifier(),
        ))));

        let request = Request::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, format!("Bearer {}", jwks::admin_token()))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "scheduler@clients");
    }

    #[tokio::test]
    async fn test_jwt_auth_unreachable_key_set_is_503() {
        // No preloaded keys, so verification has to fetch them.
        let verifier = JwksVerifier::new(
            jwks::UNREACHABLE_JWKS_URI,
            jwks::TEST_ISSUER,
            jwks::TEST_AUDIENCE,
            jwks::TEST_KEY_ALGORITHM,
        );
        let app = admin_app(create_test_state(Arc::new(JwtAuthenticator::new(verifier))));

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, format!("Bearer {}", jwks::admin_token()))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_session_middleware_resolves_cookie() {
        let state = create_test_state(Arc::new(NoneAuthenticator::new()));
        let session = state
            .sessions()
            .create_session(
                &UserProfile {
                    sub: "auth0|alice".to_string(),
                    name: None,
                    email: None,
                },
                Duration::hours(1),
            )
            .unwrap();

        let app = Router::new()
            .route("/me", get(session_handler))
            .layer(middleware::from_fn_with_state(state.clone(), session_middleware))
            .with_state(state);

        let request = Request::builder()
            .uri("/me")
            .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, session.id))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(body_string(response).await, "auth0|alice");

        let request = Request::builder()
            .uri("/me")
            .header(header::COOKIE, format!("{}=bogus", SESSION_COOKIE))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(body_string(response).await, "nobody");
    }
}
