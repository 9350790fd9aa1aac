use axum::{
    handler::HandlerWithoutStateExt,
    http::{header, HeaderName, HeaderValue},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware, session_middleware};
use super::{admin, audit, auth, handlers, pages};
use crate::state::AppState;

/// Sent with every response unless the handler already set them.
pub const SECURITY_HEADERS: [(HeaderName, &str); 4] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "no-referrer"),
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'self'; img-src 'self' data:; object-src 'none'; base-uri 'self'; form-action 'self'; frame-ancestors 'none'",
    ),
];

pub fn create_router(state: Arc<AppState>) -> Router {
    // End-user pages
    let page_routes = Router::new()
        .route("/", get(pages::home))
        .route("/submit", get(pages::submit_page).post(pages::submit_ticket))
        .route("/ticket/{id}", get(pages::ticket_page))
        .route("/my-tickets", get(pages::my_tickets))
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", get(auth::logout));

    // Admin (machine-to-machine)
    let admin_routes = Router::new()
        .route("/new-round", post(admin::new_round))
        .route("/close", post(admin::close_round))
        .route("/store-results", post(admin::store_results))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Operational API; only the audit trail needs credentials
    let api_routes = Router::new()
        .route("/audit", get(audit::query_audit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config));

    let router = Router::new()
        .merge(page_routes)
        .merge(admin_routes)
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics));

    let router = match state.config().server.static_dir.clone() {
        Some(dir) => {
            let static_files = ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .not_found_service(pages::not_found.into_service());
            router.fallback_service(static_files)
        }
        None => router.fallback(pages::not_found),
    };

    let mut router = router.layer(middleware::from_fn_with_state(
        state.clone(),
        session_middleware,
    ));
    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ));
    }

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
