//! End-user login through the configured OpenID Connect provider.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lotto_core::{AuditEvent, OidcClient, OidcError};
use serde::Deserialize;
use std::sync::Arc;

use super::middleware::{MaybeUser, SESSION_COOKIE};
use super::pages::not_found;
use crate::state::AppState;
use crate::views::{self, Nav};

/// Query string the provider redirects back with
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn login_failed(status: StatusCode, text: &str) -> Response {
    (
        status,
        Html(views::message(Nav::default(), "Login failed", text)),
    )
        .into_response()
}

/// Drop expired sessions and abandoned login attempts.
fn purge_expired(state: &AppState, oidc: &OidcClient) {
    match state.sessions().purge_expired(oidc.login_state_max_age()) {
        Ok(0) => {}
        Ok(purged) => tracing::debug!(purged, "Purged expired sessions and login states"),
        Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
    }
}

/// Start a login: remember state and nonce, then redirect to the provider.
pub async fn login(State(state): State<Arc<AppState>>) -> Response {
    let Some(oidc) = state.oidc() else {
        return not_found().await.into_response();
    };

    purge_expired(&state, oidc);

    match state.sessions().create_login_state() {
        Ok(login) => Redirect::to(&oidc.authorization_url(&login)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to store login state");
            login_failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login is temporarily unavailable.",
            )
        }
    }
}

/// Finish a login: check state, exchange the code, open a session.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(oidc) = state.oidc() else {
        return not_found().await.into_response();
    };

    let Some(state_param) = params.state.as_deref() else {
        return login_failed(StatusCode::BAD_REQUEST, "The login response is incomplete.");
    };

    let login = match state
        .sessions()
        .take_login_state(state_param, oidc.login_state_max_age())
    {
        Ok(Some(login)) => login,
        Ok(None) => {
            tracing::warn!("Callback with unknown or expired login state");
            return login_failed(
                StatusCode::BAD_REQUEST,
                "This login attempt has expired. Please log in again.",
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to read login state");
            return login_failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login is temporarily unavailable.",
            );
        }
    };

    if let Some(error) = params.error.as_deref() {
        let description = params.error_description.as_deref().unwrap_or(error);
        tracing::warn!(error, description, "Provider refused the login");
        return login_failed(StatusCode::BAD_REQUEST, description);
    }

    let Some(code) = params.code.as_deref() else {
        return login_failed(StatusCode::BAD_REQUEST, "The login response is incomplete.");
    };

    let profile = match oidc.exchange_code(code, &login).await {
        Ok(profile) => profile,
        Err(e) => {
            let status = match e {
                OidcError::TokenExchange(_) => StatusCode::BAD_GATEWAY,
                OidcError::InvalidIdToken(_) => StatusCode::UNAUTHORIZED,
                OidcError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            };
            tracing::warn!(error = %e, "Login failed");
            return login_failed(status, "We could not confirm your identity.");
        }
    };

    purge_expired(&state, oidc);

    let session = match state.sessions().create_session(&profile, oidc.session_ttl()) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create session");
            return login_failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login is temporarily unavailable.",
            );
        }
    };

    tracing::info!(user_sub = %profile.sub, "User logged in");
    state.audit().try_emit(AuditEvent::UserLoggedIn {
        user_sub: profile.sub.clone(),
        name: profile.name.clone(),
    });

    let cookie = Cookie::build((SESSION_COOKIE, session.id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.base_url().starts_with("https://"));

    (jar.add(cookie), Redirect::to("/")).into_response()
}

/// End the local session and the provider session.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    MaybeUser(session): MaybeUser,
    jar: CookieJar,
) -> Response {
    let Some(oidc) = state.oidc() else {
        return not_found().await.into_response();
    };

    if let Some(session) = session {
        match state.sessions().delete_session(&session.id) {
            Ok(_) => {
                tracing::info!(user_sub = %session.profile.sub, "User logged out");
                state.audit().try_emit(AuditEvent::UserLoggedOut {
                    user_sub: session.profile.sub.clone(),
                });
            }
            Err(e) => tracing::warn!(error = %e, "Failed to delete session"),
        }
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to(&oidc.logout_url(&state.base_url()))).into_response()
}
