//! End-user pages: round status, ticket submission, ticket lookup.

use axum::{
    extract::{FromRequest, Path, Request, State},
    http::{header, HeaderName, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use lotto_core::{LotteryError, NumberInput, Session, SubmitTicket};
use serde::Deserialize;
use std::sync::Arc;

use super::middleware::MaybeUser;
use crate::metrics::{TICKETS_ISSUED_TOTAL, TICKET_REJECTIONS_TOTAL};
use crate::state::AppState;
use crate::views::{self, Nav};

/// Response header carrying the public link encoded in the QR image.
pub const TICKET_URL_HEADER: &str = "x-ticket-url";

/// Ticket submission as posted by the form or by a JSON client.
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    #[serde(rename = "idNumber", alias = "id_number", default)]
    pub id_number: String,
    #[serde(default)]
    pub numbers: Option<NumberInput>,
}

/// Accepts `application/json` and `application/x-www-form-urlencoded` bodies.
pub struct SubmitForm(pub SubmitBody);

impl<S> FromRequest<S> for SubmitForm
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let body = if is_json {
            Json::<SubmitBody>::from_request(req, state)
                .await
                .map(|Json(body)| body)
                .map_err(|e| e.body_text())
        } else {
            Form::<SubmitBody>::from_request(req, state)
                .await
                .map(|Form(body)| body)
                .map_err(|e| e.body_text())
        };

        body.map(SubmitForm).map_err(|reason| {
            TICKET_REJECTIONS_TOTAL
                .with_label_values(&["malformed_body"])
                .inc();
            page(
                StatusCode::BAD_REQUEST,
                views::message(Nav::default(), "Ticket rejected", &reason),
            )
        })
    }
}

fn page(status: StatusCode, html: String) -> Response {
    (status, Html(html)).into_response()
}

fn nav<'a>(state: &AppState, session: &'a Option<Session>) -> Nav<'a> {
    Nav {
        user: session.as_ref().map(|s| &s.profile),
        login_enabled: state.oidc().is_some(),
    }
}

/// HTML page for a failed lottery operation.
pub(crate) fn lottery_error_page(nav: Nav<'_>, title: &str, e: &LotteryError) -> Response {
    match e {
        LotteryError::NotFound(_) => page(StatusCode::NOT_FOUND, views::not_found(nav)),
        e if e.is_client_error() => {
            page(StatusCode::BAD_REQUEST, views::message(nav, title, &e.to_string()))
        }
        e => {
            tracing::error!(error = %e, "Lottery operation failed");
            page(
                StatusCode::INTERNAL_SERVER_ERROR,
                views::message(nav, "Something went wrong", "Please try again later."),
            )
        }
    }
}

pub async fn home(State(state): State<Arc<AppState>>, MaybeUser(session): MaybeUser) -> Response {
    let nav = nav(&state, &session);
    match state.lottery().latest_round() {
        Ok(latest) => page(StatusCode::OK, views::home(nav, latest.as_ref())),
        Err(e) => lottery_error_page(nav, "Lotto", &e),
    }
}

/// Ticket form, or a notice when no round is open.
pub async fn submit_page(
    State(state): State<Arc<AppState>>,
    MaybeUser(session): MaybeUser,
) -> Response {
    let nav = nav(&state, &session);
    match state.lottery().current_open_round() {
        Ok(Some(round)) => page(StatusCode::OK, views::submit_form(nav, &round)),
        Ok(None) => lottery_error_page(nav, "No open round", &LotteryError::NoActiveRound),
        Err(e) => lottery_error_page(nav, "Submit a ticket", &e),
    }
}

/// Store a ticket and answer with the QR code of its link as a PNG.
pub async fn submit_ticket(
    State(state): State<Arc<AppState>>,
    MaybeUser(session): MaybeUser,
    SubmitForm(body): SubmitForm,
) -> Response {
    let request = SubmitTicket {
        id_number: body.id_number,
        numbers: body
            .numbers
            .unwrap_or_else(|| NumberInput::Delimited(String::new())),
        user_sub: session.as_ref().map(|s| s.profile.sub.clone()),
    };

    match state.lottery().submit_ticket(request) {
        Ok(issued) => {
            TICKETS_ISSUED_TOTAL.inc();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "image/png".to_string()),
                    (header::CACHE_CONTROL, "no-store".to_string()),
                    (HeaderName::from_static(TICKET_URL_HEADER), issued.link),
                ],
                issued.qr_png,
            )
                .into_response()
        }
        Err(e) => {
            if e.is_client_error() {
                TICKET_REJECTIONS_TOTAL.with_label_values(&[e.code()]).inc();
                tracing::info!(reason = e.code(), error = %e, "Ticket rejected");
            }
            lottery_error_page(nav(&state, &session), "Ticket rejected", &e)
        }
    }
}

/// Public ticket page, reachable by anyone holding the link.
pub async fn ticket_page(
    State(state): State<Arc<AppState>>,
    MaybeUser(session): MaybeUser,
    Path(id): Path<String>,
) -> Response {
    let nav = nav(&state, &session);
    match state.lottery().ticket_detail(&id) {
        Ok(detail) => page(StatusCode::OK, views::ticket(nav, &detail)),
        Err(e) => lottery_error_page(nav, "Your ticket", &e),
    }
}

/// Tickets of the logged-in user. Anonymous visitors are sent to log in.
pub async fn my_tickets(
    State(state): State<Arc<AppState>>,
    MaybeUser(session): MaybeUser,
) -> Response {
    if state.oidc().is_none() {
        return not_found().await.into_response();
    }
    let Some(ref current) = session else {
        return Redirect::to("/login").into_response();
    };

    let nav = nav(&state, &session);
    match state.lottery().tickets_for_user(&current.profile.sub) {
        Ok(tickets) => page(StatusCode::OK, views::my_tickets(nav, &tickets)),
        Err(e) => lottery_error_page(nav, "My tickets", &e),
    }
}

pub async fn not_found() -> (StatusCode, Html<String>) {
    (StatusCode::NOT_FOUND, Html(views::not_found(Nav::default())))
}
