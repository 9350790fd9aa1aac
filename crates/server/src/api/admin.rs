//! Round administration for machine-to-machine clients.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use lotto_core::{CloseRoundOutcome, LotteryError, OpenRoundOutcome};
use serde::Deserialize;
use std::sync::Arc;

use super::middleware::AuthUser;
use super::ErrorResponse;
use crate::metrics::{DRAWS_PUBLISHED_TOTAL, ROUNDS_CLOSED_TOTAL, ROUNDS_OPENED_TOTAL};
use crate::state::AppState;

type AdminResult = Result<StatusCode, (StatusCode, Json<ErrorResponse>)>;

/// Request body for publishing results
#[derive(Debug, Deserialize)]
pub struct StoreResultsBody {
    /// Winning numbers; duplicates are dropped and the rest sorted
    pub numbers: Vec<i64>,
}

fn lottery_error(e: LotteryError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        LotteryError::NotFound(_) => ErrorResponse::new(StatusCode::NOT_FOUND, e.to_string()),
        e if e.is_client_error() => ErrorResponse::new(StatusCode::BAD_REQUEST, e.to_string()),
        e => {
            tracing::error!(error = %e, "Admin operation failed");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Open a new round. Does nothing when one is already open.
pub async fn new_round(State(state): State<Arc<AppState>>, AuthUser(actor): AuthUser) -> AdminResult {
    let outcome = state.lottery().open_round(&actor).map_err(lottery_error)?;
    if let OpenRoundOutcome::Opened(_) = outcome {
        ROUNDS_OPENED_TOTAL.inc();
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Close the open round. Does nothing when none is open.
pub async fn close_round(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> AdminResult {
    let outcome = state.lottery().close_round(&actor).map_err(lottery_error)?;
    if let CloseRoundOutcome::Closed(_) = outcome {
        ROUNDS_CLOSED_TOTAL.inc();
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Publish winning numbers for the latest closed round without results.
pub async fn store_results(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    payload: Result<Json<StoreResultsBody>, JsonRejection>,
) -> AdminResult {
    let Json(body) = payload.map_err(|e| {
        tracing::warn!(error = %e, "Malformed results payload");
        ErrorResponse::new(StatusCode::BAD_REQUEST, e.body_text())
    })?;

    state
        .lottery()
        .publish_draw(&body.numbers, &actor)
        .map_err(lottery_error)?;
    DRAWS_PUBLISHED_TOTAL.inc();

    Ok(StatusCode::NO_CONTENT)
}
