//! Lottery storage trait and errors.

use thiserror::Error;

use super::numbers::ValidationError;
use super::types::{CloseRoundOutcome, Draw, OpenRoundOutcome, Round, RoundSummary, Ticket, TicketDetail};
use crate::qr::QrError;

/// Error type for lottery operations.
#[derive(Debug, Error)]
pub enum LotteryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Tickets can only be submitted while a round is open.
    #[error("no round is currently open for submissions")]
    NoActiveRound,

    /// Results need a closed round without a draw.
    #[error("no eligible round: results need a closed round without published results")]
    NoEligibleRound,

    #[error("results were already published for round {round_id}")]
    AlreadyPublished { round_id: String },

    /// Raised by the store when a draw targets a round that is not closed.
    #[error("round {round_id} is still open")]
    RoundStillOpen { round_id: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("QR encoding failed: {0}")]
    Qr(#[from] QrError),

    #[error("database error: {0}")]
    Database(String),
}

impl LotteryError {
    /// Round/ticket/draw state did not allow the operation.
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            LotteryError::NoActiveRound
                | LotteryError::NoEligibleRound
                | LotteryError::AlreadyPublished { .. }
                | LotteryError::RoundStillOpen { .. }
        )
    }

    /// Caused by the caller rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, LotteryError::Validation(_)) || self.is_state_conflict()
    }

    /// Stable label for metrics and logs.
    pub fn code(&self) -> &'static str {
        match self {
            LotteryError::Validation(e) => e.code(),
            LotteryError::NoActiveRound => "no_active_round",
            LotteryError::NoEligibleRound => "no_eligible_round",
            LotteryError::AlreadyPublished { .. } => "already_published",
            LotteryError::RoundStillOpen { .. } => "round_still_open",
            LotteryError::NotFound(_) => "not_found",
            LotteryError::Qr(_) => "qr",
            LotteryError::Database(_) => "database",
        }
    }
}

impl From<rusqlite::Error> for LotteryError {
    fn from(e: rusqlite::Error) -> Self {
        LotteryError::Database(e.to_string())
    }
}

/// Ticket to persist. Values are already validated.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub id_number: String,
    pub numbers: Vec<u8>,
    pub user_sub: Option<String>,
}

/// Filter for querying tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub round_id: Option<String>,
    pub user_sub: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl TicketFilter {
    pub fn new() -> Self {
        Self {
            round_id: None,
            user_sub: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_round_id(mut self, round_id: impl Into<String>) -> Self {
        self.round_id = Some(round_id.into());
        self
    }

    pub fn with_user_sub(mut self, user_sub: impl Into<String>) -> Self {
        self.user_sub = Some(user_sub.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Storage for rounds, tickets and draws.
///
/// Implementations run every state check together with the write it guards,
/// so "at most one open round" and "at most one draw per round" hold for
/// callers sharing a store.
pub trait LotteryStore: Send + Sync {
    /// Create a round unless one is already open.
    fn open_round(&self) -> Result<OpenRoundOutcome, LotteryError>;

    /// Close the most recently created open round, if any.
    fn close_round(&self) -> Result<CloseRoundOutcome, LotteryError>;

    /// The most recently created open round.
    fn current_open_round(&self) -> Result<Option<Round>, LotteryError>;

    /// The most recently created round of any status.
    fn latest_round(&self) -> Result<Option<RoundSummary>, LotteryError>;

    /// Store a ticket in the currently open round.
    /// Fails with `NoActiveRound` when no round is open.
    fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, LotteryError>;

    fn get_ticket(&self, id: &str) -> Result<Option<TicketDetail>, LotteryError>;

    /// Tickets matching the filter, newest first.
    fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketDetail>, LotteryError>;

    fn count_tickets(&self, filter: &TicketFilter) -> Result<i64, LotteryError>;

    /// The most recently created closed round that has no draw yet.
    fn latest_undrawn_round(&self) -> Result<Option<Round>, LotteryError>;

    /// Store the draw of a closed round. Numbers are already normalized.
    ///
    /// Guards the round itself, whatever the caller checked before:
    /// `NotFound` for an unknown id, `RoundStillOpen` for an open round and
    /// `AlreadyPublished` when a draw exists.
    fn insert_draw(&self, round_id: &str, numbers: &[i64]) -> Result<Draw, LotteryError>;
}
