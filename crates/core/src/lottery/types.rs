//! Lottery domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a round. Rounds only ever move from `Open` to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Open,
    Closed,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Open => "open",
            RoundStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(RoundStatus::Open),
            "closed" => Some(RoundStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lottery cycle. Tickets are accepted while it is open; a draw can be
/// published once it is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: String,
    pub status: RoundStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Round {
    pub fn is_open(&self) -> bool {
        self.status == RoundStatus::Open
    }
}

/// A submitted number selection. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub round_id: String,
    /// Identity document number of the submitter.
    pub id_number: String,
    /// Sorted ascending, no duplicates.
    pub numbers: Vec<u8>,
    /// Subject of the logged-in user, absent for anonymous submissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_sub: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Winning numbers published for a closed round. At most one per round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draw {
    pub id: String,
    pub round_id: String,
    /// Sorted ascending, no duplicates.
    pub numbers: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

/// A round with its ticket count and draw, if published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSummary {
    pub round: Round,
    pub ticket_count: i64,
    pub draw: Option<Draw>,
}

/// A ticket together with the round it belongs to and that round's draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub round: Round,
    pub draw: Option<Draw>,
}

impl TicketDetail {
    /// Ticket numbers that appear in the draw. Empty until a draw is published.
    pub fn matched_numbers(&self) -> Vec<u8> {
        match &self.draw {
            Some(draw) => self
                .ticket
                .numbers
                .iter()
                .copied()
                .filter(|n| draw.numbers.binary_search(&i64::from(*n)).is_ok())
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Result of asking for a new round.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenRoundOutcome {
    /// A new round was created.
    Opened(Round),
    /// A round was already open; nothing changed.
    AlreadyOpen(Round),
}

impl OpenRoundOutcome {
    pub fn round(&self) -> &Round {
        match self {
            OpenRoundOutcome::Opened(round) | OpenRoundOutcome::AlreadyOpen(round) => round,
        }
    }
}

/// Result of asking to close the current round.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseRoundOutcome {
    Closed(Round),
    /// No round was open; nothing changed.
    NothingOpen,
}
