use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Round lifecycle
    RoundOpened {
        round_id: String,
        /// Identity of the admin client
        opened_by: String,
    },
    RoundClosed {
        round_id: String,
        closed_by: String,
        /// Tickets accepted while the round was open
        ticket_count: i64,
    },

    // Tickets
    TicketSubmitted {
        ticket_id: String,
        round_id: String,
        /// Subject of the logged-in submitter, absent for anonymous tickets
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_sub: Option<String>,
        numbers: Vec<u8>,
    },

    // Draws
    DrawPublished {
        round_id: String,
        draw_id: String,
        published_by: String,
        numbers: Vec<i64>,
    },

    // End-user sessions
    UserLoggedIn {
        user_sub: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    UserLoggedOut {
        user_sub: String,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::RoundOpened { .. } => "round_opened",
            Self::RoundClosed { .. } => "round_closed",
            Self::TicketSubmitted { .. } => "ticket_submitted",
            Self::DrawPublished { .. } => "draw_published",
            Self::UserLoggedIn { .. } => "user_logged_in",
            Self::UserLoggedOut { .. } => "user_logged_out",
        }
    }

    /// Extract round_id if this event concerns a round
    pub fn round_id(&self) -> Option<&str> {
        match self {
            Self::RoundOpened { round_id, .. }
            | Self::RoundClosed { round_id, .. }
            | Self::TicketSubmitted { round_id, .. }
            | Self::DrawPublished { round_id, .. } => Some(round_id),
            _ => None,
        }
    }

    /// Extract ticket_id if this event is ticket-related
    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            Self::TicketSubmitted { ticket_id, .. } => Some(ticket_id),
            _ => None,
        }
    }

    /// Extract the acting user or client, if any
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::RoundOpened { opened_by, .. } => Some(opened_by),
            Self::RoundClosed { closed_by, .. } => Some(closed_by),
            Self::DrawPublished { published_by, .. } => Some(published_by),
            Self::TicketSubmitted { user_sub, .. } => user_sub.as_deref(),
            Self::UserLoggedIn { user_sub, .. } | Self::UserLoggedOut { user_sub } => {
                Some(user_sub)
            }
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }
}

/// Stored audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub round_id: Option<String>,
    pub ticket_id: Option<String>,
    pub user_id: Option<String>,
    pub data: AuditEvent,
}

impl AuditRecord {
    /// Build a record (not yet stored) from an event.
    pub fn from_event(timestamp: DateTime<Utc>, event: AuditEvent) -> Self {
        Self {
            id: 0,
            timestamp,
            event_type: event.event_type().to_string(),
            round_id: event.round_id().map(String::from),
            ticket_id: event.ticket_id().map(String::from),
            user_id: event.user_id().map(String::from),
            data: event,
        }
    }
}
