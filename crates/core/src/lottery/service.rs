//! Lottery operations: round lifecycle, ticket issuance and draw publication.

use std::sync::Arc;

use super::numbers::{normalize_draw, validate_identity, validate_numbers, NumberInput};
use super::store::{LotteryError, LotteryStore, NewTicket, TicketFilter};
use super::types::{CloseRoundOutcome, Draw, OpenRoundOutcome, Round, RoundSummary, Ticket, TicketDetail};
use crate::audit::{AuditEvent, AuditHandle};
use crate::qr::QrEncoder;

/// Upper bound on tickets listed for one user.
const USER_TICKET_LIMIT: i64 = 200;

/// A ticket submission as received from the user.
#[derive(Debug, Clone)]
pub struct SubmitTicket {
    pub id_number: String,
    pub numbers: NumberInput,
    pub user_sub: Option<String>,
}

/// A stored ticket with its public link and the link's QR code.
#[derive(Debug, Clone)]
pub struct IssuedTicket {
    pub ticket: Ticket,
    pub link: String,
    pub qr_png: Vec<u8>,
}

/// Entry point for every lottery operation.
pub struct Lottery {
    store: Arc<dyn LotteryStore>,
    qr: Arc<dyn QrEncoder>,
    base_url: String,
    audit: Option<AuditHandle>,
}

impl Lottery {
    pub fn new(store: Arc<dyn LotteryStore>, qr: Arc<dyn QrEncoder>, base_url: &str) -> Self {
        Self {
            store,
            qr,
            base_url: base_url.trim_end_matches('/').to_string(),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.try_emit(event);
        }
    }

    /// Open a new round unless one is already open.
    pub fn open_round(&self, actor: &str) -> Result<OpenRoundOutcome, LotteryError> {
        let outcome = self.store.open_round()?;
        match &outcome {
            OpenRoundOutcome::Opened(round) => {
                tracing::info!(round_id = %round.id, actor, "Round opened");
                self.emit(AuditEvent::RoundOpened {
                    round_id: round.id.clone(),
                    opened_by: actor.to_string(),
                });
            }
            OpenRoundOutcome::AlreadyOpen(round) => {
                tracing::debug!(round_id = %round.id, "Round already open, nothing to do");
            }
        }
        Ok(outcome)
    }

    /// Close the current round, if any.
    pub fn close_round(&self, actor: &str) -> Result<CloseRoundOutcome, LotteryError> {
        let outcome = self.store.close_round()?;
        match &outcome {
            CloseRoundOutcome::Closed(round) => {
                let ticket_count = self
                    .store
                    .count_tickets(&TicketFilter::new().with_round_id(&round.id))?;
                tracing::info!(round_id = %round.id, actor, ticket_count, "Round closed");
                self.emit(AuditEvent::RoundClosed {
                    round_id: round.id.clone(),
                    closed_by: actor.to_string(),
                    ticket_count,
                });
            }
            CloseRoundOutcome::NothingOpen => {
                tracing::debug!("No open round to close");
            }
        }
        Ok(outcome)
    }

    pub fn current_open_round(&self) -> Result<Option<Round>, LotteryError> {
        self.store.current_open_round()
    }

    pub fn latest_round(&self) -> Result<Option<RoundSummary>, LotteryError> {
        self.store.latest_round()
    }

    /// Validate and store a ticket in the open round, then render its link as a QR code.
    pub fn submit_ticket(&self, request: SubmitTicket) -> Result<IssuedTicket, LotteryError> {
        let id_number = validate_identity(&request.id_number)?;
        let numbers = validate_numbers(&request.numbers)?;

        let ticket = self.store.insert_ticket(NewTicket {
            id_number,
            numbers,
            user_sub: request.user_sub,
        })?;

        let link = self.ticket_link(&ticket.id);
        tracing::info!(
            ticket_id = %ticket.id,
            round_id = %ticket.round_id,
            picks = ticket.numbers.len(),
            "Ticket issued"
        );
        self.emit(AuditEvent::TicketSubmitted {
            ticket_id: ticket.id.clone(),
            round_id: ticket.round_id.clone(),
            user_sub: ticket.user_sub.clone(),
            numbers: ticket.numbers.clone(),
        });

        let qr_png = self.qr.encode_png(&link).inspect_err(|e| {
            tracing::error!(ticket_id = %ticket.id, error = %e, "QR encoding failed");
        })?;

        Ok(IssuedTicket {
            ticket,
            link,
            qr_png,
        })
    }

    /// Public URL of a ticket page.
    pub fn ticket_link(&self, ticket_id: &str) -> String {
        format!("{}/ticket/{}", self.base_url, ticket_id)
    }

    pub fn ticket_detail(&self, ticket_id: &str) -> Result<TicketDetail, LotteryError> {
        self.store
            .get_ticket(ticket_id)?
            .ok_or_else(|| LotteryError::NotFound(format!("ticket {ticket_id}")))
    }

    /// Tickets submitted by a logged-in user, newest first.
    pub fn tickets_for_user(&self, user_sub: &str) -> Result<Vec<TicketDetail>, LotteryError> {
        self.store.list_tickets(
            &TicketFilter::new()
                .with_user_sub(user_sub)
                .with_limit(USER_TICKET_LIMIT),
        )
    }

    /// Publish the winning numbers for the latest closed round without a draw.
    pub fn publish_draw(&self, numbers: &[i64], actor: &str) -> Result<Draw, LotteryError> {
        let numbers = normalize_draw(numbers)?;

        let round = self
            .store
            .latest_undrawn_round()?
            .ok_or(LotteryError::NoEligibleRound)?;

        let draw = self.store.insert_draw(&round.id, &numbers)?;

        tracing::info!(round_id = %draw.round_id, numbers = ?draw.numbers, actor, "Draw published");
        self.emit(AuditEvent::DrawPublished {
            round_id: draw.round_id.clone(),
            draw_id: draw.id.clone(),
            published_by: actor.to_string(),
            numbers: draw.numbers.clone(),
        });

        Ok(draw)
    }
}
