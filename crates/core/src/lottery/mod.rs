//! Lottery domain: rounds, tickets and draws.

mod numbers;
mod service;
mod sqlite_store;
mod store;
mod types;

pub use numbers::{
    normalize_draw, parse_numbers, validate_identity, validate_numbers, NumberInput,
    ValidationError, HIGHEST, LOWEST, MAX_ID_NUMBER_LEN, MAX_PICKS, MIN_PICKS,
};
pub use service::{IssuedTicket, Lottery, SubmitTicket};
pub use sqlite_store::SqliteLotteryStore;
pub use store::{LotteryError, LotteryStore, NewTicket, TicketFilter};
pub use types::{
    CloseRoundOutcome, Draw, OpenRoundOutcome, Round, RoundStatus, RoundSummary, Ticket,
    TicketDetail,
};
