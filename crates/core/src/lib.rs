pub mod audit;
pub mod auth;
pub mod config;
pub mod lottery;
pub mod oidc;
pub mod qr;
pub mod session;
pub mod testing;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore,
};
pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    JwksVerifier, JwtAuthenticator, NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    OidcConfig, SanitizedConfig,
};
pub use lottery::{
    CloseRoundOutcome, Draw, IssuedTicket, Lottery, LotteryError, LotteryStore, NumberInput,
    OpenRoundOutcome, Round, RoundStatus, RoundSummary, SqliteLotteryStore, SubmitTicket, Ticket,
    TicketDetail, ValidationError,
};
pub use oidc::{OidcClient, OidcError};
pub use qr::{PngQrEncoder, QrEncoder, QrError};
pub use session::{LoginState, Session, SessionError, SessionStore, SqliteSessionStore, UserProfile};
