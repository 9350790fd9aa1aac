//! Test doubles and fixtures shared by unit and integration tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use lotto_core::testing::{jwks, MockQrEncoder};
//!
//! let qr = MockQrEncoder::new();
//! let verifier = jwks::test_verifier();
//! let token = jwks::admin_token();
//! ```

pub mod jwks;
mod mock_qr;

pub use mock_qr::MockQrEncoder;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::{AuthConfig, AuthMethod, Config, DatabaseConfig, QrConfig, ServerConfig};
    use crate::lottery::{NumberInput, SubmitTicket};

    /// Config with auth disabled and default everything else.
    pub fn config() -> Config {
        Config {
            auth: AuthConfig {
                method: AuthMethod::None,
                api_key: None,
                jwt: None,
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            qr: QrConfig::default(),
            oidc: None,
        }
    }

    /// An anonymous submission.
    pub fn submission(id_number: &str, numbers: &str) -> SubmitTicket {
        SubmitTicket {
            id_number: id_number.to_string(),
            numbers: NumberInput::from(numbers),
            user_sub: None,
        }
    }

    /// A submission by a logged-in user.
    pub fn user_submission(id_number: &str, numbers: &str, user_sub: &str) -> SubmitTicket {
        SubmitTicket {
            user_sub: Some(user_sub.to_string()),
            ..submission(id_number, numbers)
        }
    }
}
