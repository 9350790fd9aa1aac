//! The admin authentication seam and the open (development) authenticator.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity};

/// Why a bearer credential (admin token, API key or ID token) was refused.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was presented at all.
    #[error("Authentication required")]
    NotAuthenticated,

    /// A credential was presented but failed a check: bad signature,
    /// unknown key id, wrong issuer or audience, expired, or a wrong API key.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The signing key set could not be fetched, so nothing can be verified.
    #[error("Authentication service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The configured method is missing its settings.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl AuthError {
    /// HTTP status an admin endpoint answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::NotAuthenticated | AuthError::InvalidCredentials(_) => 401,
            AuthError::ServiceUnavailable(_) => 503,
            AuthError::ConfigurationError(_) => 500,
        }
    }

    /// Label for the auth failure counter.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::ServiceUnavailable(_) => "service_unavailable",
            AuthError::ConfigurationError(_) => "internal_error",
        }
    }

    /// The caller can fix this by sending a different credential.
    pub fn is_caller_fault(&self) -> bool {
        self.status_code() < 500
    }
}

/// Decides who is calling an admin endpoint.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Value of `auth.method` this authenticator implements.
    fn method_name(&self) -> &'static str;
}

/// `auth.method = "none"`: every admin call is made by the anonymous identity.
/// Only for local development.
#[derive(Debug, Default)]
pub struct NoneAuthenticator;

impl NoneAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        tracing::debug!(source_ip = %request.source_ip, "Admin call without authentication");
        Ok(Identity::anonymous())
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}
