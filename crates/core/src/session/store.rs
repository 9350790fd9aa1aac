use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for SessionError {
    fn from(e: rusqlite::Error) -> Self {
        SessionError::Database(e.to_string())
    }
}

/// Who the identity provider says the user is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable subject identifier (`sub` claim).
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserProfile {
    /// Name to show on pages: name, else email, else subject.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

/// A logged-in user, identified by an opaque cookie token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: String,
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// An authorization request in flight, matched on callback by `state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginState {
    pub state: String,
    pub nonce: String,
    pub created_at: DateTime<Utc>,
}

/// Storage for sessions and pending logins.
pub trait SessionStore: Send + Sync {
    fn create_session(&self, profile: &UserProfile, ttl: Duration) -> Result<Session, SessionError>;

    /// The session if it exists and has not expired.
    fn get_session(&self, id: &str) -> Result<Option<Session>, SessionError>;

    /// Returns the removed session, if there was one.
    fn delete_session(&self, id: &str) -> Result<Option<Session>, SessionError>;

    /// Remember a login attempt.
    fn create_login_state(&self) -> Result<LoginState, SessionError>;

    /// Consume a login attempt. Each state can be taken once, and only
    /// within `max_age` of its creation.
    fn take_login_state(
        &self,
        state: &str,
        max_age: Duration,
    ) -> Result<Option<LoginState>, SessionError>;

    /// Drop expired sessions and stale login attempts. Returns how many rows went.
    fn purge_expired(&self, login_max_age: Duration) -> Result<usize, SessionError>;
}

/// Random URL-safe token.
pub(crate) fn random_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}
