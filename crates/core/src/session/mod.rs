//! End-user login sessions.

mod sqlite;
mod store;

pub use sqlite::SqliteSessionStore;
pub use store::{LoginState, Session, SessionError, SessionStore, UserProfile};
