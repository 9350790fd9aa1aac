use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{random_token, LoginState, Session, SessionError, SessionStore, UserProfile};

/// SQLite-backed session store
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn new(path: &Path) -> Result<Self, SessionError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(StdDuration::from_secs(5))?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, SessionError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, SessionError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_sub TEXT NOT NULL,
                name TEXT,
                email TEXT,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);

            CREATE TABLE IF NOT EXISTS login_states (
                state TEXT PRIMARY KEY,
                nonce TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, SessionError> {
        self.conn
            .lock()
            .map_err(|_| SessionError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
        Ok(Session {
            id: row.get(0)?,
            profile: UserProfile {
                sub: row.get(1)?,
                name: row.get(2)?,
                email: row.get(3)?,
            },
            created_at: parse_timestamp(4, &row.get::<_, String>(4)?)?,
            expires_at: parse_timestamp(5, &row.get::<_, String>(5)?)?,
        })
    }

    fn find_session(conn: &Connection, id: &str) -> rusqlite::Result<Option<Session>> {
        conn.query_row(
            "SELECT id, user_sub, name, email, created_at, expires_at FROM sessions WHERE id = ?",
            params![id],
            Self::row_to_session,
        )
        .optional()
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl SessionStore for SqliteSessionStore {
    fn create_session(&self, profile: &UserProfile, ttl: Duration) -> Result<Session, SessionError> {
        let conn = self.conn()?;

        let created_at = Utc::now().trunc_subsecs(6);
        let session = Session {
            id: random_token(),
            profile: profile.clone(),
            created_at,
            expires_at: created_at + ttl,
        };

        conn.execute(
            "INSERT INTO sessions (id, user_sub, name, email, created_at, expires_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                session.id,
                session.profile.sub,
                session.profile.name,
                session.profile.email,
                format_timestamp(&session.created_at),
                format_timestamp(&session.expires_at),
            ],
        )?;

        Ok(session)
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let conn = self.conn()?;
        let session = Self::find_session(&conn, id)?;
        Ok(session.filter(|s| !s.is_expired_at(Utc::now())))
    }

    fn delete_session(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let conn = self.conn()?;
        let session = Self::find_session(&conn, id)?;
        if session.is_some() {
            conn.execute("DELETE FROM sessions WHERE id = ?", params![id])?;
        }
        Ok(session)
    }

    fn create_login_state(&self) -> Result<LoginState, SessionError> {
        let conn = self.conn()?;

        let login = LoginState {
            state: random_token(),
            nonce: random_token(),
            created_at: Utc::now().trunc_subsecs(6),
        };

        conn.execute(
            "INSERT INTO login_states (state, nonce, created_at) VALUES (?, ?, ?)",
            params![login.state, login.nonce, format_timestamp(&login.created_at)],
        )?;

        Ok(login)
    }

    fn take_login_state(
        &self,
        state: &str,
        max_age: Duration,
    ) -> Result<Option<LoginState>, SessionError> {
        let conn = self.conn()?;

        let found = conn
            .query_row(
                "SELECT state, nonce, created_at FROM login_states WHERE state = ?",
                params![state],
                |row| {
                    Ok(LoginState {
                        state: row.get(0)?,
                        nonce: row.get(1)?,
                        created_at: parse_timestamp(2, &row.get::<_, String>(2)?)?,
                    })
                },
            )
            .optional()?;

        let Some(login) = found else {
            return Ok(None);
        };

        conn.execute("DELETE FROM login_states WHERE state = ?", params![state])?;

        if login.created_at + max_age <= Utc::now() {
            return Ok(None);
        }
        Ok(Some(login))
    }

    fn purge_expired(&self, login_max_age: Duration) -> Result<usize, SessionError> {
        let conn = self.conn()?;
        let now = Utc::now();

        let sessions = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?",
            params![format_timestamp(&now)],
        )?;
        let logins = conn.execute(
            "DELETE FROM login_states WHERE created_at <= ?",
            params![format_timestamp(&(now - login_max_age))],
        )?;

        Ok(sessions + logins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            sub: "auth0|abc".to_string(),
            name: Some("Grace".to_string()),
            email: None,
        }
    }

    #[test]
    fn test_create_and_get_session() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let session = store.create_session(&profile(), Duration::hours(24)).unwrap();

        let fetched = store.get_session(&session.id).unwrap().unwrap();
        assert_eq!(fetched, session);
        assert_eq!(fetched.expires_at - fetched.created_at, Duration::hours(24));
    }

    #[test]
    fn test_expired_session_is_not_returned() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let session = store.create_session(&profile(), Duration::seconds(-1)).unwrap();

        assert!(store.get_session(&session.id).unwrap().is_none());
        assert_eq!(store.purge_expired(Duration::minutes(10)).unwrap(), 1);
    }

    #[test]
    fn test_delete_session() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let session = store.create_session(&profile(), Duration::hours(1)).unwrap();

        let removed = store.delete_session(&session.id).unwrap();
        assert_eq!(removed.map(|s| s.profile.sub), Some("auth0|abc".to_string()));
        assert!(store.get_session(&session.id).unwrap().is_none());
        assert!(store.delete_session(&session.id).unwrap().is_none());
    }

    #[test]
    fn test_login_state_is_single_use() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let login = store.create_login_state().unwrap();

        let taken = store
            .take_login_state(&login.state, Duration::minutes(10))
            .unwrap();
        assert_eq!(taken, Some(login.clone()));
        assert!(store
            .take_login_state(&login.state, Duration::minutes(10))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_stale_login_state_is_rejected() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let login = store.create_login_state().unwrap();

        assert!(store
            .take_login_state(&login.state, Duration::zero())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unknown_login_state() {
        let store = SqliteSessionStore::in_memory().unwrap();
        assert!(store
            .take_login_state("forged", Duration::minutes(10))
            .unwrap()
            .is_none());
    }
}
