//! SQLite-backed lottery store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use super::store::{LotteryError, LotteryStore, NewTicket, TicketFilter};
use super::types::{
    CloseRoundOutcome, Draw, OpenRoundOutcome, Round, RoundStatus, RoundSummary, Ticket,
    TicketDetail,
};

const ROUND_COLUMNS: &str = "id, status, created_at, closed_at";

const DETAIL_QUERY: &str = "SELECT t.id, t.round_id, t.id_number, t.numbers, t.user_sub, t.created_at, \
     r.status, r.created_at, r.closed_at, d.id, d.numbers, d.created_at \
     FROM tickets t \
     JOIN rounds r ON r.id = t.round_id \
     LEFT JOIN draws d ON d.round_id = t.round_id";

/// SQLite-backed lottery store.
pub struct SqliteLotteryStore {
    conn: Mutex<Connection>,
}

impl SqliteLotteryStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, LotteryError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, LotteryError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LotteryError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS rounds (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL CHECK (status IN ('open', 'closed')),
                created_at TEXT NOT NULL,
                closed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_rounds_status_created ON rounds(status, created_at DESC);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_rounds_single_open ON rounds(status) WHERE status = 'open';

            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                round_id TEXT NOT NULL REFERENCES rounds(id),
                id_number TEXT NOT NULL,
                numbers TEXT NOT NULL,
                user_sub TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_round ON tickets(round_id);
            CREATE INDEX IF NOT EXISTS idx_tickets_user_sub ON tickets(user_sub);

            CREATE TABLE IF NOT EXISTS draws (
                id TEXT PRIMARY KEY,
                round_id TEXT NOT NULL UNIQUE REFERENCES rounds(id),
                numbers TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, LotteryError> {
        self.conn
            .lock()
            .map_err(|_| LotteryError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref round_id) = filter.round_id {
            conditions.push("t.round_id = ?");
            params.push(Box::new(round_id.clone()));
        }

        if let Some(ref user_sub) = filter.user_sub {
            conditions.push("t.user_sub = ?");
            params.push(Box::new(user_sub.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_round(row: &rusqlite::Row) -> rusqlite::Result<Round> {
        Ok(Round {
            id: row.get(0)?,
            status: parse_status(1, &row.get::<_, String>(1)?)?,
            created_at: parse_timestamp(2, &row.get::<_, String>(2)?)?,
            closed_at: row
                .get::<_, Option<String>>(3)?
                .map(|s| parse_timestamp(3, &s))
                .transpose()?,
        })
    }

    fn row_to_draw(row: &rusqlite::Row) -> rusqlite::Result<Draw> {
        Ok(Draw {
            id: row.get(0)?,
            round_id: row.get(1)?,
            numbers: parse_json(2, &row.get::<_, String>(2)?)?,
            created_at: parse_timestamp(3, &row.get::<_, String>(3)?)?,
        })
    }

    fn row_to_detail(row: &rusqlite::Row) -> rusqlite::Result<TicketDetail> {
        let round_id: String = row.get(1)?;

        let ticket = Ticket {
            id: row.get(0)?,
            round_id: round_id.clone(),
            id_number: row.get(2)?,
            numbers: parse_json(3, &row.get::<_, String>(3)?)?,
            user_sub: row.get(4)?,
            created_at: parse_timestamp(5, &row.get::<_, String>(5)?)?,
        };

        let round = Round {
            id: round_id.clone(),
            status: parse_status(6, &row.get::<_, String>(6)?)?,
            created_at: parse_timestamp(7, &row.get::<_, String>(7)?)?,
            closed_at: row
                .get::<_, Option<String>>(8)?
                .map(|s| parse_timestamp(8, &s))
                .transpose()?,
        };

        let draw = match row.get::<_, Option<String>>(9)? {
            Some(draw_id) => Some(Draw {
                id: draw_id,
                round_id,
                numbers: parse_json(10, &row.get::<_, String>(10)?)?,
                created_at: parse_timestamp(11, &row.get::<_, String>(11)?)?,
            }),
            None => None,
        };

        Ok(TicketDetail {
            ticket,
            round,
            draw,
        })
    }

    fn find_open_round(conn: &Connection) -> rusqlite::Result<Option<Round>> {
        conn.query_row(
            &format!(
                "SELECT {ROUND_COLUMNS} FROM rounds WHERE status = 'open' \
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ),
            [],
            Self::row_to_round,
        )
        .optional()
    }

    fn find_round(conn: &Connection, id: &str) -> rusqlite::Result<Option<Round>> {
        conn.query_row(
            &format!("SELECT {ROUND_COLUMNS} FROM rounds WHERE id = ?"),
            params![id],
            Self::row_to_round,
        )
        .optional()
    }

    fn find_draw(conn: &Connection, round_id: &str) -> rusqlite::Result<Option<Draw>> {
        conn.query_row(
            "SELECT id, round_id, numbers, created_at FROM draws WHERE round_id = ?",
            params![round_id],
            Self::row_to_draw,
        )
        .optional()
    }
}

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_status(idx: usize, value: &str) -> rusqlite::Result<RoundStatus> {
    RoundStatus::parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown round status '{value}'").into(),
        )
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl LotteryStore for SqliteLotteryStore {
    fn open_round(&self) -> Result<OpenRoundOutcome, LotteryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = Self::find_open_round(&tx)? {
            return Ok(OpenRoundOutcome::AlreadyOpen(existing));
        }

        let round = Round {
            id: uuid::Uuid::new_v4().to_string(),
            status: RoundStatus::Open,
            created_at: now(),
            closed_at: None,
        };

        tx.execute(
            "INSERT INTO rounds (id, status, created_at, closed_at) VALUES (?, ?, ?, NULL)",
            params![round.id, round.status.as_str(), format_timestamp(&round.created_at)],
        )?;
        tx.commit()?;

        Ok(OpenRoundOutcome::Opened(round))
    }

    fn close_round(&self) -> Result<CloseRoundOutcome, LotteryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(open) = Self::find_open_round(&tx)? else {
            return Ok(CloseRoundOutcome::NothingOpen);
        };

        let closed_at = now();
        tx.execute(
            "UPDATE rounds SET status = 'closed', closed_at = ? WHERE id = ?",
            params![format_timestamp(&closed_at), open.id],
        )?;
        tx.commit()?;

        Ok(CloseRoundOutcome::Closed(Round {
            status: RoundStatus::Closed,
            closed_at: Some(closed_at),
            ..open
        }))
    }

    fn current_open_round(&self) -> Result<Option<Round>, LotteryError> {
        let conn = self.conn()?;
        Ok(Self::find_open_round(&conn)?)
    }

    fn latest_round(&self) -> Result<Option<RoundSummary>, LotteryError> {
        let conn = self.conn()?;

        let round = conn
            .query_row(
                &format!(
                    "SELECT {ROUND_COLUMNS} FROM rounds ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                [],
                Self::row_to_round,
            )
            .optional()?;

        let Some(round) = round else {
            return Ok(None);
        };

        let ticket_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE round_id = ?",
            params![round.id],
            |row| row.get(0),
        )?;
        let draw = Self::find_draw(&conn, &round.id)?;

        Ok(Some(RoundSummary {
            round,
            ticket_count,
            draw,
        }))
    }

    fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, LotteryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let round = Self::find_open_round(&tx)?.ok_or(LotteryError::NoActiveRound)?;

        let stored = Ticket {
            id: uuid::Uuid::new_v4().to_string(),
            round_id: round.id,
            id_number: ticket.id_number,
            numbers: ticket.numbers,
            user_sub: ticket.user_sub,
            created_at: now(),
        };

        let numbers_json = serde_json::to_string(&stored.numbers)
            .map_err(|e| LotteryError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO tickets (id, round_id, id_number, numbers, user_sub, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                stored.id,
                stored.round_id,
                stored.id_number,
                numbers_json,
                stored.user_sub,
                format_timestamp(&stored.created_at),
            ],
        )?;
        tx.commit()?;

        Ok(stored)
    }

    fn get_ticket(&self, id: &str) -> Result<Option<TicketDetail>, LotteryError> {
        let conn = self.conn()?;
        let detail = conn
            .query_row(
                &format!("{DETAIL_QUERY} WHERE t.id = ?"),
                params![id],
                Self::row_to_detail,
            )
            .optional()?;
        Ok(detail)
    }

    fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketDetail>, LotteryError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "{DETAIL_QUERY} {where_clause} ORDER BY t.created_at DESC, t.rowid DESC LIMIT ? OFFSET ?"
        );

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_detail)?;

        let mut details = Vec::new();
        for row in rows {
            details.push(row?);
        }
        Ok(details)
    }

    fn count_tickets(&self, filter: &TicketFilter) -> Result<i64, LotteryError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM tickets t {where_clause}");
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    fn latest_undrawn_round(&self) -> Result<Option<Round>, LotteryError> {
        let conn = self.conn()?;
        let round = conn
            .query_row(
                "SELECT r.id, r.status, r.created_at, r.closed_at FROM rounds r \
                 LEFT JOIN draws d ON d.round_id = r.id \
                 WHERE r.status = 'closed' AND d.id IS NULL \
                 ORDER BY r.created_at DESC, r.rowid DESC LIMIT 1",
                [],
                Self::row_to_round,
            )
            .optional()?;
        Ok(round)
    }

    fn insert_draw(&self, round_id: &str, numbers: &[i64]) -> Result<Draw, LotteryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let round = Self::find_round(&tx, round_id)?
            .ok_or_else(|| LotteryError::NotFound(format!("round {round_id}")))?;

        if round.is_open() {
            return Err(LotteryError::RoundStillOpen {
                round_id: round.id,
            });
        }

        if Self::find_draw(&tx, round_id)?.is_some() {
            return Err(LotteryError::AlreadyPublished {
                round_id: round.id,
            });
        }

        let draw = Draw {
            id: uuid::Uuid::new_v4().to_string(),
            round_id: round.id,
            numbers: numbers.to_vec(),
            created_at: now(),
        };

        let numbers_json = serde_json::to_string(&draw.numbers)
            .map_err(|e| LotteryError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO draws (id, round_id, numbers, created_at) VALUES (?, ?, ?, ?)",
            params![
                draw.id,
                draw.round_id,
                numbers_json,
                format_timestamp(&draw.created_at)
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                LotteryError::AlreadyPublished {
                    round_id: draw.round_id.clone(),
                }
            } else {
                e.into()
            }
        })?;
        tx.commit()?;

        Ok(draw)
    }

}
