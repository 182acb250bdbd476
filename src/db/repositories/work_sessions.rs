use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_optional_timestamp, format_timestamp, parse_optional_timestamp, parse_timestamp,
        to_i64, to_u64,
    },
    models::{SessionKey, WorkSession},
};

const SESSION_COLUMNS: &str =
    "id, task_id, party_id, started_at, ended_at, focus_secs, break_secs, active";

/// Which accumulated counter an additive update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Focus,
    Break,
}

impl Counter {
    fn column(self) -> &'static str {
        match self {
            Counter::Focus => "focus_secs",
            Counter::Break => "break_secs",
        }
    }
}

fn row_to_session(row: &Row) -> Result<WorkSession> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let focus_secs: i64 = row.get("focus_secs")?;
    let break_secs: i64 = row.get("break_secs")?;
    let active: i64 = row.get("active")?;

    Ok(WorkSession {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        party_id: row.get("party_id")?,
        started_at: parse_timestamp(&started_at, "started_at")?,
        ended_at: parse_optional_timestamp(ended_at, "ended_at")?,
        focus_secs: to_u64(focus_secs, "focus_secs")?,
        break_secs: to_u64(break_secs, "break_secs")?,
        active: active != 0,
    })
}

/// Result of an additive counter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondsUpdate {
    Applied,
    /// The session exists but the addition would pass `i64::MAX`.
    WouldOverflow,
    SessionMissing,
}

/// Totals across every session (open and closed) for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyTotals {
    pub focus_secs: u64,
    pub break_secs: u64,
    pub session_count: u64,
    pub interruption_count: u64,
}

impl Database {
    pub async fn insert_work_session(&self, session: &WorkSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO work_sessions (id, task_id, party_id, started_at, ended_at, focus_secs, break_secs, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.task_id,
                    record.party_id,
                    format_timestamp(&record.started_at),
                    format_optional_timestamp(record.ended_at.as_ref()),
                    to_i64(record.focus_secs)?,
                    to_i64(record.break_secs)?,
                    record.active,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Clears the active flag on every active session for the key. Returns
    /// the number of rows closed (0 or 1 while the schema index holds).
    pub async fn close_active_work_sessions(
        &self,
        key: &SessionKey,
        ended_at: NaiveDateTime,
    ) -> Result<usize> {
        let key = key.clone();
        self.execute(move |conn| {
            let closed = conn.execute(
                "UPDATE work_sessions
                 SET active = 0,
                     ended_at = ?1
                 WHERE task_id = ?2 AND party_id IS ?3 AND active = 1",
                params![format_timestamp(&ended_at), key.task_id, key.party_id],
            )?;
            Ok(closed)
        })
        .await
    }

    /// Single-statement additive update, guarded so the column never leaves
    /// the INTEGER range.
    pub async fn add_work_session_seconds(
        &self,
        session_id: &str,
        counter: Counter,
        seconds: u64,
    ) -> Result<SecondsUpdate> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let column = counter.column();
            let amount = to_i64(seconds)?;
            let rows_affected = conn.execute(
                &format!(
                    "UPDATE work_sessions
                     SET {column} = {column} + ?1
                     WHERE id = ?2 AND {column} <= ?3"
                ),
                params![amount, session_id, i64::MAX - amount],
            )?;
            if rows_affected > 0 {
                return Ok(SecondsUpdate::Applied);
            }

            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM work_sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            Ok(if exists > 0 {
                SecondsUpdate::WouldOverflow
            } else {
                SecondsUpdate::SessionMissing
            })
        })
        .await
    }

    pub async fn get_active_work_session(&self, key: &SessionKey) -> Result<Option<WorkSession>> {
        let key = key.clone();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS}
                 FROM work_sessions
                 WHERE task_id = ?1 AND party_id IS ?2 AND active = 1
                 ORDER BY started_at DESC, rowid DESC
                 LIMIT 1"
            ))?;

            let mut rows = stmt.query(params![key.task_id, key.party_id])?;
            let session = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(session)
        })
        .await
    }

    pub async fn work_session_exists(&self, session_id: &str) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM work_sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    pub async fn list_work_sessions(&self, key: &SessionKey) -> Result<Vec<WorkSession>> {
        let key = key.clone();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS}
                 FROM work_sessions
                 WHERE task_id = ?1 AND party_id IS ?2
                 ORDER BY started_at ASC, rowid ASC"
            ))?;

            let mut rows = stmt.query(params![key.task_id, key.party_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    pub async fn work_session_totals(&self, key: &SessionKey) -> Result<KeyTotals> {
        let key = key.clone();
        self.execute(move |conn| {
            // SUM() errors past i64::MAX; these totals saturate instead.
            let mut totals = KeyTotals::default();
            let mut stmt = conn.prepare(
                "SELECT focus_secs, break_secs
                 FROM work_sessions
                 WHERE task_id = ?1 AND party_id IS ?2",
            )?;
            let mut rows = stmt.query(params![key.task_id, key.party_id])?;
            while let Some(row) = rows.next()? {
                let focus_secs = to_u64(row.get("focus_secs")?, "focus_secs")?;
                let break_secs = to_u64(row.get("break_secs")?, "break_secs")?;
                totals.focus_secs = totals.focus_secs.saturating_add(focus_secs);
                totals.break_secs = totals.break_secs.saturating_add(break_secs);
                totals.session_count += 1;
            }

            let interruption_count: i64 = conn.query_row(
                "SELECT COUNT(*)
                 FROM interruptions i
                 JOIN work_sessions s ON s.id = i.session_id
                 WHERE s.task_id = ?1 AND s.party_id IS ?2",
                params![key.task_id, key.party_id],
                |row| row.get(0),
            )?;

            totals.interruption_count = to_u64(interruption_count, "interruption_count")?;
            Ok(totals)
        })
        .await
    }
}
