use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_optional_timestamp, format_timestamp, parse_optional_timestamp, parse_timestamp},
    models::Interruption,
};

fn row_to_interruption(row: &Row) -> Result<Interruption> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;

    Ok(Interruption {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        started_at: parse_timestamp(&started_at, "started_at")?,
        ended_at: parse_optional_timestamp(ended_at, "ended_at")?,
        reason: row.get("reason")?,
    })
}

impl Database {
    pub async fn insert_interruption(&self, interruption: &Interruption) -> Result<()> {
        let record = interruption.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO interruptions (id, session_id, started_at, ended_at, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.session_id,
                    format_timestamp(&record.started_at),
                    format_optional_timestamp(record.ended_at.as_ref()),
                    record.reason,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Closes the most recent open interruption of the session, if any.
    pub async fn finalize_open_interruption(
        &self,
        session_id: &str,
        ended_at: NaiveDateTime,
    ) -> Result<usize> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let closed = conn.execute(
                "UPDATE interruptions
                 SET ended_at = ?1
                 WHERE id = (
                     SELECT id FROM interruptions
                     WHERE session_id = ?2 AND ended_at IS NULL
                     ORDER BY started_at DESC, rowid DESC
                     LIMIT 1
                 )",
                params![format_timestamp(&ended_at), session_id],
            )?;
            Ok(closed)
        })
        .await
    }

    pub async fn find_open_interruption(&self, session_id: &str) -> Result<Option<Interruption>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, started_at, ended_at, reason
                 FROM interruptions
                 WHERE session_id = ?1 AND ended_at IS NULL
                 ORDER BY started_at DESC, rowid DESC
                 LIMIT 1",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let interruption = match rows.next()? {
                Some(row) => Some(row_to_interruption(row)?),
                None => None,
            };
            Ok(interruption)
        })
        .await
    }

    pub async fn get_interruptions_for_session(&self, session_id: &str) -> Result<Vec<Interruption>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, started_at, ended_at, reason
                 FROM interruptions
                 WHERE session_id = ?1
                 ORDER BY started_at ASC, rowid ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut interruptions = Vec::new();
            while let Some(row) = rows.next()? {
                interruptions.push(row_to_interruption(row)?);
            }

            Ok(interruptions)
        })
        .await
    }
}
