use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{Aggregates, SessionStore};
use crate::db::{Counter, Database, Interruption, SecondsUpdate, SessionKey, WorkSession};
use crate::error::{counter_overflow, validate_seconds, TrackerError, TrackerResult};

impl Database {
    async fn add_seconds(
        &self,
        session_id: &str,
        counter: Counter,
        field: &'static str,
        seconds: i64,
    ) -> TrackerResult<()> {
        let seconds = validate_seconds(field, seconds)?;
        match self.add_work_session_seconds(session_id, counter, seconds).await? {
            SecondsUpdate::Applied => Ok(()),
            SecondsUpdate::WouldOverflow => Err(counter_overflow(field, seconds)),
            SecondsUpdate::SessionMissing => Err(TrackerError::session_not_found(session_id)),
        }
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn create_session(
        &self,
        key: &SessionKey,
        started_at: NaiveDateTime,
    ) -> TrackerResult<String> {
        let session = WorkSession::begin(key, started_at);
        self.insert_work_session(&session).await?;
        Ok(session.id)
    }

    async fn close_active_session(
        &self,
        key: &SessionKey,
        ended_at: NaiveDateTime,
    ) -> TrackerResult<()> {
        self.close_active_work_sessions(key, ended_at).await?;
        Ok(())
    }

    async fn add_focus_seconds(&self, session_id: &str, seconds: i64) -> TrackerResult<()> {
        self.add_seconds(session_id, Counter::Focus, "focus_seconds", seconds)
            .await
    }

    async fn add_break_seconds(&self, session_id: &str, seconds: i64) -> TrackerResult<()> {
        self.add_seconds(session_id, Counter::Break, "break_seconds", seconds)
            .await
    }

    async fn open_interruption(
        &self,
        session_id: &str,
        started_at: NaiveDateTime,
        reason: Option<String>,
    ) -> TrackerResult<String> {
        if !self.work_session_exists(session_id).await? {
            return Err(TrackerError::session_not_found(session_id));
        }

        let interruption = Interruption::open(session_id, started_at, reason);
        self.insert_interruption(&interruption).await?;
        Ok(interruption.id)
    }

    async fn close_open_interruption(
        &self,
        session_id: &str,
        ended_at: NaiveDateTime,
    ) -> TrackerResult<()> {
        self.finalize_open_interruption(session_id, ended_at).await?;
        Ok(())
    }

    async fn get_aggregates(&self, key: &SessionKey) -> TrackerResult<Aggregates> {
        let totals = self.work_session_totals(key).await?;
        Ok(Aggregates {
            total_focus_seconds: totals.focus_secs,
            total_break_seconds: totals.break_secs,
            session_count: totals.session_count,
            interruption_count: totals.interruption_count,
        })
    }

    async fn get_active_session(&self, key: &SessionKey) -> TrackerResult<Option<WorkSession>> {
        Ok(self.get_active_work_session(key).await?)
    }

    async fn get_open_interruption(&self, session_id: &str) -> TrackerResult<Option<Interruption>> {
        Ok(self.find_open_interruption(session_id).await?)
    }

    async fn list_sessions(&self, key: &SessionKey) -> TrackerResult<Vec<WorkSession>> {
        Ok(self.list_work_sessions(key).await?)
    }

    async fn list_interruptions(&self, session_id: &str) -> TrackerResult<Vec<Interruption>> {
        Ok(self.get_interruptions_for_session(session_id).await?)
    }
}
