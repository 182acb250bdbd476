use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;

use super::{Aggregates, SessionStore};
use crate::db::{Interruption, SessionKey, WorkSession};
use crate::error::{accumulate_seconds, validate_seconds, TrackerError, TrackerResult};

#[derive(Default)]
struct MemoryState {
    sessions: Vec<WorkSession>,
    interruptions: Vec<Interruption>,
}

impl MemoryState {
    fn session_mut(&mut self, session_id: &str) -> TrackerResult<&mut WorkSession> {
        self.sessions
            .iter_mut()
            .find(|session| session.id == session_id)
            .ok_or_else(|| TrackerError::session_not_found(session_id))
    }

    fn has_session(&self, session_id: &str) -> bool {
        self.sessions.iter().any(|session| session.id == session_id)
    }

    /// Insertion order doubles as the tie-breaker for equal start times.
    fn latest_open_interruption(&self, session_id: &str) -> Option<usize> {
        self.interruptions
            .iter()
            .enumerate()
            .filter(|(_, i)| i.session_id == session_id && i.is_open())
            .max_by_key(|(index, i)| (i.started_at, *index))
            .map(|(index, _)| index)
    }
}

/// Ephemeral store for guest callers. Clones share the same state; nothing
/// outlives the last clone.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        key: &SessionKey,
        started_at: NaiveDateTime,
    ) -> TrackerResult<String> {
        let mut state = self.inner.lock().await;
        if state.sessions.iter().any(|s| s.active && s.belongs_to(key)) {
            return Err(anyhow!("{key} already has an active session").into());
        }

        let session = WorkSession::begin(key, started_at);
        let id = session.id.clone();
        state.sessions.push(session);
        Ok(id)
    }

    async fn close_active_session(
        &self,
        key: &SessionKey,
        ended_at: NaiveDateTime,
    ) -> TrackerResult<()> {
        let mut state = self.inner.lock().await;
        for session in state
            .sessions
            .iter_mut()
            .filter(|s| s.active && s.belongs_to(key))
        {
            session.active = false;
            session.ended_at = Some(ended_at);
        }
        Ok(())
    }

    async fn add_focus_seconds(&self, session_id: &str, seconds: i64) -> TrackerResult<()> {
        let seconds = validate_seconds("focus_seconds", seconds)?;
        let mut state = self.inner.lock().await;
        let session = state.session_mut(session_id)?;
        session.focus_secs = accumulate_seconds("focus_seconds", session.focus_secs, seconds)?;
        Ok(())
    }

    async fn add_break_seconds(&self, session_id: &str, seconds: i64) -> TrackerResult<()> {
        let seconds = validate_seconds("break_seconds", seconds)?;
        let mut state = self.inner.lock().await;
        let session = state.session_mut(session_id)?;
        session.break_secs = accumulate_seconds("break_seconds", session.break_secs, seconds)?;
        Ok(())
    }

    async fn open_interruption(
        &self,
        session_id: &str,
        started_at: NaiveDateTime,
        reason: Option<String>,
    ) -> TrackerResult<String> {
        let mut state = self.inner.lock().await;
        if !state.has_session(session_id) {
            return Err(TrackerError::session_not_found(session_id));
        }
        if state.latest_open_interruption(session_id).is_some() {
            return Err(anyhow!("session {session_id} already has an open interruption").into());
        }

        let interruption = Interruption::open(session_id, started_at, reason);
        let id = interruption.id.clone();
        state.interruptions.push(interruption);
        Ok(id)
    }

    async fn close_open_interruption(
        &self,
        session_id: &str,
        ended_at: NaiveDateTime,
    ) -> TrackerResult<()> {
        let mut state = self.inner.lock().await;
        if let Some(index) = state.latest_open_interruption(session_id) {
            state.interruptions[index].ended_at = Some(ended_at);
        }
        Ok(())
    }

    async fn get_aggregates(&self, key: &SessionKey) -> TrackerResult<Aggregates> {
        let state = self.inner.lock().await;
        let mut totals = Aggregates::default();

        for session in state.sessions.iter().filter(|s| s.belongs_to(key)) {
            totals.total_focus_seconds =
                totals.total_focus_seconds.saturating_add(session.focus_secs);
            totals.total_break_seconds =
                totals.total_break_seconds.saturating_add(session.break_secs);
            totals.session_count += 1;
            totals.interruption_count += state
                .interruptions
                .iter()
                .filter(|i| i.session_id == session.id)
                .count() as u64;
        }

        Ok(totals)
    }

    async fn get_active_session(&self, key: &SessionKey) -> TrackerResult<Option<WorkSession>> {
        let state = self.inner.lock().await;
        Ok(state
            .sessions
            .iter()
            .rev()
            .find(|s| s.active && s.belongs_to(key))
            .cloned())
    }

    async fn get_open_interruption(&self, session_id: &str) -> TrackerResult<Option<Interruption>> {
        let state = self.inner.lock().await;
        Ok(state
            .latest_open_interruption(session_id)
            .map(|index| state.interruptions[index].clone()))
    }

    async fn list_sessions(&self, key: &SessionKey) -> TrackerResult<Vec<WorkSession>> {
        let state = self.inner.lock().await;
        let mut sessions: Vec<WorkSession> = state
            .sessions
            .iter()
            .filter(|s| s.belongs_to(key))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    async fn list_interruptions(&self, session_id: &str) -> TrackerResult<Vec<Interruption>> {
        let state = self.inner.lock().await;
        let mut interruptions: Vec<Interruption> = state
            .interruptions
            .iter()
            .filter(|i| i.session_id == session_id)
            .cloned()
            .collect();
        interruptions.sort_by_key(|i| i.started_at);
        Ok(interruptions)
    }
}
