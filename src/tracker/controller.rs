use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::TrackerStatus;
use crate::{
    db::SessionKey,
    error::{validate_seconds, TrackerResult},
    store::SharedStore,
    utils::{Clock, SystemClock},
};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartReceipt {
    pub session_id: String,
    pub start_time: NaiveDateTime,
    /// The still-open session that this start force-closed, if any.
    pub superseded_session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TransitionOutcome {
    Applied,
    /// Accepted outside its usual source state; only the additive update ran.
    Tolerated { from: TrackerStatus },
    /// Nothing active for the key. Nothing was written.
    NoActiveSession,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReceipt {
    pub session_id: Option<String>,
    pub at: NaiveDateTime,
    pub outcome: TransitionOutcome,
}

impl TransitionReceipt {
    fn skipped(at: NaiveDateTime) -> Self {
        Self {
            session_id: None,
            at,
            outcome: TransitionOutcome::NoActiveSession,
        }
    }
}

type KeyLocks = Arc<StdMutex<HashMap<SessionKey, Arc<Mutex<()>>>>>;

/// Exclusive hold on one key. Dropping the last holder removes the key's
/// entry so the lock table only covers keys with a transition in flight.
struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: SessionKey,
    locks: KeyLocks,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Waiters clone the Arc under this same lock, so a count of one
        // means nobody else can reach the entry.
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// Start/pause/resume/end state machine over a [`SessionStore`](crate::store::SessionStore).
///
/// State lives entirely in the store; the tracker only serializes callers
/// per key so each transition's read-modify-write runs alone.
#[derive(Clone)]
pub struct SessionTracker {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    key_locks: KeyLocks,
}

impl SessionTracker {
    pub fn new(store: SharedStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: SharedStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            key_locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    async fn lock_key(&self, key: &SessionKey) -> KeyGuard {
        let key_lock = {
            let mut locks = match self.key_locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks.entry(key.clone()).or_default().clone()
        };
        KeyGuard {
            guard: Some(key_lock.lock_owned().await),
            key: key.clone(),
            locks: self.key_locks.clone(),
        }
    }

    #[cfg(test)]
    fn locked_key_count(&self) -> usize {
        match self.key_locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub async fn start(&self, key: &SessionKey) -> TrackerResult<StartReceipt> {
        self.start_at(key, self.now()).await
    }

    pub async fn pause(
        &self,
        key: &SessionKey,
        focus_seconds: i64,
        reason: Option<String>,
    ) -> TrackerResult<TransitionReceipt> {
        self.pause_at(key, focus_seconds, reason, self.now()).await
    }

    pub async fn resume(&self, key: &SessionKey, break_seconds: i64) -> TrackerResult<TransitionReceipt> {
        self.resume_at(key, break_seconds, self.now()).await
    }

    pub async fn end(&self, key: &SessionKey, focus_seconds: i64) -> TrackerResult<TransitionReceipt> {
        self.end_at(key, focus_seconds, self.now()).await
    }

    /// Opens a new active session. A session still active or paused for the
    /// key is closed at `now` first, along with its open interruption.
    pub async fn start_at(&self, key: &SessionKey, now: NaiveDateTime) -> TrackerResult<StartReceipt> {
        let _guard = self.lock_key(key).await;

        let superseded_session_id = match self.store.get_active_session(key).await? {
            Some(previous) => {
                warn!("Superseding open session {} for {key}", previous.id);
                self.store.close_open_interruption(&previous.id, now).await?;
                self.store.close_active_session(key, now).await?;
                Some(previous.id)
            }
            None => None,
        };

        let session_id = self.store.create_session(key, now).await?;
        info!("Started work session {session_id} for {key}");

        Ok(StartReceipt {
            session_id,
            start_time: now,
            superseded_session_id,
        })
    }

    /// Banks `focus_seconds` and opens an interruption. While already paused
    /// only the focus time is banked.
    pub async fn pause_at(
        &self,
        key: &SessionKey,
        focus_seconds: i64,
        reason: Option<String>,
        now: NaiveDateTime,
    ) -> TrackerResult<TransitionReceipt> {
        validate_seconds("focus_seconds", focus_seconds)?;
        let _guard = self.lock_key(key).await;

        let Some(session) = self.store.get_active_session(key).await? else {
            warn!("Pause ignored: no active session for {key}");
            return Ok(TransitionReceipt::skipped(now));
        };

        let already_paused = self.store.get_open_interruption(&session.id).await?.is_some();
        self.store.add_focus_seconds(&session.id, focus_seconds).await?;

        let outcome = if already_paused {
            debug!(
                "Session {} is {}; banked focus time only",
                session.id,
                TrackerStatus::Paused.as_str()
            );
            TransitionOutcome::Tolerated {
                from: TrackerStatus::Paused,
            }
        } else {
            self.store.open_interruption(&session.id, now, reason).await?;
            TransitionOutcome::Applied
        };

        Ok(TransitionReceipt {
            session_id: Some(session.id),
            at: now,
            outcome,
        })
    }

    /// Banks `break_seconds` and closes the open interruption.
    pub async fn resume_at(
        &self,
        key: &SessionKey,
        break_seconds: i64,
        now: NaiveDateTime,
    ) -> TrackerResult<TransitionReceipt> {
        validate_seconds("break_seconds", break_seconds)?;
        let _guard = self.lock_key(key).await;

        let Some(session) = self.store.get_active_session(key).await? else {
            warn!("Resume ignored: no active session for {key}");
            return Ok(TransitionReceipt::skipped(now));
        };

        let paused = self.store.get_open_interruption(&session.id).await?.is_some();
        self.store.add_break_seconds(&session.id, break_seconds).await?;

        let outcome = if paused {
            self.store.close_open_interruption(&session.id, now).await?;
            TransitionOutcome::Applied
        } else {
            debug!(
                "Session {} is {}; banked break time only",
                session.id,
                TrackerStatus::Active.as_str()
            );
            TransitionOutcome::Tolerated {
                from: TrackerStatus::Active,
            }
        };

        Ok(TransitionReceipt {
            session_id: Some(session.id),
            at: now,
            outcome,
        })
    }

    /// Banks the final `focus_seconds` and closes the session. An open
    /// interruption is left with no end time.
    pub async fn end_at(
        &self,
        key: &SessionKey,
        focus_seconds: i64,
        now: NaiveDateTime,
    ) -> TrackerResult<TransitionReceipt> {
        validate_seconds("focus_seconds", focus_seconds)?;
        let _guard = self.lock_key(key).await;

        let Some(session) = self.store.get_active_session(key).await? else {
            warn!("End ignored: no active session for {key}");
            return Ok(TransitionReceipt::skipped(now));
        };

        self.store.add_focus_seconds(&session.id, focus_seconds).await?;
        self.store.close_active_session(key, now).await?;

        if let Some(open) = self.store.get_open_interruption(&session.id).await? {
            debug!("Session {} ended with interruption {} still open", session.id, open.id);
        }
        info!("Ended work session {} for {key}", session.id);

        Ok(TransitionReceipt {
            session_id: Some(session.id),
            at: now,
            outcome: TransitionOutcome::Applied,
        })
    }

    pub async fn status(&self, key: &SessionKey) -> TrackerResult<TrackerStatus> {
        let active = self.store.get_active_session(key).await?;
        let open = match &active {
            Some(session) => self.store.get_open_interruption(&session.id).await?,
            None => None,
        };
        Ok(TrackerStatus::derive(active.as_ref(), open.as_ref()))
    }
}
