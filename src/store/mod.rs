//! The session store contract and its two backends.
//!
//! [`Database`](crate::db::Database) keeps sessions in SQLite for signed-in
//! parties; [`MemoryStore`] keeps them in process memory for guests. Both
//! honour the same contract, so the tracker never knows which it talks to.

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::{Interruption, SessionKey, WorkSession};
use crate::error::TrackerResult;

pub use memory::MemoryStore;

/// Sums across every session of a key, open and closed alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    pub total_focus_seconds: u64,
    pub total_break_seconds: u64,
    pub session_count: u64,
    pub interruption_count: u64,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a new active session with zeroed counters.
    async fn create_session(&self, key: &SessionKey, started_at: NaiveDateTime)
        -> TrackerResult<String>;

    /// Clears the active flag of the key's active session. No-op when none is active.
    async fn close_active_session(&self, key: &SessionKey, ended_at: NaiveDateTime)
        -> TrackerResult<()>;

    async fn add_focus_seconds(&self, session_id: &str, seconds: i64) -> TrackerResult<()>;

    async fn add_break_seconds(&self, session_id: &str, seconds: i64) -> TrackerResult<()>;

    /// Fails when the session already has an open interruption.
    async fn open_interruption(
        &self,
        session_id: &str,
        started_at: NaiveDateTime,
        reason: Option<String>,
    ) -> TrackerResult<String>;

    /// Closes the most recent open interruption. No-op when none is open.
    async fn close_open_interruption(&self, session_id: &str, ended_at: NaiveDateTime)
        -> TrackerResult<()>;

    async fn get_aggregates(&self, key: &SessionKey) -> TrackerResult<Aggregates>;

    async fn get_active_session(&self, key: &SessionKey) -> TrackerResult<Option<WorkSession>>;

    async fn get_open_interruption(&self, session_id: &str) -> TrackerResult<Option<Interruption>>;

    /// Oldest first.
    async fn list_sessions(&self, key: &SessionKey) -> TrackerResult<Vec<WorkSession>>;

    /// Oldest first.
    async fn list_interruptions(&self, session_id: &str) -> TrackerResult<Vec<Interruption>>;
}

pub type SharedStore = Arc<dyn SessionStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{Duration, NaiveDate};
    use tempfile::TempDir;

    fn at(minute: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + Duration::minutes(minute)
    }

    fn key(party: Option<&str>) -> SessionKey {
        SessionKey::new("1", party.map(str::to_string)).unwrap()
    }

    fn sqlite_store() -> (SharedStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("contract.sqlite3")).unwrap();
        (Arc::new(db), dir)
    }

    fn backends() -> Vec<(&'static str, SharedStore, Option<TempDir>)> {
        let (sqlite, dir) = sqlite_store();
        vec![
            ("sqlite", sqlite, Some(dir)),
            ("memory", Arc::new(MemoryStore::new()), None),
        ]
    }

    #[tokio::test]
    async fn create_and_close_respect_the_key() {
        for (name, store, _dir) in backends() {
            let alice = key(Some("alice"));
            let guest = key(None);

            let id = store.create_session(&alice, at(0)).await.unwrap();
            store.create_session(&guest, at(1)).await.unwrap();

            let active = store.get_active_session(&alice).await.unwrap().unwrap();
            assert_eq!(active.id, id, "{name}");
            assert!(active.belongs_to(&alice), "{name}");

            store.close_active_session(&alice, at(5)).await.unwrap();
            assert!(store.get_active_session(&alice).await.unwrap().is_none(), "{name}");
            assert!(store.get_active_session(&guest).await.unwrap().is_some(), "{name}");

            let sessions = store.list_sessions(&alice).await.unwrap();
            assert_eq!(sessions.len(), 1, "{name}");
            assert_eq!(sessions[0].ended_at, Some(at(5)), "{name}");
            assert!(!sessions[0].active, "{name}");
        }
    }

    #[tokio::test]
    async fn closing_without_active_session_is_a_no_op() {
        for (name, store, _dir) in backends() {
            store.close_active_session(&key(Some("bob")), at(0)).await.unwrap();
            assert!(store.list_sessions(&key(Some("bob"))).await.unwrap().is_empty(), "{name}");
        }
    }

    #[tokio::test]
    async fn counters_accumulate_and_reject_negative_input() {
        for (name, store, _dir) in backends() {
            let k = key(Some("alice"));
            let id = store.create_session(&k, at(0)).await.unwrap();

            store.add_focus_seconds(&id, 300).await.unwrap();
            store.add_focus_seconds(&id, 120).await.unwrap();
            store.add_break_seconds(&id, 60).await.unwrap();

            let err = store.add_break_seconds(&id, -1).await.unwrap_err();
            assert!(err.is_invalid_input(), "{name}");

            let session = store.get_active_session(&k).await.unwrap().unwrap();
            assert_eq!((session.focus_secs, session.break_secs), (420, 60), "{name}");
        }
    }

    #[tokio::test]
    async fn counters_refuse_to_overflow() {
        for (name, store, _dir) in backends() {
            let k = key(Some("alice"));
            let id = store.create_session(&k, at(0)).await.unwrap();

            store.add_focus_seconds(&id, i64::MAX).await.unwrap();
            let err = store.add_focus_seconds(&id, 1).await.unwrap_err();
            assert!(
                matches!(err, crate::TrackerError::InvalidInput { field: "focus_seconds", .. }),
                "{name}: {err}"
            );
            store.add_break_seconds(&id, i64::MAX - 10).await.unwrap();
            assert!(store.add_break_seconds(&id, 11).await.unwrap_err().is_invalid_input(), "{name}");
            store.add_break_seconds(&id, 10).await.unwrap();

            // The rejected additions left the row readable and unchanged.
            let session = store.get_active_session(&k).await.unwrap().unwrap();
            assert_eq!(session.focus_secs, i64::MAX as u64, "{name}");
            assert_eq!(session.break_secs, i64::MAX as u64, "{name}");
        }
    }

    #[tokio::test]
    async fn aggregates_saturate_across_large_sessions() {
        for (name, store, _dir) in backends() {
            let k = key(Some("alice"));
            for minute in [0, 10] {
                let id = store.create_session(&k, at(minute)).await.unwrap();
                store.add_focus_seconds(&id, i64::MAX).await.unwrap();
                store.close_active_session(&k, at(minute + 5)).await.unwrap();
            }
            let id = store.create_session(&k, at(20)).await.unwrap();
            store.add_focus_seconds(&id, 1).await.unwrap();

            let totals = store.get_aggregates(&k).await.unwrap();
            assert_eq!(totals.total_focus_seconds, u64::MAX, "{name}");
            assert_eq!(totals.session_count, 3, "{name}");
        }
    }

    #[tokio::test]
    async fn unknown_session_is_a_soft_not_found() {
        for (name, store, _dir) in backends() {
            let err = store.add_focus_seconds("missing", 5).await.unwrap_err();
            assert!(matches!(err, crate::TrackerError::NotFound { .. }), "{name}");

            let err = store.open_interruption("missing", at(0), None).await.unwrap_err();
            assert!(matches!(err, crate::TrackerError::NotFound { .. }), "{name}");
        }
    }

    #[tokio::test]
    async fn interruptions_open_close_and_never_nest() {
        for (name, store, _dir) in backends() {
            let k = key(Some("alice"));
            let id = store.create_session(&k, at(0)).await.unwrap();

            let first = store
                .open_interruption(&id, at(5), Some("phone".into()))
                .await
                .unwrap();
            assert!(store.open_interruption(&id, at(6), None).await.is_err(), "{name}");

            let open = store.get_open_interruption(&id).await.unwrap().unwrap();
            assert_eq!(open.id, first, "{name}");
            assert_eq!(open.reason.as_deref(), Some("phone"), "{name}");

            store.close_open_interruption(&id, at(7)).await.unwrap();
            assert!(store.get_open_interruption(&id).await.unwrap().is_none(), "{name}");
            // Closing again has nothing to close.
            store.close_open_interruption(&id, at(8)).await.unwrap();

            store.open_interruption(&id, at(9), None).await.unwrap();

            let all = store.list_interruptions(&id).await.unwrap();
            assert_eq!(all.len(), 2, "{name}");
            assert_eq!(all[0].ended_at, Some(at(7)), "{name}");
            assert!(all[1].is_open(), "{name}");
        }
    }

    #[tokio::test]
    async fn aggregates_cover_open_and_closed_sessions() {
        for (name, store, _dir) in backends() {
            let k = key(Some("alice"));
            assert_eq!(store.get_aggregates(&k).await.unwrap(), Aggregates::default(), "{name}");

            let first = store.create_session(&k, at(0)).await.unwrap();
            store.add_focus_seconds(&first, 100).await.unwrap();
            store.open_interruption(&first, at(2), None).await.unwrap();
            store.close_open_interruption(&first, at(3)).await.unwrap();
            store.add_break_seconds(&first, 60).await.unwrap();
            store.close_active_session(&k, at(10)).await.unwrap();

            let second = store.create_session(&k, at(20)).await.unwrap();
            store.add_focus_seconds(&second, 50).await.unwrap();
            store.open_interruption(&second, at(21), None).await.unwrap();

            // A different party's data never leaks into the totals.
            let other = store.create_session(&key(Some("bob")), at(0)).await.unwrap();
            store.add_focus_seconds(&other, 9_999).await.unwrap();

            let totals = store.get_aggregates(&k).await.unwrap();
            assert_eq!(
                totals,
                Aggregates {
                    total_focus_seconds: 150,
                    total_break_seconds: 60,
                    session_count: 2,
                    interruption_count: 2,
                },
                "{name}"
            );
        }
    }
}
