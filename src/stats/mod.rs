mod types;

pub use types::{focus_percentage, ExportReport, SessionExport, Stats};

use chrono::NaiveDateTime;

use crate::{db::SessionKey, error::TrackerResult, store::SharedStore};

/// Read-only projections over a key's sessions.
#[derive(Clone)]
pub struct StatsAggregator {
    store: SharedStore,
}

impl StatsAggregator {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn compute_stats(&self, key: &SessionKey) -> TrackerResult<Stats> {
        let totals = self.store.get_aggregates(key).await?;
        Ok(Stats {
            total_focus_seconds: totals.total_focus_seconds,
            total_break_seconds: totals.total_break_seconds,
            session_count: totals.session_count,
            interruption_count: totals.interruption_count,
            focus_percentage: focus_percentage(
                totals.total_focus_seconds,
                totals.total_break_seconds,
            ),
        })
    }

    pub async fn export(&self, key: &SessionKey, exported_at: NaiveDateTime) -> TrackerResult<ExportReport> {
        let stats = self.compute_stats(key).await?;

        let mut sessions = Vec::new();
        for session in self.store.list_sessions(key).await? {
            let interruptions = self.store.list_interruptions(&session.id).await?;
            sessions.push(SessionExport {
                session,
                interruptions,
            });
        }

        Ok(ExportReport {
            task_id: key.task_id.clone(),
            party_id: key.party_id.clone(),
            exported_at,
            stats,
            sessions,
            note: key.is_guest().then(|| "Guest mode data".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SessionStore};
    use crate::tracker::SessionTracker;
    use chrono::{Duration, NaiveDate};
    use std::sync::Arc;

    fn at(min: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap().and_hms_opt(14, 0, 0).unwrap()
            + Duration::minutes(min)
    }

    #[tokio::test]
    async fn stats_are_stable_without_mutation() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let tracker = SessionTracker::new(store.clone());
        let stats = StatsAggregator::new(store);
        let key = SessionKey::new("5", Some("carol".into())).unwrap();

        tracker.start_at(&key, at(0)).await.unwrap();
        tracker.pause_at(&key, 90, None, at(2)).await.unwrap();

        let first = stats.compute_stats(&key).await.unwrap();
        let second = stats.compute_stats(&key).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.focus_percentage, 100.0);
    }

    #[tokio::test]
    async fn export_nests_interruptions_under_sessions() {
        let store = MemoryStore::new();
        let shared: SharedStore = Arc::new(store.clone());
        let tracker = SessionTracker::new(shared.clone());
        let stats = StatsAggregator::new(shared);
        let key = SessionKey::guest("5").unwrap();

        tracker.start_at(&key, at(0)).await.unwrap();
        tracker.pause_at(&key, 60, Some("door".into()), at(1)).await.unwrap();
        tracker.resume_at(&key, 30, at(2)).await.unwrap();
        tracker.end_at(&key, 60, at(3)).await.unwrap();
        tracker.start_at(&key, at(10)).await.unwrap();

        let report = stats.export(&key, at(20)).await.unwrap();
        assert_eq!(report.sessions.len(), 2);
        assert_eq!(report.sessions[0].interruptions.len(), 1);
        assert_eq!(report.sessions[0].interruptions[0].reason.as_deref(), Some("door"));
        assert!(report.sessions[1].interruptions.is_empty());
        assert_eq!(report.stats.session_count, 2);
        assert_eq!(report.stats.focus_percentage, 80.0);
        assert_eq!(report.note.as_deref(), Some("Guest mode data"));
        assert_eq!(report.exported_at, at(20));

        assert_eq!(store.list_sessions(&key).await.unwrap().len(), 2);
    }
}
