//! Work-session records and the (task, party) key that owns them.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TrackerError, TrackerResult};

/// Identifies whose session is being tracked against which task.
///
/// `party_id: None` is the anonymous caller whose data lives only as long
/// as the ephemeral store holding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub task_id: String,
    pub party_id: Option<String>,
}

impl SessionKey {
    pub fn new(task_id: impl Into<String>, party_id: Option<String>) -> TrackerResult<Self> {
        let task_id = task_id.into().trim().to_string();
        if task_id.is_empty() {
            return Err(TrackerError::invalid("task_id", "task id is required"));
        }

        let party_id = match party_id {
            Some(party) => {
                let party = party.trim().to_string();
                if party.is_empty() {
                    return Err(TrackerError::invalid(
                        "party_id",
                        "party id must not be blank; omit it for guest mode",
                    ));
                }
                Some(party)
            }
            None => None,
        };

        Ok(Self { task_id, party_id })
    }

    pub fn guest(task_id: impl Into<String>) -> TrackerResult<Self> {
        Self::new(task_id, None)
    }

    pub fn is_guest(&self) -> bool {
        self.party_id.is_none()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.party_id {
            Some(party) => write!(f, "task {} / party {}", self.task_id, party),
            None => write!(f, "task {} / guest", self.task_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSession {
    pub id: String,
    pub task_id: String,
    pub party_id: Option<String>,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub focus_secs: u64,
    pub break_secs: u64,
    pub active: bool,
}

impl WorkSession {
    /// A fresh active session with zeroed counters.
    pub fn begin(key: &SessionKey, started_at: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: key.task_id.clone(),
            party_id: key.party_id.clone(),
            started_at,
            ended_at: None,
            focus_secs: 0,
            break_secs: 0,
            active: true,
        }
    }

    pub fn belongs_to(&self, key: &SessionKey) -> bool {
        self.task_id == key.task_id && self.party_id == key.party_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_trims_and_requires_task_id() {
        let key = SessionKey::new("  42 ", Some(" alice ".into())).unwrap();
        assert_eq!(key.task_id, "42");
        assert_eq!(key.party_id.as_deref(), Some("alice"));

        let err = SessionKey::new("   ", None).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn blank_party_is_rejected_but_absent_party_is_guest() {
        assert!(SessionKey::new("1", Some("".into()))
            .unwrap_err()
            .is_invalid_input());
        assert!(SessionKey::guest("1").unwrap().is_guest());
    }

    #[test]
    fn begin_starts_active_with_zeroed_counters() {
        let key = SessionKey::new("1", Some("a".into())).unwrap();
        let t0 = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let session = WorkSession::begin(&key, t0);

        assert!(session.active);
        assert!(session.belongs_to(&key));
        assert_eq!(session.ended_at, None);
        assert_eq!((session.focus_secs, session.break_secs), (0, 0));
    }
}
