use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A paused interval inside a work session. `ended_at` stays `None` while
/// the pause is ongoing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interruption {
    pub id: String,
    pub session_id: String,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub reason: Option<String>,
}

impl Interruption {
    pub fn open(session_id: &str, started_at: NaiveDateTime, reason: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            started_at,
            ended_at: None,
            reason,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}
