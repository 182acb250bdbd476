use serde::{Deserialize, Serialize};

use crate::db::{Interruption, WorkSession};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrackerStatus {
    /// No active session for the key.
    #[default]
    Idle,
    /// Active session, no open interruption.
    Active,
    /// Active session with an open interruption.
    Paused,
}

impl TrackerStatus {
    pub fn derive(active: Option<&WorkSession>, open_interruption: Option<&Interruption>) -> Self {
        match (active, open_interruption) {
            (None, _) => TrackerStatus::Idle,
            (Some(_), None) => TrackerStatus::Active,
            (Some(_), Some(_)) => TrackerStatus::Paused,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerStatus::Idle => "Idle",
            TrackerStatus::Active => "Active",
            TrackerStatus::Paused => "Paused",
        }
    }
}
