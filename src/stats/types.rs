use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::{Interruption, WorkSession};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_focus_seconds: u64,
    pub total_break_seconds: u64,
    pub session_count: u64,
    pub interruption_count: u64,
    pub focus_percentage: f64,
}

/// Share of tracked time spent focused, rounded to one decimal place. An
/// untouched task reports 100%.
pub fn focus_percentage(focus_secs: u64, break_secs: u64) -> f64 {
    let total = focus_secs.saturating_add(break_secs);
    if total == 0 {
        return 100.0;
    }
    let ratio = 100.0 * focus_secs as f64 / total as f64;
    (ratio * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub session: WorkSession,
    pub interruptions: Vec<Interruption>,
}

/// Everything tracked for one key, for download or archiving.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub task_id: String,
    pub party_id: Option<String>,
    pub exported_at: NaiveDateTime,
    pub stats: Stats,
    pub sessions: Vec<SessionExport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
