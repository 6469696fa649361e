//! Database models and types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One recorded refresh attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: String,
    pub mode: String,
    pub message: Option<String>,
    pub regions: i64,
    pub skills: i64,
    pub demand_rows: i64,
}

/// Lifecycle state of a refresh run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RefreshStatus {
    Running,
    Succeeded,
    Failed,
}

impl RefreshStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshStatus::Running => "running",
            RefreshStatus::Succeeded => "succeeded",
            RefreshStatus::Failed => "failed",
        }
    }
}
