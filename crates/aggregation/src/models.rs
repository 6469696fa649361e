//! Typed result rows of the aggregate queries.
//!
//! Field names serialize in camelCase to match the HTTP responses.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Total demand of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RegionTotal {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub total_demand: i64,
}

/// Demand for one skill summed over a set of regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SkillTrend {
    pub skill_name: String,
    pub category: String,
    pub count: i64,
    pub last_updated: DateTime<Utc>,
}

/// National demand for one skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopSkill {
    pub skill_name: String,
    pub category: String,
    pub total_count: i64,
}

/// One demand record joined with its region and skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub region: String,
    pub skill: String,
    pub category: String,
    pub demand_count: i64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SkillTotal {
    pub skill: String,
    pub total_demand: i64,
}

/// National totals wrapped with generation metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryExport {
    pub generated_at: DateTime<Utc>,
    pub version: &'static str,
    pub data: Vec<SkillTotal>,
}
