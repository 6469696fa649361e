//! Route handlers.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use skillgap_aggregation::models::{ExportRow, RegionTotal, SkillTrend, SummaryExport, TopSkill};
use skillgap_aggregation::parse_limit;
use skillgap_ingestion::{RefreshError, ScrapeError};
use tracing::{info, warn};

use crate::app::AppState;
use crate::auth::require_bearer;
use crate::error::{ApiError, QueryResultExt};

/// Service metadata.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    let last_refresh = match state.aggregation.last_refresh().await {
        Ok(run) => run,
        Err(e) => {
            warn!("Failed to load last refresh run: {}", e);
            None
        }
    };

    Json(json!({
        "message": "Job Skills API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "mapSummary": "/api/map-summary",
            "trends": "/api/trends/:slug",
            "topSkills": "/api/top-skills?limit=N",
            "exportCsv": "/api/export/csv",
            "exportRaw": "/api/export/raw",
            "exportSummary": "/api/export/summary",
        },
        "lastRefresh": last_refresh,
    }))
}

pub async fn map_summary(State(state): State<AppState>) -> Result<Json<Vec<RegionTotal>>, ApiError> {
    let rows = state
        .aggregation
        .map_summary()
        .await
        .or_fail("Failed to fetch map summary")?;
    Ok(Json(rows))
}

pub async fn trends(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<SkillTrend>>, ApiError> {
    let rows = state
        .aggregation
        .trends(&slug)
        .await
        .or_fail("Failed to fetch trends")?;
    Ok(Json(rows))
}

/// Raw query string of `/api/top-skills`; coercion happens in [`parse_limit`].
#[derive(Debug, Deserialize)]
pub struct TopSkillsParams {
    limit: Option<String>,
}

pub async fn top_skills(
    State(state): State<AppState>,
    Query(params): Query<TopSkillsParams>,
) -> Result<Json<Vec<TopSkill>>, ApiError> {
    let limit = parse_limit(params.limit.as_deref());
    let rows = state
        .aggregation
        .top_skills(limit)
        .await
        .or_fail("Failed to fetch top skills")?;
    Ok(Json(rows))
}

pub async fn export_csv(State(state): State<AppState>) -> Result<Json<Vec<ExportRow>>, ApiError> {
    let rows = state
        .aggregation
        .full_export()
        .await
        .or_fail("Failed to generate export")?;
    Ok(Json(rows))
}

pub async fn export_raw(State(state): State<AppState>) -> Result<Json<Vec<ExportRow>>, ApiError> {
    let rows = state
        .aggregation
        .full_export()
        .await
        .or_fail("Failed to generate export data")?;
    Ok(Json(rows))
}

pub async fn export_summary(State(state): State<AppState>) -> Result<Json<SummaryExport>, ApiError> {
    let summary = state
        .aggregation
        .summary_export()
        .await
        .or_fail("Failed to generate summary export")?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub struct ScheduledTaskResponse {
    success: bool,
    message: String,
    timestamp: DateTime<Utc>,
}

/// Refresh trigger for the external scheduler.
///
/// The refresh runs on its own task so a dropped connection cannot abandon
/// it halfway.
pub async fn scheduled_task(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ScheduledTaskResponse>, ApiError> {
    require_bearer(&headers, state.config.cron_secret.as_deref())?;

    let coordinator = state.refresh.clone();
    let outcome = tokio::spawn(async move { coordinator.refresh().await })
        .await
        .map_err(|e| ApiError::Refresh(RefreshError::Scrape(ScrapeError::Task(e))))?
        .map_err(ApiError::Refresh)?;

    info!(
        regions = outcome.counts.regions,
        demand_rows = outcome.counts.demand_rows,
        "Scheduled refresh completed"
    );

    Ok(Json(ScheduledTaskResponse {
        success: true,
        message: "Database refreshed and scrape completed successfully".to_string(),
        timestamp: Utc::now(),
    }))
}
