//! Aggregation service: the read operations exposed over HTTP.

use chrono::Utc;
use skillgap_db::models::RefreshRun;
use skillgap_db::{StoreError, StoreResult};
use skillgap_telemetry::Metrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, error};

use crate::districts::resolve_slugs;
use crate::models::{ExportRow, RegionTotal, SkillTrend, SummaryExport, TopSkill};
use crate::repository::DemandRepository;

/// Number of skills returned when no usable limit is given.
pub const DEFAULT_TOP_SKILLS_LIMIT: u32 = 10;

/// Format version of the summary export.
pub const SUMMARY_EXPORT_VERSION: &str = "1.0";

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for aggregation queries.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("store query failed: {0}")]
    Store(#[from] StoreError),
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

/// Coerce a raw `limit` query parameter.
///
/// Anything that is not a positive integer falls back to
/// [`DEFAULT_TOP_SKILLS_LIMIT`].
pub fn parse_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_TOP_SKILLS_LIMIT)
}

/// Read operations over the demand data.
#[derive(Clone)]
pub struct AggregationService {
    repo: Arc<dyn DemandRepository>,
    metrics: Metrics,
    query_timeout: Duration,
}

impl AggregationService {
    pub fn new(repo: Arc<dyn DemandRepository>, metrics: Metrics) -> Self {
        Self {
            repo,
            metrics,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Bound every query by `query_timeout`.
    pub fn with_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Total demand per region, including regions without any demand.
    pub async fn map_summary(&self) -> Result<Vec<RegionTotal>, QueryError> {
        self.run("map_summary", self.repo.region_totals()).await
    }

    /// Per-skill demand for a region slug or a district alias.
    pub async fn trends(&self, slug: &str) -> Result<Vec<SkillTrend>, QueryError> {
        let slugs = resolve_slugs(slug);
        debug!(slug, regions = slugs.len(), "Resolved trend slugs");
        self.run("trends", self.repo.skill_trends(&slugs)).await
    }

    /// The `limit` most demanded skills nationally. A zero limit is raised to 1.
    pub async fn top_skills(&self, limit: u32) -> Result<Vec<TopSkill>, QueryError> {
        let limit = limit.max(1);
        self.run("top_skills", self.repo.top_skills(limit)).await
    }

    /// Every demand record, highest count first.
    pub async fn full_export(&self) -> Result<Vec<ExportRow>, QueryError> {
        self.run("full_export", self.repo.demand_export()).await
    }

    /// National totals per skill name with generation metadata.
    pub async fn summary_export(&self) -> Result<SummaryExport, QueryError> {
        let data = self.run("summary_export", self.repo.national_totals()).await?;
        Ok(SummaryExport {
            generated_at: Utc::now(),
            version: SUMMARY_EXPORT_VERSION,
            data,
        })
    }

    pub async fn last_refresh(&self) -> Result<Option<RefreshRun>, QueryError> {
        self.run("last_refresh", self.repo.last_refresh()).await
    }

    async fn run<T, F>(&self, name: &'static str, query: F) -> Result<T, QueryError>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let start = Instant::now();
        let result = match timeout(self.query_timeout, query).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => Err(QueryError::Store(e)),
            Err(_) => Err(QueryError::Timeout(self.query_timeout)),
        };

        match &result {
            Ok(_) => self.metrics.observe_query(name, start.elapsed().as_secs_f64()),
            Err(e) => {
                self.metrics.inc_query_errors(name);
                error!(query = name, error = %e, "Aggregation query failed");
            }
        }

        result
    }
}
