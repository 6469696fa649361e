//! Refresh coordinator: replace the stored snapshot with a fresh scrape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillgap_db::models::RefreshStatus;
use skillgap_db::snapshot::SnapshotCounts;
use skillgap_db::{DbPool, StoreError};
use skillgap_telemetry::{AuditLog, Metrics};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{error, info, warn};

use crate::scraper::{ScrapeError, Scraper, Snapshot};

pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(300);

/// How a refresh swaps old data for new.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshMode {
    /// Scrape first, then delete and insert in one transaction. A failed
    /// scrape keeps the previous snapshot.
    #[default]
    Staged,
    /// Clear the store, then scrape and insert. A failed scrape leaves the
    /// store empty.
    InPlace,
}

impl RefreshMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshMode::Staged => "staged",
            RefreshMode::InPlace => "in-place",
        }
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staged" => Ok(RefreshMode::Staged),
            "in-place" | "in_place" => Ok(RefreshMode::InPlace),
            other => Err(format!("unknown refresh mode {other:?}, expected staged or in-place")),
        }
    }
}

/// Error type for refresh runs.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("a refresh is already in progress")]
    InProgress,
    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeError),
    #[error("scrape timed out after {0:?}")]
    Timeout(Duration),
    #[error("store update failed: {0}")]
    Store(#[from] StoreError),
}

/// Summary of a successful refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: RefreshMode,
    #[serde(flatten)]
    pub counts: SnapshotCounts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditRefresh<'a> {
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    mode: RefreshMode,
    scraper: &'a str,
    success: bool,
    message: String,
    #[serde(flatten)]
    counts: SnapshotCounts,
}

/// What a failed refresh left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreState {
    Kept,
    Emptied,
}

type Attempt = Result<SnapshotCounts, (RefreshError, StoreState)>;

/// Serializes refreshes and applies the configured [`RefreshMode`].
pub struct RefreshCoordinator {
    db: DbPool,
    scraper: Arc<dyn Scraper>,
    metrics: Metrics,
    mode: RefreshMode,
    scrape_timeout: Duration,
    audit: AuditLog,
    running: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(db: DbPool, scraper: Arc<dyn Scraper>, metrics: Metrics) -> Self {
        Self {
            db,
            scraper,
            metrics,
            mode: RefreshMode::default(),
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
            audit: AuditLog::default(),
            running: Mutex::new(()),
        }
    }

    pub fn with_mode(mut self, mode: RefreshMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_scrape_timeout(mut self, scrape_timeout: Duration) -> Self {
        self.scrape_timeout = scrape_timeout;
        self
    }

    /// Append an audit line per refresh to `path`.
    pub fn with_sample_output(mut self, path: Option<String>) -> Self {
        self.audit = AuditLog::new(path);
        self
    }

    pub fn mode(&self) -> RefreshMode {
        self.mode
    }

    /// Replace the stored snapshot with a fresh scrape.
    ///
    /// Only one refresh runs at a time; a concurrent call fails immediately
    /// with [`RefreshError::InProgress`].
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Refresh requested while another refresh is running");
            self.metrics.observe_refresh("rejected", 0.0);
            return Err(RefreshError::InProgress);
        };

        let started_at = Utc::now();
        let clock = Instant::now();
        info!(mode = %self.mode, scraper = self.scraper.name(), "Starting refresh");

        let run_id = match self.db.start_refresh_run(self.mode.as_str()).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to record refresh start: {}", e);
                None
            }
        };

        let attempt = match self.mode {
            RefreshMode::Staged => self.refresh_staged().await,
            RefreshMode::InPlace => self.refresh_in_place().await,
        };

        let finished_at = Utc::now();
        let elapsed = clock.elapsed().as_secs_f64();

        let (status, message, counts) = match &attempt {
            Ok(counts) => {
                self.metrics.observe_refresh("succeeded", elapsed);
                self.metrics
                    .set_snapshot_rows(counts.regions, counts.skills, counts.demand_rows);
                info!(
                    regions = counts.regions,
                    skills = counts.skills,
                    demand_rows = counts.demand_rows,
                    "Refresh completed in {:.2}s",
                    elapsed
                );
                (RefreshStatus::Succeeded, "refresh completed".to_string(), *counts)
            }
            Err((e, state)) => {
                self.metrics.observe_refresh("failed", elapsed);
                let message = match state {
                    StoreState::Kept => format!("{e}; previous snapshot kept"),
                    StoreState::Emptied => {
                        self.metrics.set_snapshot_rows(0, 0, 0);
                        format!("{e}; store left empty")
                    }
                };
                error!("Refresh failed: {}", message);
                (RefreshStatus::Failed, message, SnapshotCounts::default())
            }
        };

        if let Some(id) = run_id {
            if let Err(e) = self.db.finish_refresh_run(id, status, &message, counts).await {
                warn!("Failed to record refresh outcome: {}", e);
            }
        }

        let audit_refresh = AuditRefresh {
            started_at,
            finished_at,
            mode: self.mode,
            scraper: self.scraper.name(),
            success: attempt.is_ok(),
            message,
            counts,
        };
        if let Err(e) = self.audit.append(&audit_refresh) {
            warn!("Failed to write audit record: {}", e);
        }

        attempt
            .map(|counts| RefreshOutcome {
                started_at,
                finished_at,
                mode: self.mode,
                counts,
            })
            .map_err(|(e, _)| e)
    }

    async fn collect(&self) -> Result<Snapshot, RefreshError> {
        match timeout(self.scrape_timeout, self.scraper.collect()).await {
            Ok(snapshot) => Ok(snapshot?),
            Err(_) => Err(RefreshError::Timeout(self.scrape_timeout)),
        }
    }

    async fn refresh_staged(&self) -> Attempt {
        let snapshot = self.collect().await.map_err(|e| (e, StoreState::Kept))?;
        self.db
            .replace_snapshot(&snapshot)
            .await
            .map_err(|e| (RefreshError::from(e), StoreState::Kept))
    }

    async fn refresh_in_place(&self) -> Attempt {
        self.db
            .clear_snapshot()
            .await
            .map_err(|e| (RefreshError::from(e), StoreState::Kept))?;

        let result = match self.collect().await {
            Ok(snapshot) => self.db.insert_snapshot(&snapshot).await.map_err(RefreshError::from),
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            warn!("Refresh failed after the store was cleared; serving an empty store until the next refresh");
            (e, StoreState::Emptied)
        })
    }
}
