//! Scraper collaborator interface.
//!
//! The refresh cycle does not care where demand data comes from. A scraper
//! produces one complete [`Snapshot`] per call and the coordinator decides how
//! it replaces the stored data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skillgap_db::snapshot::{NewDemand, NewRegion, NewSkill};
use std::collections::HashSet;
use tracing::warn;

pub use skillgap_db::Snapshot;

/// Error type for scraper operations.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("collector responded with status {0}")]
    Status(u16),
    #[error("scraper task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("malformed source data: {0}")]
    Malformed(String),
}

/// Result type for scraper operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Source of complete demand snapshots.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Short name used in logs and metrics labels.
    fn name(&self) -> &str;

    /// Collect a full snapshot of regions, skills and demand counts.
    async fn collect(&self) -> ScrapeResult<Snapshot>;
}

/// Accumulates flat demand observations into a [`Snapshot`].
///
/// Regions are keyed by slug and skills by `(name, category)`; the first
/// occurrence wins and keeps its position.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
    slugs: HashSet<String>,
    skills: HashSet<(String, String)>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation of `count` postings for a skill in a region.
    pub fn observe(
        &mut self,
        region_name: &str,
        region_slug: &str,
        skill_name: &str,
        category: &str,
        count: u32,
        last_updated: DateTime<Utc>,
    ) -> &mut Self {
        if self.slugs.insert(region_slug.to_string()) {
            self.snapshot.regions.push(NewRegion {
                name: region_name.to_string(),
                slug: region_slug.to_string(),
            });
        } else if let Some(existing) = self.snapshot.regions.iter().find(|r| r.slug == region_slug) {
            if existing.name != region_name {
                warn!(
                    slug = region_slug,
                    kept = %existing.name,
                    ignored = region_name,
                    "Conflicting region names for slug"
                );
            }
        }

        if self.skills.insert((skill_name.to_string(), category.to_string())) {
            self.snapshot.skills.push(NewSkill {
                name: skill_name.to_string(),
                category: category.to_string(),
            });
        }

        self.snapshot.demand.push(NewDemand {
            region_slug: region_slug.to_string(),
            skill_name: skill_name.to_string(),
            category: category.to_string(),
            count,
            last_updated,
        });
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}
