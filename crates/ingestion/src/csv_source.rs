//! CSV file scraper.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::scraper::{ScrapeError, ScrapeResult, Scraper, Snapshot, SnapshotBuilder};

/// One line of the demand CSV.
///
/// Header: `region,slug,skill,category,count[,last_updated]`.
#[derive(Debug, Deserialize)]
struct DemandRecord {
    region: String,
    slug: String,
    skill: String,
    category: String,
    count: u32,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

/// Reads a snapshot from a CSV export produced by the collector.
pub struct CsvScraper {
    path: PathBuf,
}

impl CsvScraper {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn read_snapshot(path: &Path) -> ScrapeResult<Snapshot> {
    let collected_at = Utc::now();
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;

    let mut builder = SnapshotBuilder::new();
    let mut rows = 0usize;
    for result in reader.deserialize() {
        let record: DemandRecord = result?;
        if record.slug.is_empty() || record.skill.is_empty() {
            // header is line 1
            return Err(ScrapeError::Malformed(format!(
                "line {}: slug and skill must not be empty",
                rows + 2
            )));
        }
        builder.observe(
            &record.region,
            &record.slug,
            &record.skill,
            &record.category,
            record.count,
            record.last_updated.unwrap_or(collected_at),
        );
        rows += 1;
    }

    info!("Read {} demand rows from {}", rows, path.display());
    Ok(builder.build())
}

#[async_trait]
impl Scraper for CsvScraper {
    fn name(&self) -> &str {
        "csv"
    }

    async fn collect(&self) -> ScrapeResult<Snapshot> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_snapshot(&path)).await?
    }
}
