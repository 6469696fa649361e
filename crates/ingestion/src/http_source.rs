//! HTTP collector scraper.

use async_trait::async_trait;
use reqwest::Client;
use skillgap_telemetry::Metrics;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::scraper::{ScrapeError, ScrapeResult, Scraper, Snapshot};

/// Fetches a JSON snapshot from a collector endpoint.
///
/// The endpoint returns
/// `{"regions":[{"name","slug"}],"skills":[{"name","category"}],
///   "demand":[{"regionSlug","skillName","category","count","lastUpdated"}]}`.
pub struct HttpScraper {
    client: Client,
    url: String,
    metrics: Metrics,
}

impl HttpScraper {
    /// Create a new collector client.
    ///
    /// # Arguments
    /// * `url` - HTTP/HTTPS endpoint serving the snapshot JSON
    /// * `request_timeout` - Bound on the whole request, body included
    /// * `metrics` - Metrics collector
    pub fn new(url: &str, request_timeout: Duration, metrics: Metrics) -> ScrapeResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        info!("Initialized collector client for {}", url);

        Ok(Self {
            client,
            url: url.to_string(),
            metrics,
        })
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    fn name(&self) -> &str {
        "http"
    }

    async fn collect(&self) -> ScrapeResult<Snapshot> {
        let start = Instant::now();
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(ScrapeError::Status(response.status().as_u16()));
        }

        let snapshot: Snapshot = response.json().await?;
        self.metrics
            .observe_scrape_latency(self.name(), start.elapsed().as_secs_f64());

        debug!(
            "Fetched snapshot with {} regions, {} skills, {} demand rows",
            snapshot.regions.len(),
            snapshot.skills.len(),
            snapshot.demand.len()
        );
        Ok(snapshot)
    }
}
