//! Prometheus metrics for the skill demand service.

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Metrics collector for the skill demand service.
///
/// Each instance owns its own [`Registry`], so several collectors can live in
/// one process (the test suites build one per case).
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    queries: IntCounterVec,
    query_errors: IntCounterVec,
    query_latency: HistogramVec,
    refresh_runs: IntCounterVec,
    refresh_duration: Histogram,
    snapshot_rows: IntGaugeVec,
    scrape_latency: HistogramVec,
}

impl Metrics {
    /// Create a new metrics instance.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let queries = IntCounterVec::new(
            Opts::new("skillgap_queries_total", "Total number of aggregation queries served"),
            &["query"],
        )?;

        let query_errors = IntCounterVec::new(
            Opts::new("skillgap_query_errors_total", "Total number of failed aggregation queries"),
            &["query"],
        )?;

        let query_latency = HistogramVec::new(
            HistogramOpts::new("skillgap_query_latency_seconds", "Aggregation query latency in seconds"),
            &["query"],
        )?;

        let refresh_runs = IntCounterVec::new(
            Opts::new("skillgap_refresh_runs_total", "Total number of refresh runs by outcome"),
            &["outcome"],
        )?;

        let refresh_duration = Histogram::with_opts(
            HistogramOpts::new("skillgap_refresh_duration_seconds", "Refresh duration in seconds")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        let snapshot_rows = IntGaugeVec::new(
            Opts::new("skillgap_snapshot_rows", "Row counts of the active snapshot"),
            &["table"],
        )?;

        let scrape_latency = HistogramVec::new(
            HistogramOpts::new("skillgap_scrape_latency_seconds", "Scraper fetch latency in seconds"),
            &["source"],
        )?;

        registry.register(Box::new(queries.clone()))?;
        registry.register(Box::new(query_errors.clone()))?;
        registry.register(Box::new(query_latency.clone()))?;
        registry.register(Box::new(refresh_runs.clone()))?;
        registry.register(Box::new(refresh_duration.clone()))?;
        registry.register(Box::new(snapshot_rows.clone()))?;
        registry.register(Box::new(scrape_latency.clone()))?;

        Ok(Self {
            registry,
            queries,
            query_errors,
            query_latency,
            refresh_runs,
            refresh_duration,
            snapshot_rows,
            scrape_latency,
        })
    }

    /// Record a completed aggregation query.
    pub fn observe_query(&self, query: &str, duration_secs: f64) {
        self.queries.with_label_values(&[query]).inc();
        self.query_latency.with_label_values(&[query]).observe(duration_secs);
    }

    /// Increment the failed query counter.
    pub fn inc_query_errors(&self, query: &str) {
        self.query_errors.with_label_values(&[query]).inc();
    }

    /// Record a refresh run. `outcome` is "succeeded", "failed" or "rejected".
    pub fn observe_refresh(&self, outcome: &str, duration_secs: f64) {
        self.refresh_runs.with_label_values(&[outcome]).inc();
        self.refresh_duration.observe(duration_secs);
    }

    /// Set the row counts of the snapshot that is now being served.
    pub fn set_snapshot_rows(&self, regions: usize, skills: usize, demand_rows: usize) {
        self.snapshot_rows.with_label_values(&["regions"]).set(regions as i64);
        self.snapshot_rows.with_label_values(&["skills"]).set(skills as i64);
        self.snapshot_rows.with_label_values(&["skill_demand"]).set(demand_rows as i64);
    }

    /// Record scraper fetch latency.
    pub fn observe_scrape_latency(&self, source: &str, duration_secs: f64) {
        self.scrape_latency.with_label_values(&[source]).observe(duration_secs);
    }

    /// Number of refresh runs recorded with `outcome`.
    pub fn refresh_count(&self, outcome: &str) -> u64 {
        self.refresh_runs.with_label_values(&[outcome]).get()
    }

    /// Get Prometheus metrics as a string.
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
