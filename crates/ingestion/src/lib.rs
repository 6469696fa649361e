//! Scrape-and-replace refresh cycle for the skill demand store.

pub mod csv_source;
pub mod http_source;
pub mod refresh;
pub mod scraper;

pub use csv_source::CsvScraper;
pub use http_source::HttpScraper;
pub use refresh::{RefreshCoordinator, RefreshError, RefreshMode, RefreshOutcome};
pub use scraper::{ScrapeError, ScrapeResult, Scraper};
