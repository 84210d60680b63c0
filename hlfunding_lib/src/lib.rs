//! Library layer for the funding-rate scraper: dashboard driving, row
//! extraction, value parsing, analysis, and SQLite persistence.
//!
//! Wraps the `hlfunding_driver` browser crate with a retrying scraper state
//! machine, input validation, and arbitrage analysis functions.

pub mod analysis;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod parse;
pub mod record;
pub mod row;
pub mod scrape;
pub mod validation;

pub use hlfunding_driver;

pub use analysis::{find_arbitrage_opportunities, snapshot_stats, ArbitrageOpportunity, SnapshotStats};
pub use config::{ConfigError, Settings};
pub use dashboard::{Dashboard, DashboardSettings, NavigationOutcome, ScreenshotStore};
pub use db::{Db, DbError, ScrapeStats};
pub use error::FundingError;
pub use record::{FundingRateRecord, JobStatus, ScrapeLog, Sentiment, Timeframe};
pub use row::{RowExtractor, RowSnapshot, VenueNames};
pub use scrape::{
    run_scrape, FundingScraper, ScrapePhase, ScraperSettings, TimeframeRun, DEFAULT_SCRAPING_URL,
};
pub use validation::{check_quality, QualityIssue, QualityReport};
