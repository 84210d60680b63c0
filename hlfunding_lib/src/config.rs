//! Runtime settings: built-in defaults, overlaid by an optional TOML file,
//! overlaid by `HLFUNDING_*` environment variables.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use hlfunding_driver::SessionConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dashboard::DashboardSettings;
use crate::record::Timeframe;
use crate::row::VenueNames;
use crate::scrape::{ScraperSettings, DEFAULT_SCRAPING_URL};

const ENV_PREFIX: &str = "HLFUNDING_";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Env {
        key: String,
        value: String,
        reason: String,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scraping_url: String,
    pub webdriver_url: String,
    pub headless: bool,
    /// Upper bound on one page load.
    pub scraping_timeout_secs: u64,
    /// How long to wait for the document to report ready.
    pub page_load_wait_secs: u64,
    pub retry_attempts: u32,
    /// Fixed user agent; a random desktop Chrome one when unset.
    pub user_agent: Option<String>,
    pub timeframes: Vec<Timeframe>,
    /// Spread magnitude, in percentage points, that counts as an opportunity.
    pub arbitrage_threshold: Decimal,
    pub batch_insert_size: usize,
    pub cleanup_days: u32,
    pub screenshot_dir: PathBuf,
    pub db_path: PathBuf,
    pub venue_a_name: String,
    pub venue_b_name: String,
    pub settle_delay_ms: u64,
    pub timeframe_reload_ms: u64,
    pub table_settle_ms: u64,
    pub table_wait_secs: u64,
    pub retry_backoff_secs: u64,
    pub inter_timeframe_delay_secs: u64,
    pub scroll_every_rows: usize,
    pub scroll_amount_px: i64,
    pub scroll_settle_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scraping_url: DEFAULT_SCRAPING_URL.to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            scraping_timeout_secs: 30,
            page_load_wait_secs: 10,
            retry_attempts: 3,
            user_agent: None,
            timeframes: Timeframe::ALL.to_vec(),
            arbitrage_threshold: Decimal::ONE,
            batch_insert_size: 50,
            cleanup_days: 30,
            screenshot_dir: PathBuf::from("screenshots"),
            db_path: PathBuf::from("hlfunding.db"),
            venue_a_name: "binance".to_string(),
            venue_b_name: "bybit".to_string(),
            settle_delay_ms: 2000,
            timeframe_reload_ms: 2000,
            table_settle_ms: 3000,
            table_wait_secs: 10,
            retry_backoff_secs: 5,
            inter_timeframe_delay_secs: 5,
            scroll_every_rows: 20,
            scroll_amount_px: 500,
            scroll_settle_ms: 500,
        }
    }
}

impl Settings {
    /// Defaults, then `path` (when given), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_from(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Keys missing from `text` keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overlays `HLFUNDING_*` variables read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(&key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| (key, v))
        };

        if let Some((_, v)) = get("SCRAPING_URL") {
            self.scraping_url = v;
        }
        if let Some((_, v)) = get("WEBDRIVER_URL") {
            self.webdriver_url = v;
        }
        if let Some((key, v)) = get("HEADLESS") {
            self.headless = parse_bool(&key, &v)?;
        }
        if let Some((key, v)) = get("SCRAPING_TIMEOUT") {
            self.scraping_timeout_secs = parse_env(&key, &v)?;
        }
        if let Some((key, v)) = get("PAGE_LOAD_WAIT") {
            self.page_load_wait_secs = parse_env(&key, &v)?;
        }
        if let Some((key, v)) = get("RETRY_ATTEMPTS") {
            self.retry_attempts = parse_env(&key, &v)?;
        }
        if let Some((_, v)) = get("USER_AGENT") {
            self.user_agent = Some(v);
        }
        if let Some((key, v)) = get("TIMEFRAMES") {
            self.timeframes = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_env::<Timeframe>(&key, s))
                .collect::<Result<_, _>>()?;
        }
        if let Some((key, v)) = get("ARBITRAGE_THRESHOLD") {
            self.arbitrage_threshold = parse_env(&key, &v)?;
        }
        if let Some((key, v)) = get("BATCH_INSERT_SIZE") {
            self.batch_insert_size = parse_env(&key, &v)?;
        }
        if let Some((key, v)) = get("CLEANUP_DAYS") {
            self.cleanup_days = parse_env(&key, &v)?;
        }
        if let Some((_, v)) = get("SCREENSHOT_DIR") {
            self.screenshot_dir = PathBuf::from(v);
        }
        if let Some((_, v)) = get("DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some((_, v)) = get("VENUE_A_NAME") {
            self.venue_a_name = v;
        }
        if let Some((_, v)) = get("VENUE_B_NAME") {
            self.venue_b_name = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scraping_url.trim().is_empty() {
            return Err(ConfigError::Invalid("scraping_url must not be empty".into()));
        }
        if self.arbitrage_threshold <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "arbitrage_threshold must be greater than 0".into(),
            ));
        }
        if self.retry_attempts < 1 {
            return Err(ConfigError::Invalid("retry_attempts must be at least 1".into()));
        }
        if self.batch_insert_size < 1 {
            return Err(ConfigError::Invalid(
                "batch_insert_size must be at least 1".into(),
            ));
        }
        if self.timeframes.is_empty() {
            return Err(ConfigError::Invalid("timeframes must not be empty".into()));
        }
        if self.venue_a_name.trim().is_empty() || self.venue_b_name.trim().is_empty() {
            return Err(ConfigError::Invalid("venue names must not be empty".into()));
        }
        Ok(())
    }

    pub fn venues(&self) -> VenueNames {
        VenueNames::new(self.venue_a_name.trim(), self.venue_b_name.trim())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            webdriver_url: self.webdriver_url.clone(),
            headless: self.headless,
            user_agent: self.user_agent.clone(),
            page_load_timeout: Duration::from_secs(self.scraping_timeout_secs),
            ..SessionConfig::default()
        }
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            page_load_wait: Duration::from_secs(self.page_load_wait_secs),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            timeframe_reload: Duration::from_millis(self.timeframe_reload_ms),
            table_settle: Duration::from_millis(self.table_settle_ms),
            table_wait: Duration::from_secs(self.table_wait_secs),
            scroll_every_rows: self.scroll_every_rows,
            scroll_amount_px: self.scroll_amount_px,
            scroll_settle: Duration::from_millis(self.scroll_settle_ms),
            ..DashboardSettings::default()
        }
    }

    pub fn scraper_settings(&self) -> ScraperSettings {
        ScraperSettings {
            url: self.scraping_url.clone(),
            max_attempts: self.retry_attempts,
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            inter_timeframe_delay: Duration::from_secs(self.inter_timeframe_delay_secs),
            screenshot_dir: self.screenshot_dir.clone(),
            venues: self.venues(),
            dashboard: self.dashboard_settings(),
        }
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
