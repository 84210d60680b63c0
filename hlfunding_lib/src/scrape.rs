//! Scrape orchestration: retries, session ownership and multi-timeframe runs.

use std::fmt;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;

use hlfunding_driver::{BrowserSession, SessionConnector};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::dashboard::{Dashboard, DashboardSettings, NavigationOutcome, ScreenshotStore};
use crate::record::{FundingRateRecord, Timeframe};
use crate::row::{RowExtractor, VenueNames};

pub const DEFAULT_SCRAPING_URL: &str = "https://data.asxn.xyz/dashboard/hl-funding-rate";

/// Where a scrape currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapePhase {
    Idle,
    Navigating,
    SelectingTimeframe,
    Extracting,
    Retrying,
    Success,
    Failed,
}

impl fmt::Display for ScrapePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScrapePhase::Idle => "idle",
            ScrapePhase::Navigating => "navigating",
            ScrapePhase::SelectingTimeframe => "selecting_timeframe",
            ScrapePhase::Extracting => "extracting",
            ScrapePhase::Retrying => "retrying",
            ScrapePhase::Success => "success",
            ScrapePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ScraperSettings {
    pub url: String,
    /// Attempts per timeframe used by [`FundingScraper::scrape_all`].
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one.
    pub retry_backoff: Duration,
    /// Pause between two timeframes.
    pub inter_timeframe_delay: Duration,
    pub screenshot_dir: PathBuf,
    pub venues: VenueNames,
    pub dashboard: DashboardSettings,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SCRAPING_URL.to_string(),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(5),
            inter_timeframe_delay: Duration::from_secs(5),
            screenshot_dir: PathBuf::from("screenshots"),
            venues: VenueNames::default(),
            dashboard: DashboardSettings::default(),
        }
    }
}

/// One finished timeframe from [`FundingScraper::scrape_all_with`].
#[derive(Debug)]
pub struct TimeframeRun {
    pub timeframe: Timeframe,
    pub records: Vec<FundingRateRecord>,
    /// `Success` or `Failed`.
    pub phase: ScrapePhase,
    /// Attempt budget the timeframe was scraped with.
    pub attempts: u32,
    pub duration: Duration,
}

#[derive(thiserror::Error, Debug)]
enum AttemptError {
    #[error("could not start browser session: {0}")]
    Connect(hlfunding_driver::Error),
    #[error("navigation timed out")]
    NavigationTimeout,
    #[error("navigation failed: {0}")]
    Navigation(String),
}

fn enter(phase: &mut ScrapePhase, next: ScrapePhase, timeframe: Timeframe) {
    tracing::debug!("{}: {} -> {}", timeframe, phase, next);
    *phase = next;
}

/// Scrapes the funding dashboard through sessions from `C`.
///
/// The browser session is started on the first attempt and kept for later
/// ones. Call [`FundingScraper::close`] when done, or use [`run_scrape`].
pub struct FundingScraper<C: SessionConnector> {
    connector: C,
    session: Option<C::Session>,
    settings: ScraperSettings,
    extractor: RowExtractor,
    screenshots: ScreenshotStore,
    cancel: CancellationToken,
    phase: ScrapePhase,
}

impl<C: SessionConnector> FundingScraper<C> {
    pub fn new(connector: C, settings: ScraperSettings, cancel: CancellationToken) -> Self {
        let extractor = RowExtractor::new(settings.venues.clone());
        let screenshots = ScreenshotStore::new(settings.screenshot_dir.clone());
        Self {
            connector,
            session: None,
            settings,
            extractor,
            screenshots,
            cancel,
            phase: ScrapePhase::Idle,
        }
    }

    pub fn phase(&self) -> ScrapePhase {
        self.phase
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn settings(&self) -> &ScraperSettings {
        &self.settings
    }

    /// Scrapes one timeframe, trying up to `max_attempts` times.
    ///
    /// Never fails: an exhausted retry budget (or a cancellation before the
    /// first attempt) returns an empty vector. An attempt that loads the page
    /// but finds no rows is final and is not retried.
    pub async fn scrape(
        &mut self,
        timeframe: Timeframe,
        max_attempts: u32,
    ) -> Vec<FundingRateRecord> {
        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                tracing::info!("Scrape of {} cancelled", timeframe);
                enter(&mut self.phase, ScrapePhase::Failed, timeframe);
                return Vec::new();
            }

            match self.attempt(timeframe).await {
                Ok(records) => {
                    enter(&mut self.phase, ScrapePhase::Success, timeframe);
                    tracing::info!(
                        "Scraped {} records for {} (attempt {}/{})",
                        records.len(),
                        timeframe,
                        attempt,
                        max_attempts
                    );
                    return records;
                }
                Err(err) if attempt < max_attempts => {
                    enter(&mut self.phase, ScrapePhase::Retrying, timeframe);
                    tracing::warn!(
                        "Scrape of {} failed (attempt {}/{}): {}, retrying in {:.1}s",
                        timeframe,
                        attempt,
                        max_attempts,
                        err,
                        self.settings.retry_backoff.as_secs_f64()
                    );
                    let cancel = self.cancel.clone();
                    tokio::select! {
                        _ = tokio::time::sleep(self.settings.retry_backoff) => {}
                        _ = cancel.cancelled() => {}
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "Scrape of {} failed (attempt {}/{}): {}",
                        timeframe,
                        attempt,
                        max_attempts,
                        err
                    );
                    self.capture_failure_screenshot(timeframe).await;
                }
            }
        }

        enter(&mut self.phase, ScrapePhase::Failed, timeframe);
        tracing::error!(
            "All {} scrape attempts for {} failed",
            max_attempts,
            timeframe
        );
        Vec::new()
    }

    async fn attempt(&mut self, timeframe: Timeframe) -> Result<Vec<FundingRateRecord>, AttemptError> {
        enter(&mut self.phase, ScrapePhase::Navigating, timeframe);
        let session = match self.session.take() {
            Some(session) => session,
            None => self.connector.connect().await.map_err(AttemptError::Connect)?,
        };
        let session = self.session.insert(session);

        let mut dashboard = Dashboard::new(session, &self.settings.dashboard, &self.screenshots);
        match dashboard.navigate(&self.settings.url).await {
            NavigationOutcome::Loaded => {}
            NavigationOutcome::TimedOut { .. } => return Err(AttemptError::NavigationTimeout),
            NavigationOutcome::Failed(message) => {
                // The session may be dead; the next attempt starts a fresh one.
                self.discard_session().await;
                return Err(AttemptError::Navigation(message));
            }
        }

        enter(&mut self.phase, ScrapePhase::SelectingTimeframe, timeframe);
        dashboard.select_timeframe(timeframe).await;

        enter(&mut self.phase, ScrapePhase::Extracting, timeframe);
        Ok(dashboard
            .extract_records(&self.extractor, timeframe, &self.cancel)
            .await)
    }

    async fn capture_failure_screenshot(&mut self, timeframe: Timeframe) {
        if let Some(session) = self.session.as_mut() {
            let label = format!("scrape_failed_{}", timeframe);
            Dashboard::new(session, &self.settings.dashboard, &self.screenshots)
                .capture_screenshot(&label)
                .await;
        }
    }

    async fn discard_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.quit().await {
                tracing::debug!("Error quitting failed session: {}", e);
            }
        }
    }

    /// Scrapes each timeframe in order, pausing between them. Stops at the
    /// first cancellation check that fires; timeframes already scraped are
    /// returned.
    pub async fn scrape_all(
        &mut self,
        timeframes: &[Timeframe],
    ) -> Vec<(Timeframe, Vec<FundingRateRecord>)> {
        let mut results = Vec::with_capacity(timeframes.len());
        self.scrape_all_with(timeframes, |run| {
            results.push((run.timeframe, run.records));
            ControlFlow::Continue(())
        })
        .await;
        results
    }

    /// Like [`FundingScraper::scrape_all`], but hands each finished timeframe
    /// to `on_run` as soon as it completes. `on_run` may break to skip the
    /// remaining timeframes. Returns how many timeframes ran.
    pub async fn scrape_all_with<F>(&mut self, timeframes: &[Timeframe], mut on_run: F) -> usize
    where
        F: FnMut(TimeframeRun) -> ControlFlow<()>,
    {
        let mut completed = 0;
        for (index, &timeframe) in timeframes.iter().enumerate() {
            if index > 0 {
                let cancel = self.cancel.clone();
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.inter_timeframe_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
            if self.cancel.is_cancelled() {
                tracing::info!(
                    "Cancellation requested, skipping {} remaining timeframe(s)",
                    timeframes.len() - index
                );
                break;
            }
            let started = Instant::now();
            let records = self.scrape(timeframe, self.settings.max_attempts).await;
            completed += 1;
            let run = TimeframeRun {
                timeframe,
                records,
                phase: self.phase,
                attempts: self.settings.max_attempts,
                duration: started.elapsed(),
            };
            if on_run(run).is_break() {
                tracing::info!(
                    "Stopping after {}, skipping {} remaining timeframe(s)",
                    timeframe,
                    timeframes.len() - index - 1
                );
                break;
            }
        }
        completed
    }

    /// Ends the browser session. Safe to call repeatedly or with no session.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            match session.quit().await {
                Ok(()) => tracing::info!("Browser session closed"),
                Err(e) => tracing::warn!("Error closing browser session: {}", e),
            }
        }
        self.phase = ScrapePhase::Idle;
    }
}

impl<C: SessionConnector> Drop for FundingScraper<C> {
    fn drop(&mut self) {
        if self.session.is_some() {
            tracing::warn!("FundingScraper dropped with an open browser session; call close()");
        }
    }
}

/// Scrapes `timeframes` with a fresh scraper and always closes its session.
pub async fn run_scrape<C: SessionConnector>(
    connector: C,
    settings: ScraperSettings,
    timeframes: &[Timeframe],
    cancel: CancellationToken,
) -> Vec<(Timeframe, Vec<FundingRateRecord>)> {
    let mut scraper = FundingScraper::new(connector, settings, cancel);
    let results = scraper.scrape_all(timeframes).await;
    scraper.close().await;
    results
}
