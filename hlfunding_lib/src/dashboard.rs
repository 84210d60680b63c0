//! Drives one browser session through the funding dashboard: load the page,
//! pick a timeframe, find the table and read its rows.
//!
//! Every browser interaction here is best effort. Missing controls and
//! unreadable rows are logged and skipped; only navigation reports failure,
//! and it does so through [`NavigationOutcome`] rather than an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use hlfunding_driver::query::{row_queries, table_queries, timeframe_button_queries, XPathQuery};
use hlfunding_driver::BrowserSession;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::record::{FundingRateRecord, Timeframe};
use crate::row::{RowExtractor, RowSnapshot};

/// Waits and scroll behaviour for one dashboard pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSettings {
    /// How long to poll `document.readyState` after navigation.
    pub page_load_wait: Duration,
    /// Fixed pause after the page reports ready, for client-side rendering.
    pub settle_delay: Duration,
    /// Pause after clicking a timeframe control.
    pub timeframe_reload: Duration,
    /// Pause before looking for the table.
    pub table_settle: Duration,
    /// Upper bound on waiting for each table query.
    pub table_wait: Duration,
    pub poll_interval: Duration,
    /// Scroll after this many rows; 0 disables scrolling.
    pub scroll_every_rows: usize,
    pub scroll_amount_px: i64,
    pub scroll_settle: Duration,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            page_load_wait: Duration::from_secs(10),
            settle_delay: Duration::from_secs(2),
            timeframe_reload: Duration::from_secs(2),
            table_settle: Duration::from_secs(3),
            table_wait: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            scroll_every_rows: 20,
            scroll_amount_px: 500,
            scroll_settle: Duration::from_millis(500),
        }
    }
}

/// Writes diagnostic screenshots as timestamped PNG files.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves `png` as `{label}_{timestamp}.png`, creating the directory.
    pub async fn save(&self, label: &str, png: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!("{}_{}.png", label, Utc::now().format("%Y%m%d_%H%M%S_%3f"));
        let path = self.dir.join(name);
        tokio::fs::write(&path, png).await?;
        Ok(path)
    }
}

/// Result of loading the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Loaded,
    /// The page did not load within the page-load timeout. Carries the
    /// diagnostic screenshot path when one could be written.
    TimedOut { screenshot: Option<PathBuf> },
    /// The driver rejected the navigation.
    Failed(String),
}

impl NavigationOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, NavigationOutcome::Loaded)
    }
}

/// Controller over a borrowed browser session.
pub struct Dashboard<'a, S: BrowserSession> {
    session: &'a mut S,
    settings: &'a DashboardSettings,
    screenshots: &'a ScreenshotStore,
}

impl<'a, S: BrowserSession> Dashboard<'a, S> {
    pub fn new(
        session: &'a mut S,
        settings: &'a DashboardSettings,
        screenshots: &'a ScreenshotStore,
    ) -> Self {
        Self {
            session,
            settings,
            screenshots,
        }
    }

    /// Loads `url`, waits for the document to be ready, then settles.
    pub async fn navigate(&mut self, url: &str) -> NavigationOutcome {
        tracing::info!("Navigating to {}", url);
        if let Err(e) = self.session.goto(url).await {
            if e.is_timeout() {
                tracing::warn!("Navigation to {} timed out", url);
                let screenshot = self.capture_screenshot("navigation_timeout").await;
                return NavigationOutcome::TimedOut { screenshot };
            }
            tracing::warn!("Navigation to {} failed: {}", url, e);
            return NavigationOutcome::Failed(e.to_string());
        }

        if !self.wait_for_page_load().await {
            tracing::warn!(
                "Page did not report ready within {}s, continuing",
                self.settings.page_load_wait.as_secs()
            );
        }
        sleep(self.settings.settle_delay).await;
        NavigationOutcome::Loaded
    }

    /// Polls `document.readyState` until it is `complete` or the wait runs out.
    pub async fn wait_for_page_load(&mut self) -> bool {
        let deadline = Instant::now() + self.settings.page_load_wait;
        loop {
            match self.session.ready_state().await {
                Ok(state) if state == "complete" => return true,
                Ok(_) => {}
                Err(e) => tracing::debug!("readyState check failed: {}", e),
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    /// Clicks the control labelled for `timeframe`. Returns `false` when no
    /// query finds a clickable control; the page keeps its current timeframe.
    pub async fn select_timeframe(&mut self, timeframe: Timeframe) -> bool {
        let label = timeframe.ui_label();
        for query in timeframe_button_queries(label) {
            let buttons = match self.session.find_all(&query).await {
                Ok(buttons) => buttons,
                Err(e) => {
                    tracing::debug!("Timeframe query {} failed: {}", query, e);
                    continue;
                }
            };
            let Some(button) = buttons.first() else {
                continue;
            };
            match self.session.click(button).await {
                Ok(()) => {
                    tracing::info!(
                        "Selected timeframe {} ({}) via {}",
                        timeframe,
                        label,
                        query.name()
                    );
                    sleep(self.settings.timeframe_reload).await;
                    return true;
                }
                Err(e) => tracing::debug!("Click on {} failed: {}", query, e),
            }
        }
        tracing::warn!(
            "No control found for timeframe {} ({}), extracting the active timeframe",
            timeframe,
            label
        );
        false
    }

    /// Finds the data table, trying each table query in order.
    pub async fn locate_table(&mut self) -> Option<S::Element> {
        for query in table_queries() {
            if let Some(table) = self.wait_for_first(&query).await {
                tracing::debug!("Table located via {}", query);
                return Some(table);
            }
        }
        None
    }

    async fn wait_for_first(&mut self, query: &XPathQuery) -> Option<S::Element> {
        let deadline = Instant::now() + self.settings.table_wait;
        loop {
            match self.session.find_all(query).await {
                Ok(mut found) if !found.is_empty() => return Some(found.swap_remove(0)),
                Ok(_) => {}
                Err(e) => tracing::debug!("Query {} failed: {}", query, e),
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    /// Data rows of `table`; the first row query with results wins.
    pub async fn locate_rows(&mut self, table: &S::Element) -> Vec<S::Element> {
        for query in row_queries() {
            match self.session.find_all_in(table, &query).await {
                Ok(rows) if !rows.is_empty() => {
                    tracing::debug!("{} rows located via {}", rows.len(), query);
                    return rows;
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Row query {} failed: {}", query, e),
            }
        }
        Vec::new()
    }

    /// Reads every row of the table into records. Stops early, keeping what
    /// was read, once `cancel` fires.
    pub async fn extract_records(
        &mut self,
        extractor: &RowExtractor,
        timeframe: Timeframe,
        cancel: &CancellationToken,
    ) -> Vec<FundingRateRecord> {
        sleep(self.settings.table_settle).await;

        let Some(table) = self.locate_table().await else {
            tracing::warn!("No funding table found for {}", timeframe);
            return Vec::new();
        };
        let rows = self.locate_rows(&table).await;
        if rows.is_empty() {
            tracing::warn!("Funding table for {} has no rows", timeframe);
            return Vec::new();
        }
        tracing::info!("Found {} rows for {}", rows.len(), timeframe);

        let observed_at = Utc::now();
        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(
                    "Cancelled after {} of {} rows for {}",
                    index,
                    rows.len(),
                    timeframe
                );
                break;
            }
            let every = self.settings.scroll_every_rows;
            if index > 0 && every > 0 && index % every == 0 {
                self.scroll().await;
            }

            let html = match self.session.outer_html(row).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::debug!("Row {} unreadable: {}", index + 1, e);
                    continue;
                }
            };
            let snapshot = RowSnapshot::from_html(&html);
            let rank = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if let Some(record) = extractor.extract(&snapshot, timeframe, rank, observed_at) {
                records.push(record);
            }
        }

        tracing::info!(
            "Extracted {} records from {} rows for {}",
            records.len(),
            rows.len(),
            timeframe
        );
        records
    }

    async fn scroll(&mut self) {
        if let Err(e) = self.session.scroll_by(self.settings.scroll_amount_px).await {
            tracing::debug!("Scroll failed: {}", e);
        }
        sleep(self.settings.scroll_settle).await;
    }

    /// Saves a screenshot of the current page. `None` when either the
    /// capture or the write fails.
    pub async fn capture_screenshot(&mut self, label: &str) -> Option<PathBuf> {
        let png = match self.session.screenshot().await {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!("Screenshot capture failed: {}", e);
                return None;
            }
        };
        match self.screenshots.save(label, &png).await {
            Ok(path) => {
                tracing::info!("Screenshot saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!(
                    "Could not write screenshot to {}: {}",
                    self.screenshots.dir().display(),
                    e
                );
                None
            }
        }
    }
}
