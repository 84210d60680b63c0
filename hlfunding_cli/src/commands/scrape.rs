//! The `scrape` subcommand: scrape each timeframe, check quality, persist, and report.

use std::ops::ControlFlow;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use hlfunding_lib::analysis::find_arbitrage_opportunities;
use hlfunding_lib::hlfunding_driver::WebDriverConnector;
use hlfunding_lib::validation::{self, check_quality, QualityReport};
use hlfunding_lib::{
    Db, FundingRateRecord, FundingScraper, JobStatus, ScrapeLog, ScrapePhase, Settings,
    TimeframeRun, VenueNames,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::output::{print_rates, OutputFormat};

/// Arguments for the `scrape` subcommand.
#[derive(Args)]
pub struct ScrapeArgs {
    /// Timeframes to scrape: all, or comma-separated (hourly,8hours,day,week,year)
    #[arg(long)]
    pub timeframe: Option<String>,

    /// Attempts per timeframe (1-10)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// SQLite database path
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Print records without writing them to the database
    #[arg(long)]
    pub no_persist: bool,
}

/// Result of one timeframe after quality and arbitrage checks.
struct TimeframeOutcome {
    records: Vec<FundingRateRecord>,
    log: ScrapeLog,
}

/// `Failed` when every attempt failed, otherwise the quality verdict.
fn job_status(phase: ScrapePhase, report: &QualityReport) -> JobStatus {
    if phase == ScrapePhase::Failed {
        JobStatus::Failed
    } else {
        report.status()
    }
}

/// The worst of two statuses.
fn worst(a: JobStatus, b: JobStatus) -> JobStatus {
    fn rank(s: JobStatus) -> u8 {
        match s {
            JobStatus::Success => 0,
            JobStatus::Partial => 1,
            JobStatus::Failed => 2,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

pub async fn run(
    args: &ScrapeArgs,
    settings: &Settings,
    format: &OutputFormat,
    cancel: CancellationToken,
) -> Result<JobStatus> {
    let timeframes = match &args.timeframe {
        Some(tf) => validation::validate_timeframes(tf)?,
        None => settings.timeframes.clone(),
    };
    let max_attempts =
        validation::validate_max_attempts(args.max_attempts.unwrap_or(settings.retry_attempts))?;

    let mut db = if args.no_persist {
        None
    } else {
        let path = args.db.clone().unwrap_or_else(|| settings.db_path.clone());
        let db = Db::open(&path)?;
        db.init()?;
        Some(db)
    };

    eprintln!(
        "Scraping {} timeframe(s) from {}",
        timeframes.len(),
        settings.scraping_url
    );

    let pb = ProgressBar::new(timeframes.len() as u64);
    pb.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>2}/{len:2} {msg}",
    )?);
    pb.set_message("scraping");

    let mut scraper_settings = settings.scraper_settings();
    scraper_settings.max_attempts = max_attempts;
    let connector = WebDriverConnector::new(settings.session_config());
    let mut scraper = FundingScraper::new(connector, scraper_settings, cancel);

    let venues = settings.venues();
    let mut outcomes = Vec::with_capacity(timeframes.len());
    let mut failure = None;
    scraper
        .scrape_all_with(&timeframes, |run| {
            match record_run(run, settings, &venues, db.as_mut()) {
                Ok(outcome) => {
                    pb.inc(1);
                    pb.set_message(format!("{} done", outcome.log.timeframe));
                    outcomes.push(outcome);
                    ControlFlow::Continue(())
                }
                Err(e) => {
                    failure = Some(e);
                    ControlFlow::Break(())
                }
            }
        })
        .await;
    pb.finish_and_clear();
    scraper.close().await;
    if let Some(e) = failure {
        return Err(e);
    }

    let mut status = if outcomes.is_empty() {
        JobStatus::Failed
    } else {
        JobStatus::Success
    };
    let mut records = Vec::new();
    for outcome in outcomes {
        status = worst(status, outcome.log.status);
        eprintln!(
            "{}: {} ({} records, {} arbitrage opportunities, {:.1}s)",
            outcome.log.timeframe,
            outcome.log.status,
            outcome.log.records_scraped,
            outcome.log.arbitrage_opportunities,
            outcome.log.duration_secs
        );
        if let Some(message) = &outcome.log.error_message {
            eprintln!("  {}", message);
        }
        records.extend(outcome.records);
    }

    if let Some(db) = db.as_ref() {
        db.set_meta("last_scrape_at", &Utc::now().to_rfc3339())?;
        db.set_meta("last_scrape_status", status.as_str())?;
    }

    print_rates(&records, format)?;
    eprintln!("Scrape finished: {}", status);
    Ok(status)
}

/// Checks quality, reports arbitrage, and persists one finished timeframe.
fn record_run(
    run: TimeframeRun,
    settings: &Settings,
    venues: &VenueNames,
    mut db: Option<&mut Db>,
) -> Result<TimeframeOutcome> {
    let TimeframeRun {
        timeframe,
        records,
        phase,
        attempts,
        duration,
    } = run;

    let report = check_quality(&records, Utc::now());
    let mut status = job_status(phase, &report);
    let mut error_message = if status == JobStatus::Failed {
        Some(format!("all {} scrape attempts failed", attempts))
    } else if report.is_clean() {
        None
    } else {
        Some(report.summary())
    };

    let opportunities = find_arbitrage_opportunities(&records, settings.arbitrage_threshold, venues);
    for opp in opportunities.iter().take(5) {
        tracing::info!(
            "Arbitrage {} vs {} ({}): spread {}%",
            opp.asset_symbol,
            opp.venue,
            timeframe,
            opp.spread
        );
    }

    if let Some(db) = db.as_deref_mut() {
        if let Err(e) = db.upsert_funding_rates(&records, settings.batch_insert_size) {
            tracing::error!("Failed to store {} records: {}", timeframe, e);
            status = JobStatus::Failed;
            error_message = Some(format!("persistence failed: {}", e));
        }
    }

    let log = ScrapeLog {
        status,
        timeframe,
        records_scraped: records.len(),
        duration_secs: duration.as_secs_f64(),
        error_message,
        arbitrage_opportunities: opportunities.len(),
        created_at: Utc::now(),
    };
    if let Some(db) = db.as_deref() {
        db.insert_scrape_log(&log)?;
    }

    Ok(TimeframeOutcome { records, log })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::time::Duration;

    use hlfunding_lib::{QualityIssue, Sentiment, Timeframe};
    use rust_decimal::Decimal;

    fn finished(phase: ScrapePhase, records: Vec<FundingRateRecord>) -> TimeframeRun {
        TimeframeRun {
            timeframe: Timeframe::Hourly,
            records,
            phase,
            attempts: 4,
            duration: Duration::from_millis(1500),
        }
    }

    fn btc_with_spread() -> FundingRateRecord {
        let mut btc = FundingRateRecord::new("BTC", Timeframe::Hourly, Utc::now());
        btc.rank_by_open_interest = Some(1);
        btc.open_interest = Some(Decimal::from(1_500_000));
        btc.native_funding_rate = Some(Decimal::from_str("1.5").unwrap());
        btc.native_sentiment = Some(Sentiment::Positive);
        btc.arbitrage_spread_a = Some(Decimal::from_str("1.5").unwrap());
        btc
    }

    #[test]
    fn test_record_run_persists_records_and_log() {
        let mut db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        let settings = Settings::default();

        let outcome = record_run(
            finished(ScrapePhase::Success, vec![btc_with_spread()]),
            &settings,
            &settings.venues(),
            Some(&mut db),
        )
        .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.log.records_scraped, 1);
        assert_eq!(outcome.log.arbitrage_opportunities, 1);
        assert_eq!(outcome.log.duration_secs, 1.5);
        assert_eq!(db.funding_rate_count().unwrap(), 1);
        let logs = db.recent_scrape_logs(10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, outcome.log.status);
    }

    #[test]
    fn test_record_run_failed_phase_reports_attempts() {
        let settings = Settings::default();
        let outcome = record_run(
            finished(ScrapePhase::Failed, Vec::new()),
            &settings,
            &settings.venues(),
            None,
        )
        .unwrap();

        assert_eq!(outcome.log.status, JobStatus::Failed);
        assert_eq!(
            outcome.log.error_message.as_deref(),
            Some("all 4 scrape attempts failed")
        );
    }

    #[test]
    fn test_job_status_failed_phase_wins() {
        let report = QualityReport::default();
        assert_eq!(job_status(ScrapePhase::Failed, &report), JobStatus::Failed);
        assert_eq!(job_status(ScrapePhase::Success, &report), JobStatus::Success);
    }

    #[test]
    fn test_job_status_quality_issues_are_partial() {
        let report = QualityReport {
            issues: vec![QualityIssue::NoRecords],
        };
        assert_eq!(job_status(ScrapePhase::Success, &report), JobStatus::Partial);
    }

    #[test]
    fn test_worst_status() {
        assert_eq!(worst(JobStatus::Success, JobStatus::Partial), JobStatus::Partial);
        assert_eq!(worst(JobStatus::Failed, JobStatus::Partial), JobStatus::Failed);
        assert_eq!(worst(JobStatus::Success, JobStatus::Success), JobStatus::Success);
    }
}
