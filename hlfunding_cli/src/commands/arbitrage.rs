//! The `arbitrage` subcommand: cross-venue spreads from the latest stored observation.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Args;
use hlfunding_lib::analysis::find_arbitrage_opportunities;
use hlfunding_lib::validation;
use hlfunding_lib::{Db, FundingError, Settings, Timeframe};

use crate::output::{print_arbitrage, OutputFormat};

/// Arguments for the `arbitrage` subcommand.
#[derive(Args)]
pub struct ArbitrageArgs {
    /// Timeframe: hourly, 8hours, day, week, year
    #[arg(long, default_value = "hourly")]
    pub timeframe: String,

    /// Minimum spread magnitude in percentage points (defaults to the configured threshold)
    #[arg(long)]
    pub threshold: Option<String>,

    /// Maximum number of opportunities to show (1-1000)
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// SQLite database path
    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub fn run(args: &ArbitrageArgs, settings: &Settings, format: &OutputFormat) -> Result<()> {
    let timeframe = Timeframe::from_str(&args.timeframe)
        .map_err(|e| FundingError::InvalidInput(e.to_string()))?;
    let threshold = match &args.threshold {
        Some(value) => validation::validate_threshold(value)?,
        None => settings.arbitrage_threshold,
    };
    let limit = validation::validate_limit(args.limit)?;

    let path = args.db.clone().unwrap_or_else(|| settings.db_path.clone());
    let db = Db::open(&path)?;
    db.init()?;

    let records = db.latest_funding_rates(timeframe, validation::MAX_LIMIT)?;
    if records.is_empty() {
        eprintln!(
            "No stored funding rates for {}. Run `hlfunding scrape` first.",
            timeframe
        );
        return Ok(());
    }

    let mut opportunities = find_arbitrage_opportunities(&records, threshold, &settings.venues());
    eprintln!(
        "{} opportunities above {}% among {} assets (observed {})",
        opportunities.len(),
        threshold,
        records.len(),
        records[0].observed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    opportunities.truncate(limit);

    print_arbitrage(&opportunities, format)
}
