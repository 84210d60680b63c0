//! The `stats` subcommand: scrape job statistics and recent runs.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hlfunding_lib::validation;
use hlfunding_lib::{Db, Settings};

use crate::output::{print_scrape_logs, print_stats, OutputFormat};

/// Arguments for the `stats` subcommand.
#[derive(Args)]
pub struct StatsArgs {
    /// Look-back window in hours
    #[arg(long, default_value = "24")]
    pub hours: u32,

    /// Number of recent runs to list (0 to skip)
    #[arg(long, default_value = "10")]
    pub recent: usize,

    /// SQLite database path
    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub fn run(args: &StatsArgs, settings: &Settings, format: &OutputFormat) -> Result<()> {
    let hours = validation::validate_hours(args.hours)?;

    let path = args.db.clone().unwrap_or_else(|| settings.db_path.clone());
    let db = Db::open(&path)?;
    db.init()?;

    let stats = db.scrape_stats(hours)?;
    print_stats(&stats, format)?;

    if args.recent > 0 {
        let logs = db.recent_scrape_logs(validation::validate_limit(args.recent)?)?;
        if !logs.is_empty() {
            print_scrape_logs(&logs, format)?;
        }
    }
    Ok(())
}
