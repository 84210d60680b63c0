//! The `cleanup` subcommand: delete old funding rates and scrape logs.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hlfunding_lib::validation;
use hlfunding_lib::{Db, Settings};

/// Arguments for the `cleanup` subcommand.
#[derive(Args)]
pub struct CleanupArgs {
    /// Delete data older than this many days (defaults to the configured retention)
    #[arg(long)]
    pub days: Option<u32>,

    /// SQLite database path
    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub fn run(args: &CleanupArgs, settings: &Settings) -> Result<()> {
    let days = validation::validate_days(args.days.unwrap_or(settings.cleanup_days))?;

    let path = args.db.clone().unwrap_or_else(|| settings.db_path.clone());
    let db = Db::open(&path)?;
    db.init()?;

    let removed = db.cleanup_old_data(days)?;
    eprintln!(
        "Removed {} rows older than {} days from {}",
        removed,
        days,
        path.display()
    );
    Ok(())
}
