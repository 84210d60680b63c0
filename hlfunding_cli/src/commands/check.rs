//! The `check` subcommand: database and WebDriver readiness.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hlfunding_lib::hlfunding_driver::status::driver_status;
use hlfunding_lib::{Db, Settings};
use serde::Serialize;

use crate::output::{print_json, OutputFormat};

/// Arguments for the `check` subcommand.
#[derive(Args)]
pub struct CheckArgs {
    /// SQLite database path
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[derive(Serialize)]
struct CheckReport {
    database: String,
    database_ok: bool,
    stored_rates: Option<i64>,
    last_scrape_at: Option<String>,
    last_scrape_status: Option<String>,
    webdriver_url: String,
    webdriver_ready: bool,
    webdriver_message: String,
}

pub async fn run(args: &CheckArgs, settings: &Settings, format: &OutputFormat) -> Result<()> {
    let path = args.db.clone().unwrap_or_else(|| settings.db_path.clone());
    let mut report = CheckReport {
        database: path.display().to_string(),
        database_ok: false,
        stored_rates: None,
        last_scrape_at: None,
        last_scrape_status: None,
        webdriver_url: settings.webdriver_url.clone(),
        webdriver_ready: false,
        webdriver_message: String::new(),
    };

    let db = Db::open(&path)?;
    db.init()?;
    db.ping()?;
    report.database_ok = true;
    report.stored_rates = Some(db.funding_rate_count()?);
    report.last_scrape_at = db.get_meta("last_scrape_at")?;
    report.last_scrape_status = db.get_meta("last_scrape_status")?;

    match driver_status(&settings.webdriver_url).await {
        Ok(status) => {
            report.webdriver_ready = status.ready;
            report.webdriver_message = status.message;
        }
        Err(e) => report.webdriver_message = e.to_string(),
    }

    if *format == OutputFormat::Json {
        print_json(&report);
    } else {
        println!("Database:  {} (ok)", report.database);
        if let Some(count) = report.stored_rates {
            println!("  stored rates: {}", count);
        }
        match (&report.last_scrape_at, &report.last_scrape_status) {
            (Some(at), Some(status)) => println!("  last scrape:  {} ({})", at, status),
            _ => println!("  last scrape:  never"),
        }
        println!(
            "WebDriver: {} ({})",
            report.webdriver_url,
            if report.webdriver_ready { "ready" } else { "not ready" }
        );
        if !report.webdriver_message.is_empty() {
            println!("  {}", report.webdriver_message);
        }
    }

    if !report.webdriver_ready {
        anyhow::bail!("WebDriver server at {} is not ready", settings.webdriver_url);
    }
    Ok(())
}
