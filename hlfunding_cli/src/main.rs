mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hlfunding_lib::{JobStatus, Settings};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "hlfunding")]
#[command(about = "Scrape Hyperliquid funding rates and flag cross-venue arbitrage")]
struct Cli {
    /// Output format: table, json, csv, or markdown
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// Log level for hlfunding crates (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the dashboard, persist records and report arbitrage
    Scrape(commands::scrape::ScrapeArgs),
    /// Show arbitrage opportunities from the latest stored observation
    Arbitrage(commands::arbitrage::ArbitrageArgs),
    /// Show scrape job statistics
    Stats(commands::stats::StatsArgs),
    /// Delete old funding rates and scrape logs
    Cleanup(commands::cleanup::CleanupArgs),
    /// Check the database and the WebDriver server
    Check(commands::check::CheckArgs),
}

fn init_tracing(log_level: Option<&str>, json: bool) -> Result<()> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hlfunding=info"));
    if let Some(level) = log_level {
        filter = filter.add_directive(format!("hlfunding={}", level).parse()?);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Cancels `cancel` on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown().await;
        tracing::warn!("Shutdown requested, stopping after the current step");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::debug!("SIGTERM handler unavailable: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.log_json)?;

    let format = OutputFormat::parse(&cli.output)?;
    let settings = Settings::load(cli.config.as_deref())?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    match &cli.command {
        Commands::Scrape(args) => {
            let status = commands::scrape::run(args, &settings, &format, cancel).await?;
            if status == JobStatus::Failed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Arbitrage(args) => commands::arbitrage::run(args, &settings, &format)?,
        Commands::Stats(args) => commands::stats::run(args, &settings, &format)?,
        Commands::Cleanup(args) => commands::cleanup::run(args, &settings)?,
        Commands::Check(args) => commands::check::run(args, &settings, &format).await?,
    }

    Ok(ExitCode::SUCCESS)
}
