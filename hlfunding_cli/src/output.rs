use anyhow::{bail, Result};
use hlfunding_lib::analysis::ArbitrageOpportunity;
use hlfunding_lib::{FundingRateRecord, ScrapeLog, ScrapeStats};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => bail!(
                "unknown output format '{}' (expected table, json, csv, or markdown)",
                other
            ),
        }
    }
}

#[derive(Tabled, Serialize)]
struct RateRow {
    #[tabled(rename = "Rank")]
    #[serde(rename = "Rank")]
    rank: String,
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Timeframe")]
    #[serde(rename = "Timeframe")]
    timeframe: String,
    #[tabled(rename = "Open Interest")]
    #[serde(rename = "Open Interest")]
    open_interest: String,
    #[tabled(rename = "Native Rate")]
    #[serde(rename = "Native Rate")]
    native_rate: String,
    #[tabled(rename = "Sentiment")]
    #[serde(rename = "Sentiment")]
    sentiment: String,
    #[tabled(rename = "Venue A Rate")]
    #[serde(rename = "Venue A Rate")]
    venue_a_rate: String,
    #[tabled(rename = "Venue B Rate")]
    #[serde(rename = "Venue B Rate")]
    venue_b_rate: String,
    #[tabled(rename = "Spread A")]
    #[serde(rename = "Spread A")]
    spread_a: String,
    #[tabled(rename = "Spread B")]
    #[serde(rename = "Spread B")]
    spread_b: String,
    #[tabled(rename = "Fav")]
    #[serde(rename = "Fav")]
    favorited: String,
}

#[derive(Tabled, Serialize)]
struct ArbitrageRow {
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Timeframe")]
    #[serde(rename = "Timeframe")]
    timeframe: String,
    #[tabled(rename = "Venue")]
    #[serde(rename = "Venue")]
    venue: String,
    #[tabled(rename = "Native Rate")]
    #[serde(rename = "Native Rate")]
    native_rate: String,
    #[tabled(rename = "Venue Rate")]
    #[serde(rename = "Venue Rate")]
    venue_rate: String,
    #[tabled(rename = "Spread")]
    #[serde(rename = "Spread")]
    spread: String,
}

#[derive(Tabled, Serialize)]
struct ScrapeLogRow {
    #[tabled(rename = "Time")]
    #[serde(rename = "Time")]
    time: String,
    #[tabled(rename = "Timeframe")]
    #[serde(rename = "Timeframe")]
    timeframe: String,
    #[tabled(rename = "Status")]
    #[serde(rename = "Status")]
    status: String,
    #[tabled(rename = "Records")]
    #[serde(rename = "Records")]
    records: usize,
    #[tabled(rename = "Duration")]
    #[serde(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Arbitrage")]
    #[serde(rename = "Arbitrage")]
    arbitrage: usize,
    #[tabled(rename = "Error")]
    #[serde(rename = "Error")]
    error: String,
}

#[derive(Tabled, Serialize)]
struct StatRow {
    #[tabled(rename = "Metric")]
    #[serde(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    #[serde(rename = "Value")]
    value: String,
}

// -- Row builders --

fn build_rate_rows(records: &[FundingRateRecord]) -> Vec<RateRow> {
    records
        .iter()
        .map(|r| RateRow {
            rank: r
                .rank_by_open_interest
                .map(|rank| rank.to_string())
                .unwrap_or_default(),
            symbol: r.asset_symbol.clone(),
            timeframe: r.timeframe.to_string(),
            open_interest: format_open_interest(r.open_interest),
            native_rate: format_rate(r.native_funding_rate),
            sentiment: r
                .native_sentiment
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            venue_a_rate: format_rate(r.reference_funding_rate_a),
            venue_b_rate: format_rate(r.reference_funding_rate_b),
            spread_a: format_rate(r.spread_a()),
            spread_b: format_rate(r.spread_b()),
            favorited: if r.is_favorited { "*" } else { "" }.to_string(),
        })
        .collect()
}

fn build_arbitrage_rows(opportunities: &[ArbitrageOpportunity]) -> Vec<ArbitrageRow> {
    opportunities
        .iter()
        .map(|o| ArbitrageRow {
            symbol: o.asset_symbol.clone(),
            timeframe: o.timeframe.to_string(),
            venue: o.venue.clone(),
            native_rate: format_rate(o.native_rate),
            venue_rate: format_rate(o.venue_rate),
            spread: format_rate(Some(o.spread)),
        })
        .collect()
}

fn build_scrape_log_rows(logs: &[ScrapeLog]) -> Vec<ScrapeLogRow> {
    logs.iter()
        .map(|l| ScrapeLogRow {
            time: l.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            timeframe: l.timeframe.to_string(),
            status: l.status.to_string(),
            records: l.records_scraped,
            duration: format!("{:.1}s", l.duration_secs),
            arbitrage: l.arbitrage_opportunities,
            error: l.error_message.clone().unwrap_or_default(),
        })
        .collect()
}

fn build_stat_rows(stats: &ScrapeStats) -> Vec<StatRow> {
    vec![
        StatRow {
            metric: "Window",
            value: format!("{}h", stats.hours_back),
        },
        StatRow {
            metric: "Runs",
            value: stats.total_runs.to_string(),
        },
        StatRow {
            metric: "Successful",
            value: stats.successful.to_string(),
        },
        StatRow {
            metric: "Partial",
            value: stats.partial.to_string(),
        },
        StatRow {
            metric: "Failed",
            value: stats.failed.to_string(),
        },
        StatRow {
            metric: "Success Rate",
            value: format!("{:.1}%", stats.success_rate),
        },
        StatRow {
            metric: "Avg Duration",
            value: stats
                .avg_duration_secs
                .map(|d| format!("{:.1}s", d))
                .unwrap_or_else(|| "-".to_string()),
        },
        StatRow {
            metric: "Records",
            value: stats.total_records.to_string(),
        },
        StatRow {
            metric: "Last Run",
            value: stats
                .last_run_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".to_string()),
        },
    ]
}

// -- Rendering --

fn print_rows<T: Tabled + Serialize>(rows: Vec<T>, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Markdown => {
            let mut table = Table::new(rows);
            table.with(Style::markdown());
            println!("{}", table);
        }
        OutputFormat::Csv => write_csv(&rows, std::io::stdout())?,
        OutputFormat::Json => print_json(&rows),
    }
    Ok(())
}

fn write_csv<T: Serialize, W: std::io::Write>(rows: &[T], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// JSON output carries the records themselves; other formats use display rows.
pub fn print_rates(records: &[FundingRateRecord], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            print_json(&records);
            Ok(())
        }
        _ => print_rows(build_rate_rows(records), format),
    }
}

pub fn print_arbitrage(opportunities: &[ArbitrageOpportunity], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            print_json(&opportunities);
            Ok(())
        }
        _ => print_rows(build_arbitrage_rows(opportunities), format),
    }
}

pub fn print_scrape_logs(logs: &[ScrapeLog], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            print_json(&logs);
            Ok(())
        }
        _ => print_rows(build_scrape_log_rows(logs), format),
    }
}

pub fn print_stats(stats: &ScrapeStats, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            print_json(stats);
            Ok(())
        }
        _ => print_rows(build_stat_rows(stats), format),
    }
}

// -- JSON output --

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

fn format_open_interest(value: Option<Decimal>) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };
    let amount = value.to_f64().unwrap_or_default();
    if amount.abs() >= 1_000_000_000.0 {
        format!("${:.2}B", amount / 1_000_000_000.0)
    } else if amount.abs() >= 1_000_000.0 {
        format!("${:.1}M", amount / 1_000_000.0)
    } else if amount.abs() >= 1_000.0 {
        format!("${:.1}K", amount / 1_000.0)
    } else {
        format!("${}", value.round_dp(2))
    }
}

fn format_rate(value: Option<Decimal>) -> String {
    match value {
        Some(v) => format!("{}%", v),
        None => "-".to_string(),
    }
}
