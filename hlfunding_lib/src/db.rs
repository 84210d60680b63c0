//! SQLite storage for funding-rate observations and scrape logs.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::record::{FundingRateRecord, JobStatus, ScrapeLog, Sentiment, Timeframe};

const SCHEMA_VERSION: i32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("date parse error: {0}")]
    Date(#[from] chrono::ParseError),
    #[error("decimal parse error: {0}")]
    Decimal(#[from] rust_decimal::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub struct Db {
    conn: Connection,
}

/// Timestamps are stored as second-precision RFC 3339 in UTC, which sorts
/// lexically.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, DbError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn fmt_dec(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

fn parse_dec(raw: Option<String>) -> Result<Option<Decimal>, DbError> {
    raw.map(|s| Decimal::from_str(&s)).transpose().map_err(DbError::from)
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<(), DbError> {
        let schema = include_str!("../../schema/sqlite.sql");
        self.conn.execute_batch(schema)?;

        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    /// Round-trips a trivial query.
    pub fn ping(&self) -> Result<(), DbError> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>, DbError> {
        self.conn
            .query_row(
                "SELECT value FROM ingest_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO ingest_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Upserts `records` keyed by (symbol, timeframe, observed_at), in batches
    /// of `batch_size` inside a single transaction. Invalid records are
    /// skipped. Returns the number of records written.
    pub fn upsert_funding_rates(
        &mut self,
        records: &[FundingRateRecord],
        batch_size: usize,
    ) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        let mut written = 0usize;
        let mut skipped = 0usize;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO funding_rates (
               asset_symbol,
               timeframe,
               observed_at,
               open_interest,
               native_funding_rate,
               native_sentiment,
               reference_funding_rate_a,
               reference_funding_rate_b,
               arbitrage_spread_a,
               arbitrage_spread_b,
               rank_by_open_interest,
               is_favorited
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(asset_symbol, timeframe, observed_at) DO UPDATE SET
               open_interest = excluded.open_interest,
               native_funding_rate = excluded.native_funding_rate,
               native_sentiment = excluded.native_sentiment,
               reference_funding_rate_a = excluded.reference_funding_rate_a,
               reference_funding_rate_b = excluded.reference_funding_rate_b,
               arbitrage_spread_a = excluded.arbitrage_spread_a,
               arbitrage_spread_b = excluded.arbitrage_spread_b,
               rank_by_open_interest = excluded.rank_by_open_interest,
               is_favorited = excluded.is_favorited",
            )?;

            for (batch_index, batch) in records.chunks(batch_size.max(1)).enumerate() {
                let mut batch_written = 0usize;
                for record in batch {
                    if !record.is_valid() {
                        skipped += 1;
                        continue;
                    }
                    stmt.execute(params![
                        record.asset_symbol,
                        record.timeframe.as_str(),
                        fmt_ts(record.observed_at),
                        fmt_dec(record.open_interest),
                        fmt_dec(record.native_funding_rate),
                        record.native_sentiment.map(|s| s.as_str()),
                        fmt_dec(record.reference_funding_rate_a),
                        fmt_dec(record.reference_funding_rate_b),
                        fmt_dec(record.arbitrage_spread_a),
                        fmt_dec(record.arbitrage_spread_b),
                        record.rank_by_open_interest,
                        record.is_favorited,
                    ])?;
                    batch_written += 1;
                }
                tracing::debug!("Batch {}: {} records written", batch_index + 1, batch_written);
                written += batch_written;
            }
        }

        tx.commit()?;
        if skipped > 0 {
            tracing::warn!("Skipped {} invalid records", skipped);
        }
        Ok(written)
    }

    /// Records from the most recent observation of `timeframe`, by rank.
    pub fn latest_funding_rates(
        &self,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<FundingRateRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT asset_symbol, timeframe, observed_at, open_interest, native_funding_rate,
                    native_sentiment, reference_funding_rate_a, reference_funding_rate_b,
                    arbitrage_spread_a, arbitrage_spread_b, rank_by_open_interest, is_favorited
             FROM funding_rates
             WHERE timeframe = ?1
               AND observed_at = (SELECT MAX(observed_at) FROM funding_rates WHERE timeframe = ?1)
             ORDER BY rank_by_open_interest IS NULL, rank_by_open_interest, asset_symbol
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![timeframe.as_str(), limit], |row| {
            Ok(StoredRate {
                asset_symbol: row.get(0)?,
                timeframe: row.get(1)?,
                observed_at: row.get(2)?,
                open_interest: row.get(3)?,
                native_funding_rate: row.get(4)?,
                native_sentiment: row.get(5)?,
                reference_funding_rate_a: row.get(6)?,
                reference_funding_rate_b: row.get(7)?,
                arbitrage_spread_a: row.get(8)?,
                arbitrage_spread_b: row.get(9)?,
                rank_by_open_interest: row.get(10)?,
                is_favorited: row.get(11)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    pub fn insert_scrape_log(&self, log: &ScrapeLog) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO scrape_logs (
               status, timeframe, records_scraped, duration_secs, error_message,
               arbitrage_opportunities, created_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                log.status.as_str(),
                log.timeframe.as_str(),
                i64::try_from(log.records_scraped).unwrap_or(i64::MAX),
                log.duration_secs,
                log.error_message,
                i64::try_from(log.arbitrage_opportunities).unwrap_or(i64::MAX),
                fmt_ts(log.created_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent scrape logs, newest first.
    pub fn recent_scrape_logs(&self, limit: usize) -> Result<Vec<ScrapeLog>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT status, timeframe, records_scraped, duration_secs, error_message,
                    arbitrage_opportunities, created_at
             FROM scrape_logs
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut logs = Vec::new();
        for row in rows {
            let (status, timeframe, records, duration, error, arbitrage, created_at) = row?;
            logs.push(ScrapeLog {
                status: JobStatus::from_str(&status).map_err(DbError::Corrupt)?,
                timeframe: Timeframe::from_str(&timeframe)
                    .map_err(|e| DbError::Corrupt(e.to_string()))?,
                records_scraped: usize::try_from(records).unwrap_or_default(),
                duration_secs: duration,
                error_message: error,
                arbitrage_opportunities: usize::try_from(arbitrage).unwrap_or_default(),
                created_at: parse_ts(&created_at)?,
            });
        }
        Ok(logs)
    }

    /// Aggregates scrape logs from the last `hours_back` hours.
    pub fn scrape_stats(&self, hours_back: u32) -> Result<ScrapeStats, DbError> {
        self.scrape_stats_since(Utc::now() - Duration::hours(i64::from(hours_back)), hours_back)
    }

    fn scrape_stats_since(
        &self,
        since: DateTime<Utc>,
        hours_back: u32,
    ) -> Result<ScrapeStats, DbError> {
        let (total, successful, partial, failed, avg_duration, total_records, last_run) =
            self.conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'success'), 0),
                        COALESCE(SUM(status = 'partial'), 0),
                        COALESCE(SUM(status = 'failed'), 0),
                        AVG(duration_secs),
                        COALESCE(SUM(records_scraped), 0),
                        MAX(created_at)
                 FROM scrape_logs
                 WHERE created_at >= ?1",
                params![fmt_ts(since)],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )?;

        let success_rate = if total > 0 {
            successful as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Ok(ScrapeStats {
            hours_back,
            total_runs: total,
            successful,
            partial,
            failed,
            success_rate,
            avg_duration_secs: avg_duration,
            total_records,
            last_run_at: last_run.as_deref().map(parse_ts).transpose()?,
        })
    }

    /// Deletes rates and scrape logs older than `days` days. Returns the
    /// number of rows removed.
    pub fn cleanup_old_data(&self, days: u32) -> Result<usize, DbError> {
        self.cleanup_older_than(Utc::now() - Duration::days(i64::from(days)))
    }

    pub fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let cutoff = fmt_ts(cutoff);
        let rates = self.conn.execute(
            "DELETE FROM funding_rates WHERE observed_at < ?1",
            params![cutoff],
        )?;
        let logs = self.conn.execute(
            "DELETE FROM scrape_logs WHERE created_at < ?1",
            params![cutoff],
        )?;
        tracing::info!(
            "Deleted {} funding rates and {} scrape logs older than {}",
            rates,
            logs,
            cutoff
        );
        Ok(rates + logs)
    }

    pub fn funding_rate_count(&self) -> Result<i64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(1) FROM funding_rates", [], |row| row.get(0))?;
        Ok(count)
    }
}

struct StoredRate {
    asset_symbol: String,
    timeframe: String,
    observed_at: String,
    open_interest: Option<String>,
    native_funding_rate: Option<String>,
    native_sentiment: Option<String>,
    reference_funding_rate_a: Option<String>,
    reference_funding_rate_b: Option<String>,
    arbitrage_spread_a: Option<String>,
    arbitrage_spread_b: Option<String>,
    rank_by_open_interest: Option<u32>,
    is_favorited: bool,
}

impl StoredRate {
    fn into_record(self) -> Result<FundingRateRecord, DbError> {
        let timeframe = Timeframe::from_str(&self.timeframe)
            .map_err(|e| DbError::Corrupt(e.to_string()))?;
        let native_sentiment = self
            .native_sentiment
            .as_deref()
            .map(Sentiment::from_str)
            .transpose()
            .map_err(DbError::Corrupt)?;
        Ok(FundingRateRecord {
            asset_symbol: self.asset_symbol,
            open_interest: parse_dec(self.open_interest)?,
            native_funding_rate: parse_dec(self.native_funding_rate)?,
            native_sentiment,
            reference_funding_rate_a: parse_dec(self.reference_funding_rate_a)?,
            reference_funding_rate_b: parse_dec(self.reference_funding_rate_b)?,
            arbitrage_spread_a: parse_dec(self.arbitrage_spread_a)?,
            arbitrage_spread_b: parse_dec(self.arbitrage_spread_b)?,
            timeframe,
            rank_by_open_interest: self.rank_by_open_interest,
            is_favorited: self.is_favorited,
            observed_at: parse_ts(&self.observed_at)?,
        })
    }
}

/// Scrape-log aggregates over a recent window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeStats {
    pub hours_back: u32,
    pub total_runs: i64,
    pub successful: i64,
    pub partial: i64,
    pub failed: i64,
    /// Percentage of runs that succeeded.
    pub success_rate: f64,
    pub avg_duration_secs: Option<f64>,
    pub total_records: i64,
    pub last_run_at: Option<DateTime<Utc>>,
}
