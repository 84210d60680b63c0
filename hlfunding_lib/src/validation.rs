//! Input validation for CLI arguments and data-quality checks for scraped
//! record sets.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::FundingError;
use crate::record::{FundingRateRecord, JobStatus, Timeframe};

pub const MAX_ATTEMPTS: u32 = 10;
pub const MAX_LIMIT: usize = 1000;
pub const MAX_DAYS: u32 = 3650;
pub const MAX_HOURS: u32 = 24 * 365;

/// A healthy dashboard lists at least this many assets.
pub const MIN_EXPECTED_ROWS: usize = 50;
/// Records older than this are stale.
pub const STALE_AFTER_SECS: i64 = 300;
/// Freshness is checked on this many leading records.
const FRESHNESS_SAMPLE: usize = 10;
/// Invalid symbols quoted in a quality issue.
const INVALID_SAMPLE: usize = 5;

/// Parse a timeframe list: `all`, or a comma-separated list of timeframe
/// names. Duplicates are dropped, order is kept.
pub fn validate_timeframes(input: &str) -> Result<Vec<Timeframe>, FundingError> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("all") {
        return Ok(Timeframe::ALL.to_vec());
    }
    let mut seen = HashSet::new();
    let mut timeframes = Vec::new();
    for part in trimmed.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let timeframe = Timeframe::from_str(part)
            .map_err(|e| FundingError::InvalidInput(e.to_string()))?;
        if seen.insert(timeframe) {
            timeframes.push(timeframe);
        }
    }
    if timeframes.is_empty() {
        return Err(FundingError::InvalidInput(
            "at least one timeframe is required".to_string(),
        ));
    }
    Ok(timeframes)
}

pub fn validate_max_attempts(attempts: u32) -> Result<u32, FundingError> {
    if !(1..=MAX_ATTEMPTS).contains(&attempts) {
        return Err(FundingError::InvalidInput(format!(
            "max attempts must be between 1 and {}",
            MAX_ATTEMPTS
        )));
    }
    Ok(attempts)
}

/// Parse an arbitrage threshold in percentage points; must be positive.
pub fn validate_threshold(input: &str) -> Result<Decimal, FundingError> {
    let value = Decimal::from_str(input.trim()).map_err(|_| {
        FundingError::InvalidInput(format!("invalid threshold '{}'", input))
    })?;
    if value <= Decimal::ZERO {
        return Err(FundingError::InvalidInput(
            "threshold must be greater than 0".to_string(),
        ));
    }
    Ok(value)
}

pub fn validate_limit(limit: usize) -> Result<usize, FundingError> {
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(FundingError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(limit)
}

pub fn validate_days(days: u32) -> Result<u32, FundingError> {
    if !(1..=MAX_DAYS).contains(&days) {
        return Err(FundingError::InvalidInput(format!(
            "days must be between 1 and {}",
            MAX_DAYS
        )));
    }
    Ok(days)
}

pub fn validate_hours(hours: u32) -> Result<u32, FundingError> {
    if !(1..=MAX_HOURS).contains(&hours) {
        return Err(FundingError::InvalidInput(format!(
            "hours must be between 1 and {}",
            MAX_HOURS
        )));
    }
    Ok(hours)
}

/// One problem found in a scraped record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityIssue {
    NoRecords,
    TooFewRows { found: usize, expected: usize },
    MissingNativeRate { missing: usize, total: usize },
    DuplicateSymbols { duplicates: usize },
    Stale { age_secs: i64 },
    InvalidRecords { symbols: Vec<String> },
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRecords => write!(f, "no records scraped"),
            Self::TooFewRows { found, expected } => {
                write!(f, "only {} assets found (expected at least {})", found, expected)
            }
            Self::MissingNativeRate { missing, total } => {
                write!(f, "missing native funding rate for {}/{} assets", missing, total)
            }
            Self::DuplicateSymbols { duplicates } => {
                write!(f, "{} duplicate asset symbols", duplicates)
            }
            Self::Stale { age_secs } => write!(f, "data is stale ({}s old)", age_secs),
            Self::InvalidRecords { symbols } => {
                write!(f, "invalid records: {}", symbols.join(", "))
            }
        }
    }
}

/// Outcome of [`check_quality`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityReport {
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// `Success` when clean, `Partial` otherwise.
    pub fn status(&self) -> JobStatus {
        if self.is_clean() {
            JobStatus::Success
        } else {
            JobStatus::Partial
        }
    }

    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Checks a record set for signs of a degraded scrape. Never fails; every
/// problem found is returned as an issue.
pub fn check_quality(records: &[FundingRateRecord], now: DateTime<Utc>) -> QualityReport {
    let mut issues = Vec::new();
    if records.is_empty() {
        issues.push(QualityIssue::NoRecords);
        return QualityReport { issues };
    }

    let total = records.len();
    if total < MIN_EXPECTED_ROWS {
        issues.push(QualityIssue::TooFewRows {
            found: total,
            expected: MIN_EXPECTED_ROWS,
        });
    }

    let missing = records
        .iter()
        .filter(|r| r.native_funding_rate.is_none())
        .count();
    if missing * 2 > total {
        issues.push(QualityIssue::MissingNativeRate { missing, total });
    }

    let unique: HashSet<&str> = records.iter().map(|r| r.asset_symbol.as_str()).collect();
    if unique.len() < total {
        issues.push(QualityIssue::DuplicateSymbols {
            duplicates: total - unique.len(),
        });
    }

    if let Some(age_secs) = records
        .iter()
        .take(FRESHNESS_SAMPLE)
        .map(|r| (now - r.observed_at).num_seconds())
        .find(|age| *age > STALE_AFTER_SECS)
    {
        issues.push(QualityIssue::Stale { age_secs });
    }

    let invalid: Vec<String> = records
        .iter()
        .filter(|r| !r.is_valid())
        .take(INVALID_SAMPLE)
        .map(|r| r.asset_symbol.clone())
        .collect();
    if !invalid.is_empty() {
        issues.push(QualityIssue::InvalidRecords { symbols: invalid });
    }

    let report = QualityReport { issues };
    if !report.is_clean() {
        tracing::warn!("Data quality issues: {}", report.summary());
    }
    report
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
