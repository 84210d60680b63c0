//! Funding-rate records and the enums they carry.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, SubsecRound, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregation window shown by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "8hours")]
    EightHours,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "year")]
    Year,
}

impl Timeframe {
    pub const ALL: [Timeframe; 5] = [
        Timeframe::Hourly,
        Timeframe::EightHours,
        Timeframe::Day,
        Timeframe::Week,
        Timeframe::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Hourly => "hourly",
            Timeframe::EightHours => "8hours",
            Timeframe::Day => "day",
            Timeframe::Week => "week",
            Timeframe::Year => "year",
        }
    }

    /// Label printed on the dashboard's timeframe control.
    pub fn ui_label(&self) -> &'static str {
        match self {
            Timeframe::Hourly => "1h",
            Timeframe::EightHours => "8h",
            Timeframe::Day => "1d",
            Timeframe::Week => "1w",
            Timeframe::Year => "1y",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown timeframe '{0}' (expected hourly, 8hours, day, week or year)")]
pub struct ParseTimeframeError(pub String);

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hourly" => Ok(Timeframe::Hourly),
            "8hours" => Ok(Timeframe::EightHours),
            "day" => Ok(Timeframe::Day),
            "week" => Ok(Timeframe::Week),
            "year" => Ok(Timeframe::Year),
            _ => Err(ParseTimeframeError(s.to_string())),
        }
    }
}

/// Coarse classification of the native funding cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    /// Sign of a value; zero is neutral.
    pub fn from_sign(value: Decimal) -> Self {
        if value.is_zero() {
            Sentiment::Neutral
        } else if value.is_sign_negative() {
            Sentiment::Negative
        } else {
            Sentiment::Positive
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment '{}'", other)),
        }
    }
}

fn ticker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z]{2,10}(-[A-Z]{2,10})?$").expect("ticker pattern is a valid regex")
    })
}

/// True when `text` looks like an asset ticker (`BTC`, `KPEPE`, `PURR-SPOT`).
pub fn is_ticker(text: &str) -> bool {
    ticker_pattern().is_match(text)
}

/// One observation of one asset for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRateRecord {
    pub asset_symbol: String,
    pub open_interest: Option<Decimal>,
    pub native_funding_rate: Option<Decimal>,
    pub native_sentiment: Option<Sentiment>,
    pub reference_funding_rate_a: Option<Decimal>,
    pub reference_funding_rate_b: Option<Decimal>,
    pub arbitrage_spread_a: Option<Decimal>,
    pub arbitrage_spread_b: Option<Decimal>,
    pub timeframe: Timeframe,
    pub rank_by_open_interest: Option<u32>,
    #[serde(default)]
    pub is_favorited: bool,
    pub observed_at: DateTime<Utc>,
}

impl FundingRateRecord {
    /// Creates a record with every optional field empty. `observed_at` is
    /// truncated to whole seconds, the granularity of the storage key.
    pub fn new(
        asset_symbol: impl Into<String>,
        timeframe: Timeframe,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            asset_symbol: asset_symbol.into(),
            open_interest: None,
            native_funding_rate: None,
            native_sentiment: None,
            reference_funding_rate_a: None,
            reference_funding_rate_b: None,
            arbitrage_spread_a: None,
            arbitrage_spread_b: None,
            timeframe,
            rank_by_open_interest: None,
            is_favorited: false,
            observed_at: observed_at.trunc_subsecs(0),
        }
    }

    /// A record is kept only when its symbol is a ticker. A missing native
    /// rate does not invalidate it.
    pub fn is_valid(&self) -> bool {
        !self.asset_symbol.is_empty() && is_ticker(&self.asset_symbol)
    }

    /// Spread against venue A: the scraped value, else native minus reference.
    pub fn spread_a(&self) -> Option<Decimal> {
        self.arbitrage_spread_a
            .or_else(|| derive_spread(self.native_funding_rate, self.reference_funding_rate_a))
    }

    /// Spread against venue B: the scraped value, else native minus reference.
    pub fn spread_b(&self) -> Option<Decimal> {
        self.arbitrage_spread_b
            .or_else(|| derive_spread(self.native_funding_rate, self.reference_funding_rate_b))
    }

    pub fn has_arbitrage_opportunity(&self, threshold: Decimal) -> bool {
        [self.spread_a(), self.spread_b()]
            .into_iter()
            .flatten()
            .any(|spread| spread.abs() > threshold)
    }
}

fn derive_spread(native: Option<Decimal>, reference: Option<Decimal>) -> Option<Decimal> {
    Some(native? - reference?)
}

/// Outcome of one scrape job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Partial,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(JobStatus::Success),
            "partial" => Ok(JobStatus::Partial),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Audit row written once per scrape job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeLog {
    pub status: JobStatus,
    pub timeframe: Timeframe,
    pub records_scraped: usize,
    pub duration_secs: f64,
    pub error_message: Option<String>,
    pub arbitrage_opportunities: usize,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn timeframe_round_trips_through_str() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn timeframe_rejects_unknown() {
        let err = "monthly".parse::<Timeframe>().unwrap_err();
        assert!(err.to_string().contains("monthly"));
    }

    #[test]
    fn timeframe_ui_labels() {
        let labels: Vec<&str> = Timeframe::ALL.iter().map(|t| t.ui_label()).collect();
        assert_eq!(labels, vec!["1h", "8h", "1d", "1w", "1y"]);
    }

    #[test]
    fn timeframe_serializes_as_wire_name() {
        let json = serde_json::to_string(&Timeframe::EightHours).unwrap();
        assert_eq!(json, "\"8hours\"");
    }

    #[test]
    fn ticker_pattern_accepts_plain_and_suffixed() {
        assert!(is_ticker("BTC"));
        assert!(is_ticker("KPEPE"));
        assert!(is_ticker("PURR-SPOT"));
    }

    #[test]
    fn ticker_pattern_rejects_lowercase_and_digits() {
        assert!(!is_ticker("btc"));
        assert!(!is_ticker("B"));
        assert!(!is_ticker("1INCH"));
        assert!(!is_ticker("BTC-"));
        assert!(!is_ticker("BTC 50x"));
    }

    #[test]
    fn new_truncates_subseconds() {
        let ts = at() + chrono::Duration::milliseconds(750);
        let record = FundingRateRecord::new("BTC", Timeframe::Hourly, ts);
        assert_eq!(record.observed_at, at());
    }

    #[test]
    fn missing_native_rate_is_still_valid() {
        let record = FundingRateRecord::new("ETH", Timeframe::Day, at());
        assert!(record.native_funding_rate.is_none());
        assert!(record.is_valid());
    }

    #[test]
    fn invalid_symbol_fails_validation() {
        assert!(!FundingRateRecord::new("", Timeframe::Day, at()).is_valid());
        assert!(!FundingRateRecord::new("eth", Timeframe::Day, at()).is_valid());
    }

    #[test]
    fn spread_prefers_scraped_value() {
        let mut record = FundingRateRecord::new("SOL", Timeframe::Hourly, at());
        record.native_funding_rate = Some(dec("0.0100"));
        record.reference_funding_rate_a = Some(dec("0.0040"));
        assert_eq!(record.spread_a(), Some(dec("0.0060")));

        record.arbitrage_spread_a = Some(dec("0.0070"));
        assert_eq!(record.spread_a(), Some(dec("0.0070")));
        assert_eq!(record.spread_b(), None);
    }

    #[test]
    fn arbitrage_opportunity_uses_absolute_spread() {
        let mut record = FundingRateRecord::new("SOL", Timeframe::Hourly, at());
        record.arbitrage_spread_b = Some(dec("-1.5"));
        assert!(record.has_arbitrage_opportunity(dec("1.0")));
        assert!(!record.has_arbitrage_opportunity(dec("2.0")));
    }

    #[test]
    fn record_serializes_decimals_as_strings() {
        let mut record = FundingRateRecord::new("BTC", Timeframe::EightHours, at());
        record.open_interest = Some(dec("1500000"));
        record.native_sentiment = Some(Sentiment::Positive);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["open_interest"], "1500000");
        assert_eq!(value["native_funding_rate"], serde_json::Value::Null);
        assert_eq!(value["native_sentiment"], "positive");
        assert_eq!(value["timeframe"], "8hours");
        assert_eq!(value["observed_at"], "2026-10-17T12:00:00Z");
    }

    #[test]
    fn sentiment_from_sign() {
        assert_eq!(Sentiment::from_sign(dec("0.01")), Sentiment::Positive);
        assert_eq!(Sentiment::from_sign(dec("-0.01")), Sentiment::Negative);
        assert_eq!(Sentiment::from_sign(dec("0.0000")), Sentiment::Neutral);
    }
}
