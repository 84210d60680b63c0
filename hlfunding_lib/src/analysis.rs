//! Analysis helpers over a scraped record set: arbitrage detection, rankings
//! and summary statistics.
//!
//! All functions operate on slices of [`FundingRateRecord`] and do no I/O.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::record::{FundingRateRecord, Sentiment, Timeframe};
use crate::row::VenueNames;

/// A spread against one reference venue whose magnitude exceeds the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageOpportunity {
    pub asset_symbol: String,
    pub venue: String,
    pub native_rate: Option<Decimal>,
    pub venue_rate: Option<Decimal>,
    pub spread: Decimal,
    pub timeframe: Timeframe,
    pub observed_at: DateTime<Utc>,
}

/// Finds spreads with `|spread| > threshold`, largest magnitude first.
/// A record can yield one opportunity per venue.
pub fn find_arbitrage_opportunities(
    records: &[FundingRateRecord],
    threshold: Decimal,
    venues: &VenueNames,
) -> Vec<ArbitrageOpportunity> {
    let mut found = Vec::new();
    for record in records {
        let legs = [
            (&venues.a, record.spread_a(), record.reference_funding_rate_a),
            (&venues.b, record.spread_b(), record.reference_funding_rate_b),
        ];
        for (venue, spread, venue_rate) in legs {
            let Some(spread) = spread else { continue };
            if spread.abs() > threshold {
                found.push(ArbitrageOpportunity {
                    asset_symbol: record.asset_symbol.clone(),
                    venue: venue.clone(),
                    native_rate: record.native_funding_rate,
                    venue_rate,
                    spread,
                    timeframe: record.timeframe,
                    observed_at: record.observed_at,
                });
            }
        }
    }
    found.sort_by(|a, b| b.spread.abs().cmp(&a.spread.abs()));
    found
}

/// Groups records by native sentiment. Records without one are skipped.
pub fn records_by_sentiment(
    records: &[FundingRateRecord],
) -> HashMap<Sentiment, Vec<&FundingRateRecord>> {
    let mut map: HashMap<Sentiment, Vec<&FundingRateRecord>> = HashMap::new();
    for record in records {
        if let Some(sentiment) = record.native_sentiment {
            map.entry(sentiment).or_default().push(record);
        }
    }
    map
}

/// Records with the largest open interest, descending.
pub fn top_by_open_interest(records: &[FundingRateRecord], limit: usize) -> Vec<&FundingRateRecord> {
    let mut with_oi: Vec<&FundingRateRecord> = records
        .iter()
        .filter(|r| r.open_interest.is_some())
        .collect();
    with_oi.sort_by(|a, b| b.open_interest.cmp(&a.open_interest));
    with_oi.truncate(limit);
    with_oi
}

/// Highest positive native rates, descending.
pub fn top_positive_rates(records: &[FundingRateRecord], limit: usize) -> Vec<&FundingRateRecord> {
    let mut positive: Vec<&FundingRateRecord> = records
        .iter()
        .filter(|r| r.native_funding_rate.is_some_and(|v| v > Decimal::ZERO))
        .collect();
    positive.sort_by(|a, b| b.native_funding_rate.cmp(&a.native_funding_rate));
    positive.truncate(limit);
    positive
}

/// Most negative native rates, ascending.
pub fn top_negative_rates(records: &[FundingRateRecord], limit: usize) -> Vec<&FundingRateRecord> {
    let mut negative: Vec<&FundingRateRecord> = records
        .iter()
        .filter(|r| r.native_funding_rate.is_some_and(|v| v < Decimal::ZERO))
        .collect();
    negative.sort_by(|a, b| a.native_funding_rate.cmp(&b.native_funding_rate));
    negative.truncate(limit);
    negative
}

/// Summary of one record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotStats {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub favorited: usize,
    pub total_open_interest: Decimal,
    pub mean_rate: Option<f64>,
    pub median_rate: Option<f64>,
    pub min_rate: Option<f64>,
    pub max_rate: Option<f64>,
    pub std_dev_rate: Option<f64>,
    pub arbitrage_count: usize,
}

impl SnapshotStats {
    /// The most common sentiment; ties and empty sets are neutral.
    pub fn dominant_sentiment(&self) -> Sentiment {
        if self.positive > self.negative && self.positive > self.neutral {
            Sentiment::Positive
        } else if self.negative > self.positive && self.negative > self.neutral {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }
}

/// Counts, open-interest total and native-rate distribution of `records`.
pub fn snapshot_stats(records: &[FundingRateRecord], threshold: Decimal) -> SnapshotStats {
    let mut stats = SnapshotStats {
        total: records.len(),
        ..SnapshotStats::default()
    };

    for record in records {
        match record.native_sentiment {
            Some(Sentiment::Positive) => stats.positive += 1,
            Some(Sentiment::Negative) => stats.negative += 1,
            Some(Sentiment::Neutral) => stats.neutral += 1,
            None => {}
        }
        if record.is_favorited {
            stats.favorited += 1;
        }
        if let Some(oi) = record.open_interest {
            stats.total_open_interest += oi;
        }
        if record.has_arbitrage_opportunity(threshold) {
            stats.arbitrage_count += 1;
        }
    }

    let mut rates: Vec<f64> = records
        .iter()
        .filter_map(|r| r.native_funding_rate.and_then(|v| v.to_f64()))
        .collect();
    if rates.is_empty() {
        return stats;
    }
    rates.sort_by(|a, b| a.total_cmp(b));

    let n = rates.len() as f64;
    let mean = rates.iter().sum::<f64>() / n;
    let mid = rates.len() / 2;
    let median = if rates.len() % 2 == 0 {
        (rates[mid - 1] + rates[mid]) / 2.0
    } else {
        rates[mid]
    };
    let std_dev = if rates.len() > 1 {
        let variance = rates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some(variance.sqrt())
    } else {
        None
    };

    stats.mean_rate = Some(mean);
    stats.median_rate = Some(median);
    stats.min_rate = rates.first().copied();
    stats.max_rate = rates.last().copied();
    stats.std_dev_rate = std_dev;
    stats
}
