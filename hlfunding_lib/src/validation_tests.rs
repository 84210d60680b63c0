use super::*;
use chrono::{Duration, TimeZone};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
}

fn records(count: usize, with_rate: usize) -> Vec<FundingRateRecord> {
    (0..count)
        .map(|i| {
            let symbol = format!("C{}", ticker_suffix(i));
            let mut r = FundingRateRecord::new(symbol, Timeframe::Hourly, now());
            if i < with_rate {
                r.native_funding_rate = Some(Decimal::new(1, 4));
            }
            r
        })
        .collect()
}

/// Distinct uppercase suffix for index `i` (A, B, .., Z, BA, BB, ..).
fn ticker_suffix(mut i: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push((b'A' + (i % 26) as u8) as char);
        i /= 26;
        if i == 0 {
            break;
        }
    }
    out.iter().rev().collect()
}

// -- Timeframes --

#[test]
fn timeframes_all() {
    assert_eq!(validate_timeframes("all").unwrap(), Timeframe::ALL.to_vec());
    assert_eq!(validate_timeframes(" ALL ").unwrap().len(), 5);
}

#[test]
fn timeframes_list_dedupes_in_order() {
    assert_eq!(
        validate_timeframes("day, hourly,day").unwrap(),
        vec![Timeframe::Day, Timeframe::Hourly]
    );
}

#[test]
fn timeframes_single() {
    assert_eq!(validate_timeframes("8hours").unwrap(), vec![Timeframe::EightHours]);
}

#[test]
fn timeframes_unknown() {
    let err = validate_timeframes("hourly,monthly").unwrap_err();
    assert!(err.to_string().contains("monthly"));
}

#[test]
fn timeframes_empty() {
    assert!(validate_timeframes("").is_err());
    assert!(validate_timeframes(" , ").is_err());
}

// -- Numeric arguments --

#[test]
fn max_attempts_bounds() {
    assert_eq!(validate_max_attempts(1).unwrap(), 1);
    assert_eq!(validate_max_attempts(MAX_ATTEMPTS).unwrap(), MAX_ATTEMPTS);
    assert!(validate_max_attempts(0).is_err());
    assert!(validate_max_attempts(MAX_ATTEMPTS + 1).is_err());
}

#[test]
fn threshold_valid() {
    assert_eq!(validate_threshold("1.5").unwrap(), Decimal::new(15, 1));
}

#[test]
fn threshold_rejects_zero_negative_and_garbage() {
    assert!(validate_threshold("0").is_err());
    assert!(validate_threshold("-1").is_err());
    assert!(validate_threshold("abc").is_err());
}

#[test]
fn limit_days_hours_bounds() {
    assert!(validate_limit(0).is_err());
    assert_eq!(validate_limit(20).unwrap(), 20);
    assert!(validate_limit(MAX_LIMIT + 1).is_err());
    assert!(validate_days(0).is_err());
    assert_eq!(validate_days(30).unwrap(), 30);
    assert!(validate_hours(0).is_err());
    assert_eq!(validate_hours(24).unwrap(), 24);
    assert!(validate_hours(MAX_HOURS + 1).is_err());
}

// -- Data quality --

#[test]
fn quality_clean_set() {
    let report = check_quality(&records(60, 60), now());
    assert!(report.is_clean(), "{}", report.summary());
    assert_eq!(report.status(), JobStatus::Success);
}

#[test]
fn quality_empty_set() {
    let report = check_quality(&[], now());
    assert_eq!(report.issues, vec![QualityIssue::NoRecords]);
    assert_eq!(report.status(), JobStatus::Partial);
}

#[test]
fn quality_too_few_rows() {
    let report = check_quality(&records(10, 10), now());
    assert_eq!(
        report.issues,
        vec![QualityIssue::TooFewRows {
            found: 10,
            expected: MIN_EXPECTED_ROWS
        }]
    );
}

#[test]
fn quality_missing_native_rate_over_half() {
    let report = check_quality(&records(60, 29), now());
    assert!(report.issues.contains(&QualityIssue::MissingNativeRate {
        missing: 31,
        total: 60
    }));
}

#[test]
fn quality_missing_native_rate_exactly_half_is_fine() {
    let report = check_quality(&records(60, 30), now());
    assert!(report.is_clean());
}

#[test]
fn quality_duplicates() {
    let mut set = records(60, 60);
    set[1].asset_symbol = set[0].asset_symbol.clone();
    set[2].asset_symbol = set[0].asset_symbol.clone();
    let report = check_quality(&set, now());
    assert!(report
        .issues
        .contains(&QualityIssue::DuplicateSymbols { duplicates: 2 }));
}

#[test]
fn quality_stale() {
    let report = check_quality(&records(60, 60), now() + Duration::seconds(301));
    assert!(report.issues.contains(&QualityIssue::Stale { age_secs: 301 }));
}

#[test]
fn quality_invalid_records() {
    let mut set = records(60, 60);
    set[5].asset_symbol = "bad".to_string();
    let report = check_quality(&set, now());
    assert!(report.issues.contains(&QualityIssue::InvalidRecords {
        symbols: vec!["bad".to_string()]
    }));
    assert!(report.summary().contains("invalid records: bad"));
}
