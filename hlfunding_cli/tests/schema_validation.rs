use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{TimeZone, Utc};
use hlfunding_lib::analysis::find_arbitrage_opportunities;
use hlfunding_lib::{FundingRateRecord, Sentiment, Timeframe, VenueNames};
use rust_decimal::Decimal;
use serde_json::Value;

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("CLI crate should be inside workspace")
        .to_path_buf()
}

fn load_schema(name: &str) -> Value {
    let path = workspace_root().join("schema").join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("read schema {}: {}", path.display(), e));
    serde_json::from_str(&text).expect("schema is valid JSON")
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn sample_records() -> Vec<FundingRateRecord> {
    let at = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();

    let mut btc = FundingRateRecord::new("BTC", Timeframe::Hourly, at);
    btc.rank_by_open_interest = Some(1);
    btc.open_interest = Some(dec("1500000"));
    btc.native_funding_rate = Some(dec("1.25"));
    btc.native_sentiment = Some(Sentiment::Positive);
    btc.reference_funding_rate_a = Some(dec("0.0100"));
    btc.arbitrage_spread_a = Some(dec("1.24"));

    let mut eth = FundingRateRecord::new("ETH", Timeframe::Hourly, at);
    eth.rank_by_open_interest = Some(2);
    eth.native_funding_rate = Some(dec("-0.0040"));
    eth.native_sentiment = Some(Sentiment::Negative);
    eth.is_favorited = true;

    let bare = FundingRateRecord::new("KPEPE", Timeframe::Hourly, at);

    vec![btc, eth, bare]
}

fn records_json() -> Value {
    serde_json::to_value(sample_records()).expect("records serialize")
}

// ---------------------------------------------------------------------------
// Positive validation: serialized output conforms to its schema
// ---------------------------------------------------------------------------

#[test]
fn test_funding_rates_conform_to_schema() {
    let schema = load_schema("funding_rate.schema.json");
    let data = records_json();

    let validator = jsonschema::draft202012::new(&schema).expect("funding rate schema compiles");
    let result = validator.validate(&data);
    if let Err(e) = &result {
        panic!("funding rates failed validation: {e}");
    }
}

#[test]
fn test_arbitrage_opportunities_conform_to_schema() {
    let opportunities =
        find_arbitrage_opportunities(&sample_records(), Decimal::ONE, &VenueNames::default());
    assert_eq!(opportunities.len(), 1);
    let data = serde_json::to_value(&opportunities).expect("opportunities serialize");
    let schema = load_schema("arbitrage.schema.json");

    let validator = jsonschema::draft202012::new(&schema).expect("arbitrage schema compiles");
    let result = validator.validate(&data);
    if let Err(e) = &result {
        panic!("arbitrage opportunities failed validation: {e}");
    }
}

#[test]
fn test_decimals_serialize_as_strings() {
    let data = records_json();
    assert_eq!(data[0]["open_interest"], Value::String("1500000".to_string()));
    assert_eq!(data[1]["native_funding_rate"], Value::String("-0.0040".to_string()));
    assert_eq!(data[2]["open_interest"], Value::Null);
}

// ---------------------------------------------------------------------------
// Negative validation: schemas reject invalid data
// ---------------------------------------------------------------------------

#[test]
fn test_funding_rate_schema_rejects_missing_required_field() {
    let mut data = records_json();
    data[0]
        .as_object_mut()
        .unwrap()
        .remove("observed_at");

    let schema = load_schema("funding_rate.schema.json");
    let validator = jsonschema::draft202012::new(&schema).expect("schema compiles");
    assert!(!validator.is_valid(&data));
}

#[test]
fn test_funding_rate_schema_rejects_unknown_timeframe() {
    let mut data = records_json();
    data[0]["timeframe"] = Value::String("monthly".to_string());

    let schema = load_schema("funding_rate.schema.json");
    let validator = jsonschema::draft202012::new(&schema).expect("schema compiles");
    assert!(!validator.is_valid(&data));
}

#[test]
fn test_funding_rate_schema_rejects_numeric_rate() {
    let mut data = records_json();
    data[0]["native_funding_rate"] = serde_json::json!(0.0125);

    let schema = load_schema("funding_rate.schema.json");
    let validator = jsonschema::draft202012::new(&schema).expect("schema compiles");
    assert!(!validator.is_valid(&data));
}

#[test]
fn test_funding_rate_schema_rejects_lowercase_symbol() {
    let mut data = records_json();
    data[1]["asset_symbol"] = Value::String("eth".to_string());

    let schema = load_schema("funding_rate.schema.json");
    let validator = jsonschema::draft202012::new(&schema).expect("schema compiles");
    assert!(!validator.is_valid(&data));
}
