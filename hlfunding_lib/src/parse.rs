//! Display-text parsers for dashboard cells.
//!
//! Both parsers are total: malformed markup yields `None`, never an error.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Parses a currency amount such as `$1,234,567` or `$1.5M`.
///
/// `K`, `M` and `B` suffixes (any case) multiply the mantissa by one
/// thousand, million and billion.
pub fn parse_monetary(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    let (mantissa, multiplier) = match cleaned.chars().last()? {
        'K' | 'k' => (&cleaned[..cleaned.len() - 1], Decimal::from(1_000u32)),
        'M' | 'm' => (&cleaned[..cleaned.len() - 1], Decimal::from(1_000_000u32)),
        'B' | 'b' => (&cleaned[..cleaned.len() - 1], Decimal::from(1_000_000_000u32)),
        _ => (cleaned.as_str(), Decimal::ONE),
    };
    parse_decimal(mantissa)?.checked_mul(multiplier)
}

/// Parses a percentage such as `0.0125%`, `-0.0025%` or `(0.0010%)`.
///
/// Parentheses mark an accounting-style negative.
pub fn parse_percentage(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '%' && *c != ',')
        .collect();
    let cleaned = cleaned.trim();
    let (body, negative) = match cleaned
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (inner.trim(), true),
        None => (cleaned, false),
    };
    let value = parse_decimal(body)?;
    Some(if negative { -value } else { value })
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.strip_prefix('+').unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).ok()
}
