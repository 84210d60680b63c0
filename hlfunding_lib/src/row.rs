//! Row extraction: one dashboard table row in, at most one record out.
//!
//! The dashboard exposes no stable column identifiers, so cells are assigned
//! to fields by content first and by position as a last resort:
//!
//! | cell text              | field                                         |
//! |------------------------|-----------------------------------------------|
//! | contains `$`           | `open_interest` (last match wins)             |
//! | `%`, index < 4         | `native_funding_rate` and `native_sentiment`  |
//! | `%`, names venue A     | `reference_funding_rate_a`                    |
//! | `%`, names venue B     | `reference_funding_rate_b`                    |
//! | `%`, index 4 / 5       | reference rate A / B                          |
//! | `%`, index 6 / 7       | arbitrage spread A / B                        |
//!
//! A row is read from its outer HTML into a [`RowSnapshot`] first, so the
//! extractor itself never touches the browser.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};

use crate::parse::{parse_monetary, parse_percentage};
use crate::record::{is_ticker, FundingRateRecord, Sentiment, Timeframe};

/// Rows with fewer cells are placeholders.
pub const MIN_CELLS: usize = 7;

/// Only the first few cells can hold the symbol.
const SYMBOL_CELLS: usize = 3;

/// Percentages before this index are the native venue's rate.
const NATIVE_COLUMNS: usize = 4;

/// An element inside a cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub tag: String,
    pub text: String,
    pub style: String,
    pub class: String,
}

/// One table cell with its attributes and descendant elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellSnapshot {
    pub text: String,
    pub style: String,
    pub class: String,
    pub descendants: Vec<NodeSnapshot>,
}

impl CellSnapshot {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSnapshot {
    pub cells: Vec<CellSnapshot>,
}

fn cell_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| {
        Selector::parse("td, div[role='cell']").expect("cell selector is valid CSS")
    })
}

/// Visible text with whitespace runs collapsed to single spaces.
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn attr(element: &ElementRef<'_>, name: &str) -> String {
    element.value().attr(name).unwrap_or_default().to_string()
}

impl RowSnapshot {
    /// Reads a row from its outer HTML (`<tr>` or `<div role="row">`).
    ///
    /// Markup that cannot be read yields a row with no cells, which the
    /// extractor rejects.
    pub fn from_html(html: &str) -> Self {
        // Table parts outside a table are dropped by the HTML parser.
        let trimmed = html.trim_start();
        let document = if trimmed.starts_with("<tr") || trimmed.starts_with("<TR") {
            Html::parse_fragment(&format!("<table><tbody>{}</tbody></table>", trimmed))
        } else {
            Html::parse_fragment(trimmed)
        };

        let cells = document
            .select(cell_selector())
            .map(|cell| CellSnapshot {
                text: element_text(&cell),
                style: attr(&cell, "style"),
                class: attr(&cell, "class"),
                descendants: cell
                    .descendants()
                    .skip(1)
                    .filter_map(ElementRef::wrap)
                    .map(|node| NodeSnapshot {
                        tag: node.value().name().to_lowercase(),
                        text: element_text(&node),
                        style: attr(&node, "style"),
                        class: attr(&node, "class"),
                    })
                    .collect(),
            })
            .collect();
        Self { cells }
    }
}

/// Names used to recognise the two reference venues in cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueNames {
    pub a: String,
    pub b: String,
}

impl VenueNames {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into().to_lowercase(),
            b: b.into().to_lowercase(),
        }
    }
}

impl Default for VenueNames {
    fn default() -> Self {
        Self::new("binance", "bybit")
    }
}

/// Turns row snapshots into records.
#[derive(Debug, Clone, Default)]
pub struct RowExtractor {
    venues: VenueNames,
}

impl RowExtractor {
    pub fn new(venues: VenueNames) -> Self {
        Self { venues }
    }

    pub fn venues(&self) -> &VenueNames {
        &self.venues
    }

    /// Extracts one record. `rank` is the 1-based row position.
    pub fn extract(
        &self,
        row: &RowSnapshot,
        timeframe: Timeframe,
        rank: u32,
        observed_at: DateTime<Utc>,
    ) -> Option<FundingRateRecord> {
        if row.cells.len() < MIN_CELLS {
            tracing::debug!("Row {} skipped: {} cells", rank, row.cells.len());
            return None;
        }

        let Some(symbol) = find_symbol(&row.cells) else {
            tracing::debug!("Row {} skipped: no asset symbol", rank);
            return None;
        };

        let mut record = FundingRateRecord::new(symbol, timeframe, observed_at);
        record.rank_by_open_interest = Some(rank);

        for (index, cell) in row.cells.iter().enumerate() {
            if has_active_favorite(cell) {
                record.is_favorited = true;
            }
            self.assign_cell(&mut record, index, cell);
        }

        if record.is_valid() {
            Some(record)
        } else {
            tracing::debug!("Row {} skipped: record failed validation", rank);
            None
        }
    }

    fn assign_cell(&self, record: &mut FundingRateRecord, index: usize, cell: &CellSnapshot) {
        let text = cell.text.trim();
        if text.is_empty() || text == "-" {
            return;
        }

        if text.contains('$') {
            if let Some(value) = parse_monetary(text) {
                record.open_interest = Some(value);
            }
            return;
        }

        if !text.contains('%') {
            return;
        }
        let parsed = parse_rate(text);

        if index < NATIVE_COLUMNS {
            // Styling still classifies a native cell whose value is unreadable.
            if parsed.is_some() {
                record.native_funding_rate = parsed;
            }
            record.native_sentiment = Some(derive_sentiment(&cell.style, &cell.class, parsed));
            return;
        }

        let Some(value) = parsed else {
            return;
        };
        let lowered = text.to_lowercase();
        if lowered.contains(&self.venues.a) {
            record.reference_funding_rate_a = Some(value);
        } else if lowered.contains(&self.venues.b) {
            record.reference_funding_rate_b = Some(value);
        } else {
            match index {
                4 => record.reference_funding_rate_a = Some(value),
                5 => record.reference_funding_rate_b = Some(value),
                6 => record.arbitrage_spread_a = Some(value),
                7 => record.arbitrage_spread_b = Some(value),
                _ => {}
            }
        }
    }
}

/// Parses a rate cell. Cells that label the venue (`Binance 0.0100%`) are
/// read from the token carrying the `%`.
fn parse_rate(text: &str) -> Option<Decimal> {
    parse_percentage(text).or_else(|| {
        text.split_whitespace()
            .rev()
            .find(|token| token.contains('%') && token.chars().any(|c| c.is_ascii_digit()))
            .and_then(parse_percentage)
    })
}

fn find_symbol(cells: &[CellSnapshot]) -> Option<String> {
    cells.iter().take(SYMBOL_CELLS).find_map(|cell| {
        let own = cell.text.trim();
        if is_ticker(own) {
            return Some(own.to_string());
        }
        first_ticker_token(own).or_else(|| {
            cell.descendants
                .iter()
                .find_map(|node| first_ticker_token(&node.text))
        })
    })
}

fn first_ticker_token(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|token| is_ticker(token))
        .map(str::to_string)
}

/// Sentiment of a native funding cell: explicit colour styling first, then
/// the sign of the parsed value, else neutral.
pub fn derive_sentiment(style: &str, class: &str, value: Option<Decimal>) -> Sentiment {
    let style = style.to_lowercase();
    let class = class.to_lowercase();
    if names_colour(&style, &class, "green") {
        return Sentiment::Positive;
    }
    if names_colour(&style, &class, "red") {
        return Sentiment::Negative;
    }
    value.map(Sentiment::from_sign).unwrap_or(Sentiment::Neutral)
}

/// Whether `colour` appears as a whole word in a colour declaration of
/// `style` or in a hyphenated class token such as `text-red-500`.
fn names_colour(style: &str, class: &str, colour: &str) -> bool {
    let in_style = style.split(';').any(|declaration| {
        let Some((property, value)) = declaration.split_once(':') else {
            return false;
        };
        property.trim().ends_with("color") && has_word(value, colour)
    });
    in_style || class.split_whitespace().any(|token| has_word(token, colour))
}

fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .any(|part| part == word)
}

fn has_active_favorite(cell: &CellSnapshot) -> bool {
    cell.descendants.iter().any(|node| {
        let class = node.class.to_lowercase();
        let icon_like = matches!(node.tag.as_str(), "svg" | "i")
            || (node.tag == "span" && (class.contains("star") || class.contains("favorite")));
        icon_like
            && (class.contains("star") || class.contains("favorite") || class.contains("heart"))
            && (class.contains("filled") || class.contains("active"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn row(texts: &[&str]) -> RowSnapshot {
        RowSnapshot {
            cells: texts.iter().map(|t| CellSnapshot::with_text(*t)).collect(),
        }
    }

    fn extract(row: &RowSnapshot) -> Option<FundingRateRecord> {
        RowExtractor::default().extract(row, Timeframe::Hourly, 1, at())
    }

    #[test]
    fn short_row_yields_none() {
        let r = row(&["BTC", "$1.5M", "0.0125%", "0.0100%", "0.0090%", "0.0025%"]);
        assert!(extract(&r).is_none());
    }

    #[test]
    fn row_without_ticker_yields_none() {
        let r = row(&[
            "1", "bitcoin", "$1.5M", "0.0125%", "0.0100%", "0.0090%", "0.0025%", "0.0035%",
        ]);
        assert!(extract(&r).is_none());
    }

    #[test]
    fn ticker_past_third_cell_is_ignored() {
        let r = row(&["1", "x", "y", "BTC", "0.0100%", "0.0090%", "0.0025%"]);
        assert!(extract(&r).is_none());
    }

    #[test]
    fn full_row_assigns_by_position() {
        let r = row(&[
            "1", "BTC", "$1.5M", "0.0125%", "0.0100%", "0.0090%", "0.0025%", "0.0035%",
        ]);
        let record = extract(&r).unwrap();
        assert_eq!(record.asset_symbol, "BTC");
        assert_eq!(record.open_interest, Some(dec("1500000")));
        assert_eq!(record.native_funding_rate, Some(dec("0.0125")));
        assert_eq!(record.native_sentiment, Some(Sentiment::Positive));
        assert_eq!(record.reference_funding_rate_a, Some(dec("0.0100")));
        assert_eq!(record.reference_funding_rate_b, Some(dec("0.0090")));
        assert_eq!(record.arbitrage_spread_a, Some(dec("0.0025")));
        assert_eq!(record.arbitrage_spread_b, Some(dec("0.0035")));
        assert_eq!(record.rank_by_open_interest, Some(1));
        assert_eq!(record.observed_at, at());
    }

    #[test]
    fn venue_name_wins_over_position() {
        let r = row(&[
            "ETH", "$900K", "-", "0.0100%", "Bybit 0.0200%", "Binance 0.0300%", "-",
        ]);
        let record = extract(&r).unwrap();
        assert_eq!(record.reference_funding_rate_a, Some(dec("0.0300")));
        assert_eq!(record.reference_funding_rate_b, Some(dec("0.0200")));
    }

    #[test]
    fn custom_venue_names() {
        let extractor = RowExtractor::new(VenueNames::new("OKX", "Deribit"));
        let r = row(&["SOL", "-", "-", "0.01%", "-", "-", "-", "deribit 0.02%"]);
        let record = extractor.extract(&r, Timeframe::Day, 3, at()).unwrap();
        assert_eq!(record.reference_funding_rate_b, Some(dec("0.02")));
        assert_eq!(record.arbitrage_spread_b, None);
    }

    #[test]
    fn unparseable_cells_leave_fields_empty() {
        let r = row(&["DOGE", "$abc", "n/a%", "-", "", "-", "-"]);
        let record = extract(&r).unwrap();
        assert_eq!(record.open_interest, None);
        assert_eq!(record.native_funding_rate, None);
        assert_eq!(record.native_sentiment, Some(Sentiment::Neutral));
    }

    #[test]
    fn unstyled_unreadable_native_rate_is_neutral() {
        let r = row(&["WIF", "$4M", "--%", "-", "-", "-", "-"]);
        let record = extract(&r).unwrap();
        assert_eq!(record.native_funding_rate, None);
        assert_eq!(record.native_sentiment, Some(Sentiment::Neutral));
    }

    #[test]
    fn styled_unreadable_native_rate_keeps_colour() {
        let mut r = row(&["DOGE", "$1M", "x", "-", "-", "-", "-"]);
        r.cells[2] = CellSnapshot {
            text: "n/a%".to_string(),
            style: "color: green".to_string(),
            ..CellSnapshot::default()
        };
        let record = extract(&r).unwrap();
        assert_eq!(record.native_funding_rate, None);
        assert_eq!(record.native_sentiment, Some(Sentiment::Positive));

        r.cells[2].style = String::new();
        r.cells[2].class = "text-red-400".to_string();
        assert_eq!(extract(&r).unwrap().native_sentiment, Some(Sentiment::Negative));
    }

    #[test]
    fn unreadable_reference_rate_stays_empty() {
        let r = row(&["BTC", "$1M", "0.01%", "-", "n/a%", "-", "-"]);
        let record = extract(&r).unwrap();
        assert_eq!(record.reference_funding_rate_a, None);
        assert_eq!(record.native_sentiment, Some(Sentiment::Positive));
    }

    #[test]
    fn last_monetary_cell_wins() {
        let r = row(&["BTC", "$1M", "$2M", "0.01%", "-", "-", "-"]);
        assert_eq!(extract(&r).unwrap().open_interest, Some(dec("2000000")));
    }

    #[test]
    fn sentiment_prefers_styling() {
        assert_eq!(
            derive_sentiment("color: Green", "", Some(dec("-0.01"))),
            Sentiment::Positive
        );
        assert_eq!(
            derive_sentiment("", "text-RED-500", Some(dec("0.01"))),
            Sentiment::Negative
        );
    }

    #[test]
    fn colour_words_inside_other_words_are_ignored() {
        assert_eq!(
            derive_sentiment("", "centered font-bold", Some(dec("0.01"))),
            Sentiment::Positive
        );
        assert_eq!(
            derive_sentiment("", "greenhouse-badge", Some(dec("-0.01"))),
            Sentiment::Negative
        );
        assert_eq!(
            derive_sentiment("text-align: center; border: 1px solid red", "", Some(dec("0.01"))),
            Sentiment::Positive
        );
        assert_eq!(
            derive_sentiment("background-color: red", "", Some(dec("0.01"))),
            Sentiment::Negative
        );
    }

    #[test]
    fn sentiment_falls_back_to_sign_then_neutral() {
        assert_eq!(derive_sentiment("", "", Some(dec("-0.0025"))), Sentiment::Negative);
        assert_eq!(derive_sentiment("", "", Some(dec("0.0025"))), Sentiment::Positive);
        assert_eq!(derive_sentiment("", "", Some(Decimal::ZERO)), Sentiment::Neutral);
        assert_eq!(derive_sentiment("", "", None), Sentiment::Neutral);
    }

    #[test]
    fn snapshot_from_table_row_html() {
        let html = r#"<tr class="row">
            <td>1</td>
            <td><div><span class="star-icon"></span><span>BTC</span><span class="badge">50x</span></div></td>
            <td>$1.5M</td>
            <td style="color: rgb(0, 200, 0)" class="text-green-500">0.0125%</td>
            <td>0.0100%</td><td>0.0090%</td><td>0.0025%</td><td>0.0035%</td>
        </tr>"#;
        let snapshot = RowSnapshot::from_html(html);
        assert_eq!(snapshot.cells.len(), 8);
        assert_eq!(snapshot.cells[1].text, "BTC 50x");
        assert_eq!(snapshot.cells[3].class, "text-green-500");

        let record = extract(&snapshot).unwrap();
        assert_eq!(record.asset_symbol, "BTC");
        assert_eq!(record.native_sentiment, Some(Sentiment::Positive));
        assert!(!record.is_favorited);
    }

    #[test]
    fn ticker_followed_by_leverage_badge() {
        let html = r#"<tr><td>1</td><td>BTC <span class="badge">50x</span></td><td>$1M</td>
            <td>0.01%</td><td>-</td><td>-</td><td>-</td></tr>"#;
        let snapshot = RowSnapshot::from_html(html);
        assert_eq!(snapshot.cells[1].text, "BTC 50x");
        assert_eq!(extract(&snapshot).unwrap().asset_symbol, "BTC");
    }

    #[test]
    fn ticker_in_nested_paragraph() {
        let html = r#"<tr><td><p>kPEPE or SOL perp</p></td><td>$1M</td><td>0.01%</td>
            <td>-</td><td>-</td><td>-</td><td>-</td></tr>"#;
        let record = extract(&RowSnapshot::from_html(html)).unwrap();
        assert_eq!(record.asset_symbol, "SOL");
    }

    #[test]
    fn snapshot_from_aria_grid_html() {
        let html = r#"<div role="row">
            <div role="cell"><a href="/asset/ETH">ETH</a></div>
            <div role="cell">$900K</div>
            <div role="cell" class="text-red">-0.0040%</div>
            <div role="cell">-</div><div role="cell">-</div>
            <div role="cell">-</div><div role="cell">-</div>
        </div>"#;
        let snapshot = RowSnapshot::from_html(html);
        assert_eq!(snapshot.cells.len(), 7);
        let record = extract(&snapshot).unwrap();
        assert_eq!(record.asset_symbol, "ETH");
        assert_eq!(record.native_funding_rate, Some(dec("-0.0040")));
        assert_eq!(record.native_sentiment, Some(Sentiment::Negative));
    }

    #[test]
    fn filled_star_marks_favorite() {
        let html = r#"<tr>
            <td><svg class="star-icon filled"></svg></td>
            <td>HYPE</td><td>$10M</td><td>0.01%</td>
            <td>-</td><td>-</td><td>-</td>
        </tr>"#;
        let record = extract(&RowSnapshot::from_html(html)).unwrap();
        assert!(record.is_favorited);
    }

    #[test]
    fn outline_star_is_not_favorite() {
        let html = r#"<tr>
            <td><i class="heart-icon"></i></td>
            <td>HYPE</td><td>$10M</td><td>0.01%</td>
            <td>-</td><td>-</td><td>-</td>
        </tr>"#;
        let record = extract(&RowSnapshot::from_html(html)).unwrap();
        assert!(!record.is_favorited);
    }

    #[test]
    fn malformed_html_yields_no_cells() {
        assert!(RowSnapshot::from_html("<<<>>>").cells.is_empty());
        assert!(extract(&RowSnapshot::from_html("")).is_none());
    }
}
