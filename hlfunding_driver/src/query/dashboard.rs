//! Ordered fallback queries for the funding-rate dashboard.
//!
//! The dashboard has no stable element ids and has shipped both semantic
//! `<table>` markup and ARIA-role `div` grids. Every lookup is therefore an
//! ordered list of structural queries; callers try them in order and stop
//! at the first non-empty match.

use super::common::{xpath_literal, XPathQuery};

/// Queries for the clickable control that selects a timeframe, most specific
/// layout last.
pub fn timeframe_button_queries(label: &str) -> Vec<XPathQuery> {
    let lit = xpath_literal(label);
    vec![
        XPathQuery::new(
            "button-text",
            format!("//button[contains(text(), {})]", lit),
        ),
        XPathQuery::new(
            "timeframe-container",
            format!(
                "//div[contains(@class, 'timeframe')]//button[contains(text(), {})]",
                lit
            ),
        ),
        XPathQuery::new(
            "span-in-button",
            format!("//span[contains(text(), {})]/parent::button", lit),
        ),
        XPathQuery::new(
            "aria-label",
            format!("//button[contains(@aria-label, {})]", lit),
        ),
    ]
}

/// Queries for the data table container.
pub fn table_queries() -> Vec<XPathQuery> {
    vec![
        XPathQuery::new("table", "//table"),
        XPathQuery::new("table-class", "//div[contains(@class, 'table')]"),
        XPathQuery::new("aria-table", "//div[@role='table']"),
        XPathQuery::new("tbody", "//tbody"),
    ]
}

/// Queries for data rows, relative to the table container. A row matches
/// only when it holds data cells, which excludes header rows.
pub fn row_queries() -> Vec<XPathQuery> {
    vec![
        XPathQuery::new("tr", ".//tr[td]"),
        XPathQuery::new("aria-row", ".//div[@role='row'][div[@role='cell']]"),
        XPathQuery::new("tbody-tr", ".//tbody//tr[td]"),
    ]
}
