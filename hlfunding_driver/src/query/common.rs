//! Shared query infrastructure: the [`XPathQuery`] type and literal escaping.

use std::fmt;

/// A named XPath expression.
///
/// The name is what shows up in logs when a query in a fallback list
/// matches, so that layout drift on the dashboard is visible without
/// dumping the full expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XPathQuery {
    name: &'static str,
    xpath: String,
}

impl XPathQuery {
    /// Creates a query from a short name and an XPath expression.
    pub fn new(name: &'static str, xpath: impl Into<String>) -> Self {
        Self {
            name,
            xpath: xpath.into(),
        }
    }

    /// Short name used in log output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The XPath expression.
    pub fn xpath(&self) -> &str {
        &self.xpath
    }

    /// Whether the expression is evaluated relative to a context node.
    pub fn is_relative(&self) -> bool {
        self.xpath.starts_with('.')
    }
}

impl fmt::Display for XPathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.xpath)
    }
}

/// Quotes `value` as an XPath string literal.
///
/// XPath 1.0 has no escape sequences, so a value containing both quote
/// kinds is expressed with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}
