//! Error types for the browser session layer.

/// Errors that can occur while driving a browser session.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The WebDriver server refused or failed to create a session.
    #[error("Failed to start browser session: {0}")]
    SessionStart(String),
    /// A WebDriver command failed after the session was established.
    #[error("Browser command `{command}` failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
    /// An operation did not complete within its time budget.
    #[error("Timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },
    /// The WebDriver `/status` endpoint could not be queried.
    #[error("WebDriver status request failed")]
    Status(#[from] reqwest::Error),
    /// A configured URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Whether this error is a navigation or wait timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
