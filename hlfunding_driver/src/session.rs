//! The browser session seam.
//!
//! Everything above this crate talks to a browser through these two traits.
//! [`crate::WebDriverConnector`] is the production implementation; tests
//! substitute in-memory sessions that serve canned HTML.

use async_trait::async_trait;

use crate::query::XPathQuery;
use crate::Error;

/// An exclusively-owned, live browser session driving one page.
#[async_trait]
pub trait BrowserSession: Send + Sized {
    /// Handle to an element on the current page.
    type Element: Send + Sync;

    /// Loads `url` in the current window.
    async fn goto(&mut self, url: &str) -> Result<(), Error>;

    /// Returns `document.readyState` for the current page.
    async fn ready_state(&mut self) -> Result<String, Error>;

    /// Finds all elements matching an absolute query.
    async fn find_all(&mut self, query: &XPathQuery) -> Result<Vec<Self::Element>, Error>;

    /// Finds all elements matching a query relative to `parent`.
    async fn find_all_in(
        &mut self,
        parent: &Self::Element,
        query: &XPathQuery,
    ) -> Result<Vec<Self::Element>, Error>;

    /// Clicks an element, going through JavaScript so overlays cannot
    /// intercept the click.
    async fn click(&mut self, element: &Self::Element) -> Result<(), Error>;

    /// Returns the element's outer HTML.
    async fn outer_html(&mut self, element: &Self::Element) -> Result<String, Error>;

    /// Scrolls the viewport vertically by `pixels` (negative scrolls up).
    async fn scroll_by(&mut self, pixels: i64) -> Result<(), Error>;

    /// Captures the viewport as PNG bytes.
    async fn screenshot(&mut self) -> Result<Vec<u8>, Error>;

    /// Ends the session. Consumes the handle so it cannot be reused.
    async fn quit(self) -> Result<(), Error>;
}

/// Creates browser sessions on demand.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    type Session: BrowserSession;

    /// Starts a new session.
    async fn connect(&self) -> Result<Self::Session, Error>;
}
