//! WebDriver-backed browser sessions (Chrome via chromedriver).

use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};

use crate::query::XPathQuery;
use crate::session::{BrowserSession, SessionConnector};
use crate::user_agent::get_user_agent;
use crate::Error;

/// Options used when starting a Chrome session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Address of the WebDriver server, e.g. `http://localhost:9515`.
    pub webdriver_url: String,
    /// Run Chrome without a visible window.
    pub headless: bool,
    /// Fixed user agent. A random desktop Chrome UA is used when `None`.
    pub user_agent: Option<String>,
    pub window_size: (u32, u32),
    /// Upper bound on a single navigation.
    pub page_load_timeout: Duration,
    /// Skip image downloads to speed up page loads.
    pub block_images: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            user_agent: None,
            window_size: (1920, 1080),
            page_load_timeout: Duration::from_secs(30),
            block_images: true,
        }
    }
}

impl SessionConfig {
    /// Builds the W3C capabilities object sent with the new-session request.
    pub fn capabilities(&self) -> Map<String, Value> {
        let user_agent = self
            .user_agent
            .clone()
            .unwrap_or_else(|| get_user_agent().to_string());

        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            format!("--window-size={},{}", self.window_size.0, self.window_size.1),
            format!("--user-agent={}", user_agent),
        ];
        if self.headless {
            args.insert(0, "--headless=new".to_string());
        }

        let mut chrome_options = json!({
            "args": args,
            "excludeSwitches": ["enable-automation"],
            "useAutomationExtension": false,
        });
        if self.block_images {
            chrome_options["prefs"] = json!({
                "profile.default_content_setting_values": { "images": 2 },
                "profile.managed_default_content_settings": { "images": 2 },
            });
        }

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), chrome_options);
        caps
    }
}

/// Starts Chrome sessions against a WebDriver server.
pub struct WebDriverConnector {
    config: SessionConfig,
}

impl WebDriverConnector {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[async_trait]
impl SessionConnector for WebDriverConnector {
    type Session = WebDriverSession;

    async fn connect(&self) -> Result<WebDriverSession, Error> {
        let client = ClientBuilder::native()
            .capabilities(self.config.capabilities())
            .connect(&self.config.webdriver_url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to start WebDriver session: {}", e);
                Error::SessionStart(e.to_string())
            })?;
        tracing::info!(
            "Browser session started (headless: {})",
            self.config.headless
        );
        Ok(WebDriverSession {
            client,
            page_load_timeout: self.config.page_load_timeout,
        })
    }
}

/// A live Chrome session.
pub struct WebDriverSession {
    client: Client,
    page_load_timeout: Duration,
}

fn command_error(command: &'static str) -> impl FnOnce(fantoccini::error::CmdError) -> Error {
    move |e| Error::Command {
        command,
        message: e.to_string(),
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    type Element = Element;

    async fn goto(&mut self, url: &str) -> Result<(), Error> {
        match tokio::time::timeout(self.page_load_timeout, self.client.goto(url)).await {
            Ok(result) => result.map_err(command_error("goto")),
            Err(_) => Err(Error::Timeout {
                what: format!("navigation to {}", url),
                seconds: self.page_load_timeout.as_secs(),
            }),
        }
    }

    async fn ready_state(&mut self) -> Result<String, Error> {
        let value = self
            .client
            .execute("return document.readyState", vec![])
            .await
            .map_err(command_error("execute"))?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find_all(&mut self, query: &XPathQuery) -> Result<Vec<Element>, Error> {
        self.client
            .find_all(Locator::XPath(query.xpath()))
            .await
            .map_err(command_error("find_all"))
    }

    async fn find_all_in(
        &mut self,
        parent: &Element,
        query: &XPathQuery,
    ) -> Result<Vec<Element>, Error> {
        parent
            .find_all(Locator::XPath(query.xpath()))
            .await
            .map_err(command_error("find_all"))
    }

    async fn click(&mut self, element: &Element) -> Result<(), Error> {
        let arg = serde_json::to_value(element).map_err(|e| Error::Command {
            command: "click",
            message: e.to_string(),
        })?;
        match self
            .client
            .execute("arguments[0].click();", vec![arg])
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::debug!("JavaScript click failed ({}), falling back to native click", e);
                element.click().await.map_err(command_error("click"))
            }
        }
    }

    async fn outer_html(&mut self, element: &Element) -> Result<String, Error> {
        element.html(false).await.map_err(command_error("html"))
    }

    async fn scroll_by(&mut self, pixels: i64) -> Result<(), Error> {
        self.client
            .execute(&format!("window.scrollBy(0, {});", pixels), vec![])
            .await
            .map(|_| ())
            .map_err(command_error("execute"))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, Error> {
        self.client
            .screenshot()
            .await
            .map_err(command_error("screenshot"))
    }

    async fn quit(self) -> Result<(), Error> {
        self.client.close().await.map_err(command_error("close"))?;
        tracing::debug!("Browser session closed");
        Ok(())
    }
}
