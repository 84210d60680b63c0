//! WebDriver server readiness check (`GET /status`).

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::Error;

/// Readiness reported by a WebDriver server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverStatus {
    pub ready: bool,
    pub message: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    value: StatusValue,
}

#[derive(Deserialize)]
struct StatusValue {
    ready: bool,
    #[serde(default)]
    message: String,
}

/// Queries `{webdriver_url}/status`.
pub async fn driver_status(webdriver_url: &str) -> Result<DriverStatus, Error> {
    let url = Url::parse(&format!("{}/status", webdriver_url.trim_end_matches('/')))?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let resp: StatusResponse = client
        .get(url)
        .header("accept", "application/json")
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(DriverStatus {
        ready: resp.value.ready,
        message: resp.value.message,
    })
}
