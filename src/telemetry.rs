//! Uploads run reports as JSON.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::report::RunReport;
use crate::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the telemetry endpoint.
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    http: reqwest::Client,
    url: String,
}

impl TelemetryClient {
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// Uses an already configured HTTP client.
    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POSTs `report` as `application/json`. Any non-2xx status is an error.
    pub async fn send(&self, report: &RunReport) -> Result<(), Error> {
        let response = self.http.post(&self.url).json(report).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::TelemetryStatus(status));
        }
        debug!(url = %self.url, %status, "report uploaded");
        Ok(())
    }
}

/// Sends `report` to `url` and returns whether it was accepted.
///
/// Telemetry never fails a run: client setup and upload errors are logged.
pub async fn upload_report(url: &str, report: &RunReport) -> bool {
    let client = match TelemetryClient::new(url) {
        Ok(client) => client,
        Err(e) => {
            warn!(url, error = %e, "telemetry client unavailable");
            return false;
        }
    };
    match client.send(report).await {
        Ok(()) => {
            info!(url, "report uploaded");
            true
        }
        Err(e) => {
            warn!(url, error = %e, "report upload failed");
            false
        }
    }
}
