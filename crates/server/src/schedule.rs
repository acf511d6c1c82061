use std::time::Duration;

use async_trait::async_trait;
use boshu_core::config::ScheduleConfig;
use boshu_core::schedule::{LookupError, ScheduleEntry, ScheduleResponse, ScheduleSource};
use reqwest::Client;
use tracing::{debug, warn};

/// Reads the league schedule endpoint: one GET per lookup, no retries.
pub struct HttpScheduleSource {
    client: Client,
    url: String,
}

impl HttpScheduleSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LookupError::Transport(error.to_string()))?;
        Ok(Self { client, url: url.into() })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, LookupError> {
        Self::new(config.url.clone(), Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl ScheduleSource for HttpScheduleSource {
    async fn fetch(&self) -> Result<Vec<ScheduleEntry>, LookupError> {
        let response = self.client.get(&self.url).send().await.map_err(|error| {
            if error.is_timeout() {
                LookupError::Timeout
            } else {
                LookupError::Transport(error.to_string())
            }
        })?;

        if !response.status().is_success() {
            warn!(
                event_name = "schedule.lookup.status",
                url = %self.url,
                status = %response.status(),
                "schedule endpoint returned an error status"
            );
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let payload: ScheduleResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                LookupError::Timeout
            } else {
                LookupError::Decode(error.to_string())
            }
        })?;
        debug!(
            event_name = "schedule.lookup.fetched",
            url = %self.url,
            entries = payload.result.len(),
            "schedule fetched"
        );
        Ok(payload.result)
    }
}
