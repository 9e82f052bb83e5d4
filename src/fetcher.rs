//! Page retrieval behind a trait so the tracking service never cares where
//! markup comes from. The default implementation is a plain HTTP GET;
//! a rendering fetcher can be slotted in without touching callers.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;

use crate::Result;
use crate::config::FetcherConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Raw,
    Rendered,
}

/// Fetch failures are data, not errors: a check records the failed fetch
/// and moves on, so the fetcher only returns `Err` for programming errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub success: bool,
    pub markup: Option<String>,
    pub error: Option<String>,
    pub response_time_ms: u64,
    pub final_url: String, // After redirects
    pub mode: FetchMode,
}

impl FetchResult {
    fn failure(url: &str, error: String, started: Instant) -> Self {
        Self {
            success: false,
            markup: None,
            error: Some(error),
            response_time_ms: started.elapsed().as_millis() as u64,
            final_url: url.to_string(),
            mode: FetchMode::Raw,
        }
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResult>;
}

pub struct HttpFetcher {
    client: Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let started = Instant::now();

        // Transport errors are retried on a fixed interval; HTTP error
        // statuses are not, since they rarely resolve within a check.
        let strategy =
            FixedInterval::from_millis(self.config.retry_delay_ms).take(self.config.retry_attempts);
        let response = match Retry::spawn(strategy, || self.client.get(url).send()).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Fetch failed for {}: {}", url, e);
                return Ok(FetchResult::failure(url, format!("Request failed: {}", e), started));
            }
        };

        let final_url = response.url().to_string();
        let status = response.status();
        if !status.is_success() {
            return Ok(FetchResult {
                success: false,
                markup: None,
                error: Some(format!("HTTP {}", status)),
                response_time_ms: started.elapsed().as_millis() as u64,
                final_url,
                mode: FetchMode::Raw,
            });
        }

        let markup = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Ok(FetchResult::failure(url, format!("Body read failed: {}", e), started));
            }
        };

        Ok(FetchResult {
            success: true,
            markup: Some(markup),
            error: None,
            response_time_ms: started.elapsed().as_millis() as u64,
            final_url,
            mode: FetchMode::Raw,
        })
    }
}
