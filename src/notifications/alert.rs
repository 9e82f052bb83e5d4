use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;

use crate::config::AlertConfig;
use crate::models::TrackedItem;

/// Low-latency outward payload for a back-in-stock event, separate from the
/// durable Notification row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAlert {
    pub product_name: String,
    pub url: String,
    pub confidence: i64,
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers one alert; returns whether delivery succeeded. Failures are
    /// the caller's to log, never to propagate.
    async fn send(&self, alert: &StockAlert) -> bool;
}

/// Posts alerts to a configured webhook as a simple JSON message.
pub struct WebhookAlertSink {
    client: Client,
    webhook_url: String,
    username: String,
}

impl WebhookAlertSink {
    pub fn new(webhook_url: String, username: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
            username,
        }
    }

    fn payload(&self, alert: &StockAlert) -> serde_json::Value {
        json!({
            "username": self.username,
            "content": format!("🔔 Back in stock: {}", alert.product_name),
            "embeds": [{
                "title": alert.product_name,
                "url": alert.url,
                "fields": [{
                    "name": "Confidence",
                    "value": format!("{}%", alert.confidence),
                    "inline": true
                }],
                "timestamp": Utc::now().to_rfc3339(),
            }],
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn send(&self, alert: &StockAlert) -> bool {
        let payload = self.payload(alert);
        match self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(
                    "Alert webhook returned {} for {}",
                    response.status(),
                    alert.url
                );
                false
            }
            Err(e) => {
                tracing::warn!("Alert webhook request failed for {}: {}", alert.url, e);
                false
            }
        }
    }
}

/// Sink used when no webhook is configured. Alerts are dropped but reported
/// as delivered so the cooldown stamp still advances.
pub struct NullAlertSink;

#[async_trait]
impl AlertSink for NullAlertSink {
    async fn send(&self, alert: &StockAlert) -> bool {
        tracing::debug!("No alert sink configured, dropping alert for {}", alert.url);
        true
    }
}

pub fn sink_from_config(config: &AlertConfig) -> Box<dyn AlertSink> {
    match &config.webhook_url {
        Some(url) => Box::new(WebhookAlertSink::new(url.clone(), config.username.clone())),
        None => Box::new(NullAlertSink),
    }
}

/// Gate in front of the outward alert path. The durable Notification row is
/// written regardless; only the low-latency delivery is gated.
#[derive(Debug, Clone)]
pub struct AlertGate {
    min_confidence: i64,
    cooldown: Duration,
}

impl AlertGate {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            min_confidence: i64::from(config.min_confidence),
            cooldown: Duration::minutes(config.cooldown_minutes),
        }
    }

    /// `recent_alert_rows` is the count of back-in-stock notifications
    /// already persisted inside the cooldown window, queried before this
    /// cycle's rows are inserted. It backs up the timestamp check in case
    /// `last_alerted_at` was lost or clobbered.
    pub fn should_alert(
        &self,
        item: &TrackedItem,
        confidence: Option<i64>,
        recent_alert_rows: i64,
        now: DateTime<Utc>,
    ) -> bool {
        confidence.unwrap_or(0) >= self.min_confidence
            && item.alert_allowed(now, self.cooldown)
            && recent_alert_rows == 0
    }
}
