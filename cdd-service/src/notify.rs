//! Out-of-band alerts for refresh failures
//!
//! Alerts are posted as Slack-compatible incoming-webhook JSON
//! (`{"text": "..."}`). Without a configured webhook, alerts are only logged.

use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

const USER_AGENT: &str = concat!("cdd-service/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Webhook error {0}: {1}")]
    Webhook(u16, String),
}

pub struct AlertNotifier {
    http_client: reqwest::Client,
    webhook_url: Option<String>,
}

impl AlertNotifier {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            webhook_url: webhook_url.filter(|url| !url.trim().is_empty()),
        })
    }

    /// Notifier that only logs
    pub fn disabled() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            webhook_url: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Log and deliver an alert; delivery failures are logged, not returned
    pub async fn alert(&self, message: &str) {
        warn!(alert = true, "{}", message);
        if let Err(e) = self.send(message).await {
            error!("Failed to deliver alert: {}", e);
        }
    }

    /// Post `message` to the webhook (no-op when disabled)
    pub async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let Some(url) = &self.webhook_url else {
            return Ok(());
        };

        let response = self
            .http_client
            .post(url)
            .json(&json!({ "text": format!("[cdd-service] {}", message) }))
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Webhook(status.as_u16(), error_text));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_notifier_sends_nothing() {
        let notifier = AlertNotifier::disabled();
        assert!(!notifier.is_enabled());
        assert!(notifier.send("cache invalid").await.is_ok());
    }

    #[test]
    fn test_blank_webhook_disables() {
        let notifier =
            AlertNotifier::new(Some("  ".to_string()), Duration::from_secs(5)).unwrap();
        assert!(!notifier.is_enabled());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_network_error() {
        let notifier = AlertNotifier::new(
            Some("http://localhost:9/hooks".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(matches!(
            notifier.send("cache invalid").await,
            Err(NotifyError::Network(_))
        ));
        // alert() swallows the failure
        notifier.alert("cache invalid").await;
    }
}
