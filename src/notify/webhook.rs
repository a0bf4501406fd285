use std::time::Duration;

use tracing::info;

use crate::config::NOTIFY_TIMEOUT_SECS;
use crate::error::NotifyError;
use crate::notify::{format, Notifier};
use crate::types::{AlertPayload, CycleUpdate};

/// Posts to a Discord-compatible webhook, mentioning `user_id` on alerts.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    user_id: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: String, user_id: Option<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, url, user_id })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<(), NotifyError> {
        let resp = self.client.post(&self.url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    async fn send_alert(&self, alert: &AlertPayload) -> Result<(), NotifyError> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let body = format::alert_message(alert, self.user_id.as_deref(), &timestamp);
        self.post(&body).await?;
        info!(cycle = alert.cycle, "Alert sent for price ${:.2}", alert.price);
        Ok(())
    }

    async fn send_cycle_update(&self, update: &CycleUpdate) -> Result<(), NotifyError> {
        let body = format::cycle_message(update, self.user_id.as_deref());
        self.post(&body).await?;
        info!(
            cycle = update.cycle,
            pinged = update.alert && self.user_id.is_some(),
            "Sent cycle update: cycle {}, price ${:.2}",
            update.cycle,
            update.price,
        );
        Ok(())
    }
}
