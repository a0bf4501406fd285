//! Outbound user-facing messages. Delivery is best-effort: callers log
//! failures and never roll back persisted state because of them.

pub mod format;
pub mod webhook;

use std::future::Future;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::NotifyError;
use crate::types::{AlertPayload, CycleUpdate};

pub use webhook::WebhookNotifier;

pub trait Notifier: Send + Sync {
    fn send_alert(
        &self,
        alert: &AlertPayload,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;

    fn send_cycle_update(
        &self,
        update: &CycleUpdate,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Writes messages to the log only. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send_alert(&self, alert: &AlertPayload) -> Result<(), NotifyError> {
        warn!(
            event = "PRICE_ALERT",
            cycle = alert.cycle,
            price = alert.price,
            threshold = alert.threshold,
            "ALERT | oil price ${:.2} is below threshold ${:.2} (cycle {})",
            alert.price,
            alert.threshold,
            alert.cycle,
        );
        Ok(())
    }

    async fn send_cycle_update(&self, update: &CycleUpdate) -> Result<(), NotifyError> {
        info!(event = "CYCLE_UPDATE", cycle = update.cycle, "{}", format::cycle_line(update));
        Ok(())
    }
}

/// Notifier selected at startup.
pub enum AnyNotifier {
    Webhook(WebhookNotifier),
    Log(LogNotifier),
}

impl AnyNotifier {
    pub fn from_config(cfg: &Config) -> Result<Self, NotifyError> {
        match &cfg.webhook_url {
            Some(url) => Ok(AnyNotifier::Webhook(WebhookNotifier::new(
                url.clone(),
                cfg.user_id.clone(),
            )?)),
            None => {
                warn!("DISCORD_WEBHOOK_URL not set; alerts will only be logged");
                Ok(AnyNotifier::Log(LogNotifier))
            }
        }
    }
}

impl Notifier for AnyNotifier {
    async fn send_alert(&self, alert: &AlertPayload) -> Result<(), NotifyError> {
        match self {
            AnyNotifier::Webhook(n) => n.send_alert(alert).await,
            AnyNotifier::Log(n) => n.send_alert(alert).await,
        }
    }

    async fn send_cycle_update(&self, update: &CycleUpdate) -> Result<(), NotifyError> {
        match self {
            AnyNotifier::Webhook(n) => n.send_cycle_update(update).await,
            AnyNotifier::Log(n) => n.send_cycle_update(update).await,
        }
    }
}
