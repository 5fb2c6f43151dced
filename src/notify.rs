// src/notify.rs
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Outbound notification payload for the excluded messaging collaborator.
#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient: String,
    pub payload: Value,
}

impl Notification {
    pub fn new(recipient: impl Into<String>, payload: Value) -> Self {
        Self {
            recipient: recipient.into(),
            payload,
        }
    }
}

/// Delivery seam. Failures are the implementor's to report; callers treat
/// delivery as best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), String>;
}

/// Default sink that drops every notification.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _notification: Notification) -> Result<(), String> {
        Ok(())
    }
}

/// Deliver without blocking the caller. A failed delivery is logged and
/// forgotten — it must never roll back the financial transaction that
/// triggered it.
pub fn send_fire_and_forget(notifier: Arc<dyn Notifier>, notification: Notification) {
    tokio::spawn(async move {
        let recipient = notification.recipient.clone();
        if let Err(reason) = notifier.notify(notification).await {
            warn!(recipient = %recipient, reason = %reason, "notification delivery failed");
        }
    });
}
