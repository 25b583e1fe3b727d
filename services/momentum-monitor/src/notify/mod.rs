//! Outbound notifications: fan-out send and in-place edit

use crate::recipients::Recipient;
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod messages;
pub mod telegram;

pub use telegram::{TelegramConfig, TelegramNotifier};

/// Proof of one delivered message, enough to edit it later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub recipient_id: String,
    pub message_id: i64,
}

#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver `text` to every recipient. Failures are handled per recipient;
    /// the returned receipts cover only successful deliveries.
    async fn send(
        &self,
        text: &str,
        recipients: &[Recipient],
        thread_hint: Option<i64>,
    ) -> Vec<DeliveryReceipt>;

    /// Replace the text of an already delivered message
    async fn edit(&self, receipt: &DeliveryReceipt, text: &str) -> anyhow::Result<()>;

    fn name(&self) -> &str;
}

/// Channel used when no bot token is configured: messages only hit the log
pub struct LogNotifier;

#[async_trait::async_trait]
impl NotificationChannel for LogNotifier {
    async fn send(
        &self,
        text: &str,
        recipients: &[Recipient],
        _thread_hint: Option<i64>,
    ) -> Vec<DeliveryReceipt> {
        info!(recipients = recipients.len(), message = %text, "notification (log only)");
        Vec::new()
    }

    async fn edit(&self, receipt: &DeliveryReceipt, text: &str) -> anyhow::Result<()> {
        info!(
            recipient = %receipt.recipient_id,
            message_id = receipt.message_id,
            message = %text,
            "notification edit (log only)"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
