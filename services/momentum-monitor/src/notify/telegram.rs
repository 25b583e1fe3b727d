//! Telegram Bot API notifier

use super::{DeliveryReceipt, NotificationChannel};
use crate::recipients::Recipient;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 10,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<SentMessage>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Clone)]
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    async fn call(&self, method: &str, payload: serde_json::Value) -> anyhow::Result<ApiResponse> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Telegram {} returned {} with unreadable body: {}", method, status, e))?;

        if !status.is_success() || !body.ok {
            return Err(anyhow::anyhow!(
                "Telegram {} failed: {} - {}",
                method,
                status,
                body.description.as_deref().unwrap_or("no description")
            ));
        }

        Ok(body)
    }

    /// Send to a single chat
    pub async fn send_one(
        &self,
        text: &str,
        recipient: &Recipient,
        thread_hint: Option<i64>,
    ) -> anyhow::Result<DeliveryReceipt> {
        let mut payload = serde_json::json!({
            "chat_id": recipient.chat_id,
            "text": text,
        });
        // Topic groups reject untargeted posts to the general thread
        if recipient.topic_group {
            if let Some(thread_id) = thread_hint {
                payload["message_thread_id"] = serde_json::json!(thread_id);
            }
        }

        let body = self.call("sendMessage", payload).await?;
        let message_id = body
            .result
            .map(|m| m.message_id)
            .ok_or_else(|| anyhow::anyhow!("Telegram sendMessage returned no message"))?;

        debug!(chat_id = %recipient.chat_id, message_id, "Telegram message sent");
        Ok(DeliveryReceipt {
            recipient_id: recipient.chat_id.clone(),
            message_id,
        })
    }
}

#[async_trait::async_trait]
impl NotificationChannel for TelegramNotifier {
    async fn send(
        &self,
        text: &str,
        recipients: &[Recipient],
        thread_hint: Option<i64>,
    ) -> Vec<DeliveryReceipt> {
        let attempts = recipients
            .iter()
            .map(|recipient| self.send_one(text, recipient, thread_hint));

        join_all(attempts)
            .await
            .into_iter()
            .zip(recipients)
            .filter_map(|(result, recipient)| match result {
                Ok(receipt) => Some(receipt),
                Err(e) => {
                    error!(chat_id = %recipient.chat_id, "Failed to send Telegram message: {}", e);
                    None
                }
            })
            .collect()
    }

    async fn edit(&self, receipt: &DeliveryReceipt, text: &str) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "chat_id": receipt.recipient_id,
            "message_id": receipt.message_id,
            "text": text,
        });
        self.call("editMessageText", payload).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
