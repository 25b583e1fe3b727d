//! Recipient directory
//!
//! Built once at startup from the configured chat ids and an optional JSON
//! subscriber file. Read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub chat_id: String,
    /// Forum-style group whose posts go to a thread
    #[serde(default)]
    pub topic_group: bool,
}

impl Recipient {
    pub fn direct(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            topic_group: false,
        }
    }
}

/// Subscriber file row: `{ "chat_id": "...", "symbols": ["BTCUSDT"] }`
#[derive(Debug, Clone, Deserialize)]
struct Subscriber {
    chat_id: String,
    #[serde(default)]
    symbols: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipientDirectory {
    recipients: Vec<Recipient>,
    /// Upper-cased symbol preferences; absent or empty means every symbol
    preferences: HashMap<String, Vec<String>>,
    /// Chats from the environment; subscriber rows never filter these
    configured: HashSet<String>,
    thread_id: Option<i64>,
}

impl RecipientDirectory {
    pub fn new(chat_ids: &[String], topic_group_id: Option<&str>, thread_id: Option<i64>) -> Self {
        let mut directory = Self {
            thread_id,
            ..Self::default()
        };
        for chat_id in chat_ids {
            directory.add_configured(chat_id);
        }
        if let Some(group) = topic_group_id {
            directory.add_configured(group);
            for r in directory.recipients.iter_mut().filter(|r| r.chat_id == group) {
                r.topic_group = true;
            }
        }
        directory
    }

    fn add_configured(&mut self, chat_id: &str) {
        let chat_id = chat_id.trim();
        if !chat_id.is_empty() {
            self.configured.insert(chat_id.to_string());
        }
        self.add(chat_id, Vec::new());
    }

    fn add(&mut self, chat_id: &str, symbols: Vec<String>) {
        let chat_id = chat_id.trim();
        if chat_id.is_empty() {
            return;
        }
        if !self.recipients.iter().any(|r| r.chat_id == chat_id) {
            self.recipients.push(Recipient::direct(chat_id));
        }
        if self.configured.contains(chat_id) {
            return;
        }
        let symbols: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
        if !symbols.is_empty() {
            self.preferences.insert(chat_id.to_string(), symbols);
        }
    }

    /// Merge subscribers from a JSON file. A missing file is not an error.
    pub fn load_subscribers(&mut self, path: &Path) -> anyhow::Result<usize> {
        if !path.exists() {
            info!("No subscriber file at {}", path.display());
            return Ok(0);
        }

        let raw = std::fs::read_to_string(path)?;
        let subscribers: Vec<Subscriber> = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid subscriber file {}: {}", path.display(), e))?;

        let count = subscribers.len();
        for sub in subscribers {
            self.add(&sub.chat_id, sub.symbols);
        }
        info!("Loaded {} subscribers from {}", count, path.display());
        Ok(count)
    }

    /// Builder-style variant that logs and keeps going on a bad file
    pub fn with_subscriber_file(mut self, path: Option<&Path>) -> Self {
        if let Some(path) = path {
            if let Err(e) = self.load_subscribers(path) {
                warn!("Ignoring subscriber file: {}", e);
            }
        }
        self
    }

    pub fn all(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn for_symbol(&self, symbol: &str) -> Vec<Recipient> {
        let symbol = symbol.to_uppercase();
        self.recipients
            .iter()
            .filter(|r| match self.preferences.get(&r.chat_id) {
                Some(symbols) => symbols.contains(&symbol),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub fn thread_hint(&self) -> Option<i64> {
        self.thread_id
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}
