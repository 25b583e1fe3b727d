//! Bounded, newest-first record of dispatched alerts

use crate::notify::DeliveryReceipt;
use crate::regime::Direction;
use chrono::{DateTime, Utc};
use market_data::Interval;
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertHistoryEntry {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub symbol: String,
    pub interval: Interval,
    pub signal: Direction,
    pub regime_text: String,
    pub price: f64,
    pub tangent: f64,
    pub dispatch_receipts: Vec<DeliveryReceipt>,
    pub annotation: Option<String>,
}

#[derive(Debug)]
pub struct AlertHistory {
    capacity: usize,
    entries: VecDeque<AlertHistoryEntry>,
}

impl Default for AlertHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AlertHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Insert at the front, evicting the oldest entry on overflow
    pub fn push(&mut self, entry: AlertHistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertHistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&AlertHistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Returns the updated entry, or `None` once it has been evicted
    pub fn annotate(&mut self, id: Uuid, text: impl Into<String>) -> Option<&AlertHistoryEntry> {
        let entry = self.entries.iter_mut().find(|e| e.id == id)?;
        entry.annotation = Some(text.into());
        Some(entry)
    }

    pub fn snapshot(&self) -> Vec<AlertHistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> AlertHistoryEntry {
        AlertHistoryEntry {
            id: Uuid::new_v4(),
            time: DateTime::from_timestamp(1_700_000_000 + n as i64, 0).unwrap(),
            symbol: format!("SYM{n}USDT"),
            interval: Interval::Hour1,
            signal: Direction::Long,
            regime_text: "LONG TERRAIN".to_string(),
            price: 1.0,
            tangent: 0.01,
            dispatch_receipts: Vec::new(),
            annotation: None,
        }
    }

    #[test]
    fn test_ring_buffer_keeps_newest_twenty() {
        let mut history = AlertHistory::default();
        for n in 1..=21 {
            history.push(entry(n));
        }

        assert_eq!(history.len(), 20);
        let first = history.iter().next().unwrap();
        assert_eq!(first.symbol, "SYM21USDT");
        let last = history.iter().last().unwrap();
        assert_eq!(last.symbol, "SYM2USDT");
    }

    #[test]
    fn test_annotate() {
        let mut history = AlertHistory::new(2);
        let old = entry(1);
        let old_id = old.id;
        history.push(old);
        let kept = entry(2);
        let kept_id = kept.id;
        history.push(kept);

        let updated = history.annotate(kept_id, "took it").unwrap();
        assert_eq!(updated.annotation.as_deref(), Some("took it"));

        history.push(entry(3));
        assert!(history.get(old_id).is_none());
        assert!(history.annotate(old_id, "late").is_none());
    }
}
