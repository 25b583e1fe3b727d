//! Per (symbol, interval) gate that keeps a signal from re-firing within
//! the same candle.

use crate::regime::Direction;
use chrono::{DateTime, Utc};
use market_data::Interval;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolKey {
    pub symbol: String,
    pub interval: Interval,
}

impl SymbolKey {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            interval,
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.symbol, self.interval)
    }
}

/// Last dispatched (signal, candle close time) for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateState {
    pub signal: Direction,
    pub candle_time: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct AlertGate {
    last: HashMap<SymbolKey, GateState>,
}

impl AlertGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the signal when it should be dispatched, `None` when there is
    /// no signal or the same signal already fired for this candle.
    pub fn check(
        &mut self,
        key: &SymbolKey,
        signal: Option<Direction>,
        candle_time: DateTime<Utc>,
    ) -> Option<Direction> {
        let signal = signal?;

        if let Some(prev) = self.last.get(key) {
            if prev.signal == signal && prev.candle_time == candle_time {
                return None;
            }
        }

        self.last.insert(key.clone(), GateState { signal, candle_time });
        Some(signal)
    }

    pub fn last(&self, key: &SymbolKey) -> Option<GateState> {
        self.last.get(key).copied()
    }
}
