//! Engine state: everything one polling cycle mutates and the query
//! surface reads.
//!
//! Constructed empty at startup and owned by the cycle task, which is the
//! only writer. Readers go through [`SharedState`] read locks and may see a
//! cycle half applied across symbols.

use crate::dedup::{AlertGate, SymbolKey};
use crate::history::{AlertHistory, AlertHistoryEntry, DEFAULT_CAPACITY};
use crate::indicators::MomentumReading;
use crate::mood::{self, MarketMood};
use crate::regime::{classify_with, Classification, Curvature, Direction, RegimeThresholds};
use crate::terrain::{ConsolidatedAlert, Consolidator, TerrainTracker};
use chrono::{DateTime, Duration, Utc};
use market_data::Interval;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub type SharedState = Arc<RwLock<EngineState>>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub thresholds: RegimeThresholds,
    pub terrain_window: Duration,
    pub cooldown: Duration,
    pub min_members: usize,
    pub history_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: RegimeThresholds::default(),
            terrain_window: Duration::seconds(3600),
            cooldown: Duration::seconds(3600),
            min_members: 3,
            history_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Display snapshot for one (symbol, interval), overwritten every cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolState {
    pub symbol: String,
    pub interval: Interval,
    pub last_dispatched_signal: Option<Direction>,
    pub last_candle_time: Option<DateTime<Utc>>,
    pub current_regime_text: String,
    pub current_regime_emoji: String,
    pub current_price: f64,
    pub momentum: f64,
    pub tangent: f64,
    pub curvature: Curvature,
    pub updated_at: DateTime<Utc>,
}

/// What one symbol contributed to the current cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleOutcome {
    pub classification: Classification,
    /// Set when the gate let a signal through; the caller dispatches it
    pub signal: Option<Direction>,
}

impl CycleOutcome {
    pub fn weight(&self) -> i32 {
        self.classification.weight
    }
}

#[derive(Debug)]
pub struct EngineState {
    thresholds: RegimeThresholds,
    symbols: BTreeMap<SymbolKey, SymbolState>,
    gate: AlertGate,
    terrain: TerrainTracker,
    consolidator: Consolidator,
    history: AlertHistory,
    mood: MarketMood,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl EngineState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            symbols: BTreeMap::new(),
            gate: AlertGate::new(),
            terrain: TerrainTracker::new(config.terrain_window),
            consolidator: Consolidator::new(config.cooldown, config.min_members),
            history: AlertHistory::new(config.history_capacity),
            mood: MarketMood::default(),
        }
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Classify → terrain register → gate → snapshot overwrite
    pub fn apply_reading(
        &mut self,
        key: &SymbolKey,
        reading: &MomentumReading,
        candle_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CycleOutcome {
        let classification = classify_with(reading.tangent, reading.curvature, &self.thresholds);

        if let Some(direction) = classification.terrain {
            self.terrain.register(direction, &key.symbol, now);
        }

        let signal = self
            .gate
            .check(key, classification.regime.signal(), candle_time);
        if let Some(direction) = signal {
            debug!(key = %key, signal = %direction, "signal passed gate");
        }

        let gate_state = self.gate.last(key);
        self.symbols.insert(
            key.clone(),
            SymbolState {
                symbol: key.symbol.clone(),
                interval: key.interval,
                last_dispatched_signal: gate_state.map(|g| g.signal),
                last_candle_time: gate_state.map(|g| g.candle_time),
                current_regime_text: classification.label.to_string(),
                current_regime_emoji: classification.emoji.to_string(),
                current_price: reading.price,
                momentum: reading.momentum,
                tangent: reading.tangent,
                curvature: reading.curvature,
                updated_at: now,
            },
        );

        CycleOutcome {
            classification,
            signal,
        }
    }

    /// Prune → mood → consolidation, once all symbols are processed
    pub fn finish_cycle(&mut self, weights: &[i32], now: DateTime<Utc>) -> Vec<ConsolidatedAlert> {
        let pruned = self.terrain.prune(now);
        if pruned > 0 {
            debug!("Pruned {} stale terrain entries", pruned);
        }

        self.mood = mood::score(
            weights,
            &self.terrain.members(Direction::Long),
            &self.terrain.members(Direction::Short),
        );

        let alerts = self.consolidator.check(&self.terrain, now);
        for alert in &alerts {
            info!(
                direction = %alert.direction,
                members = alert.members.len(),
                "Consolidated terrain alert"
            );
        }
        alerts
    }

    pub fn record_alert(&mut self, entry: AlertHistoryEntry) {
        self.history.push(entry);
    }

    pub fn symbols(&self) -> impl Iterator<Item = &SymbolState> {
        self.symbols.values()
    }

    pub fn symbol(&self, key: &SymbolKey) -> Option<&SymbolState> {
        self.symbols.get(key)
    }

    pub fn history(&self) -> &AlertHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut AlertHistory {
        &mut self.history
    }

    pub fn mood(&self) -> &MarketMood {
        &self.mood
    }

    pub fn terrain(&self) -> &TerrainTracker {
        &self.terrain
    }
}
