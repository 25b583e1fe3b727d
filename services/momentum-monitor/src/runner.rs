//! Monitor runner - the polling loop
//!
//! One cycle walks every tracked (symbol, interval) pair: fetch candles,
//! run the indicator pipeline, apply the reading to the engine state and
//! dispatch whatever passes the gate. After the last pair the terrain
//! window is pruned, the mood recomputed and consolidation checked.
//! The state write lock is only held for those in-memory steps.

use crate::config::Settings;
use crate::dedup::SymbolKey;
use crate::history::AlertHistoryEntry;
use crate::indicators::{self, IndicatorError, IndicatorParams, MomentumReading};
use crate::notify::{messages, NotificationChannel};
use crate::recipients::RecipientDirectory;
use crate::regime::{classify_with, Direction, RegimeThresholds};
use crate::state::{CycleOutcome, EngineState, SharedState};
use crate::terrain::Clock;
use chrono::{DateTime, Utc};
use market_data::{closes_f64, last_close_time, CandleSource, Interval, MarketDataError, SourceHealth};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// RSI period shown in manual reports
const REPORT_RSI_PERIOD: usize = 22;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("{0} {1} is not tracked")]
    Untracked(String, Interval),
    #[error("candle fetch failed: {0}")]
    Source(#[from] MarketDataError),
    #[error(transparent)]
    Indicator(#[from] IndicatorError),
    #[error("no candles returned")]
    Empty,
}

/// Counters for one cycle, logged at the end of it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub processed: usize,
    pub fetch_failures: usize,
    pub insufficient: usize,
    pub dispatched: usize,
    pub consolidated: usize,
}

pub struct Monitor {
    source: Arc<dyn CandleSource>,
    notifier: Arc<dyn NotificationChannel>,
    recipients: RecipientDirectory,
    clock: Arc<dyn Clock>,
    state: SharedState,
    pairs: Vec<SymbolKey>,
    params: IndicatorParams,
    thresholds: RegimeThresholds,
    terrain_window: chrono::Duration,
    candle_limit: usize,
    cycle_period: Duration,
    request_delay: Duration,
}

impl Monitor {
    pub fn new(
        settings: &Settings,
        source: Arc<dyn CandleSource>,
        notifier: Arc<dyn NotificationChannel>,
        recipients: RecipientDirectory,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = settings.engine_config();
        let pairs = settings
            .pairs()
            .into_iter()
            .map(|(symbol, interval)| SymbolKey::new(symbol, interval))
            .collect();

        Self {
            source,
            notifier,
            recipients,
            clock,
            state: EngineState::new(&engine).into_shared(),
            pairs,
            params: settings.indicator_params(),
            thresholds: engine.thresholds,
            terrain_window: engine.terrain_window,
            candle_limit: settings.candle_limit,
            cycle_period: settings.cycle_period(),
            request_delay: settings.request_delay(),
        }
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn pairs(&self) -> &[SymbolKey] {
        &self.pairs
    }

    pub async fn source_health(&self) -> SourceHealth {
        self.source.health().await
    }

    pub fn tracks(&self, symbol: &str, interval: Interval) -> bool {
        let key = SymbolKey::new(symbol, interval);
        self.pairs.contains(&key)
    }

    /// Run cycles forever. Cycles run inline, so an overrunning cycle
    /// swallows the ticks it missed instead of overlapping the next one.
    pub async fn run(self: Arc<Self>) {
        info!(
            "Monitor starting: {} pairs every {:?} via {} -> {}",
            self.pairs.len(),
            self.cycle_period,
            self.source.name(),
            self.notifier.name()
        );

        let mut ticker = interval(self.cycle_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let summary = self.run_cycle().await;
            info!(
                processed = summary.processed,
                fetch_failures = summary.fetch_failures,
                insufficient = summary.insufficient,
                dispatched = summary.dispatched,
                consolidated = summary.consolidated,
                "Cycle complete"
            );
        }
    }

    pub async fn run_cycle(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();
        let mut weights = Vec::with_capacity(self.pairs.len());

        for (i, key) in self.pairs.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                sleep(self.request_delay).await;
            }

            let (reading, candle_time) = match self.read(key).await {
                Ok(read) => read,
                Err(ReportError::Indicator(e)) => {
                    debug!(key = %key, "Skipping: {}", e);
                    summary.insufficient += 1;
                    continue;
                }
                Err(e) => {
                    warn!(key = %key, "Fetch failed, keeping previous state: {}", e);
                    summary.fetch_failures += 1;
                    continue;
                }
            };

            let now = self.clock.now();
            let outcome = self
                .state
                .write()
                .await
                .apply_reading(key, &reading, candle_time, now);
            weights.push(outcome.weight());
            summary.processed += 1;

            if let Some(signal) = outcome.signal {
                self.dispatch_signal(key, signal, &outcome, &reading, now).await;
                summary.dispatched += 1;
            }
        }

        let now = self.clock.now();
        let alerts = self.state.write().await.finish_cycle(&weights, now);
        for alert in &alerts {
            let text = messages::consolidated_alert(alert, self.terrain_window);
            self.notifier
                .send(&text, self.recipients.all(), self.recipients.thread_hint())
                .await;
        }
        summary.consolidated = alerts.len();

        summary
    }

    async fn read(&self, key: &SymbolKey) -> Result<(MomentumReading, DateTime<Utc>), ReportError> {
        let (closes, candle_time) = self.fetch_closes(key).await?;
        let reading = indicators::compute(&closes, &self.params)?;
        Ok((reading, candle_time))
    }

    async fn fetch_closes(&self, key: &SymbolKey) -> Result<(Vec<f64>, DateTime<Utc>), ReportError> {
        let candles = self
            .source
            .fetch_candles(&key.symbol, key.interval, self.candle_limit)
            .await?;
        let candle_time = last_close_time(&candles).ok_or(ReportError::Empty)?;
        Ok((closes_f64(&candles), candle_time))
    }

    async fn dispatch_signal(
        &self,
        key: &SymbolKey,
        signal: Direction,
        outcome: &CycleOutcome,
        reading: &MomentumReading,
        now: DateTime<Utc>,
    ) {
        let mut entry = AlertHistoryEntry {
            id: Uuid::new_v4(),
            time: now,
            symbol: key.symbol.clone(),
            interval: key.interval,
            signal,
            regime_text: outcome.classification.label.to_string(),
            price: reading.price,
            tangent: reading.tangent,
            dispatch_receipts: Vec::new(),
            annotation: None,
        };

        let text = messages::terrain_alert(&entry);
        let recipients = self.recipients.for_symbol(&key.symbol);
        entry.dispatch_receipts = self
            .notifier
            .send(&text, &recipients, self.recipients.thread_hint())
            .await;

        info!(
            key = %key,
            signal = %signal,
            delivered = entry.dispatch_receipts.len(),
            recipients = recipients.len(),
            "Terrain alert dispatched"
        );
        self.state.write().await.record_alert(entry);
    }

    /// On-demand report for one tracked pair, sent to every recipient.
    /// Does not touch the engine state.
    pub async fn manual_report(&self, symbol: &str, interval: Interval) -> Result<String, ReportError> {
        if !self.tracks(symbol, interval) {
            return Err(ReportError::Untracked(symbol.to_uppercase(), interval));
        }

        let key = SymbolKey::new(symbol, interval);
        let (closes, _) = self.fetch_closes(&key).await?;
        let reading = indicators::compute(&closes, &self.params)?;
        let rsi = indicators::latest_rsi(&closes, REPORT_RSI_PERIOD);
        let classification = classify_with(reading.tangent, reading.curvature, &self.thresholds);

        let text = messages::manual_report(&key.symbol, interval, &reading, rsi, &classification);
        self.notifier
            .send(&text, self.recipients.all(), self.recipients.thread_hint())
            .await;
        Ok(text)
    }

    /// Annotate a history entry and append the note to every delivered copy
    /// of its alert. Returns `None` when the entry is no longer in history.
    pub async fn annotate(&self, id: Uuid, note: &str) -> Option<AlertHistoryEntry> {
        let entry = self
            .state
            .write()
            .await
            .history_mut()
            .annotate(id, note)
            .cloned()?;

        let text = messages::with_annotation(&messages::terrain_alert(&entry), note);
        for receipt in &entry.dispatch_receipts {
            if let Err(e) = self.notifier.edit(receipt, &text).await {
                warn!(recipient = %receipt.recipient_id, "Failed to edit alert: {}", e);
            }
        }

        Some(entry)
    }
}
