//! Terrain tracking: a sliding one-hour window of symbols sitting in a
//! terrain regime, and the cooldown-gated consolidated alert built on it.

use crate::regime::Direction;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Mutex;

/// Quote assets stripped from symbols in consolidated messages, longest first
const QUOTE_ASSETS: [&str; 5] = ["FDUSD", "USDT", "USDC", "BUSD", "USD"];

/// Source of "now" for every time-window decision
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for deterministic time passage
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `BTCUSDT` → `BTC`
pub fn strip_quote_asset(symbol: &str) -> &str {
    QUOTE_ASSETS
        .iter()
        .find_map(|quote| {
            symbol
                .strip_suffix(quote)
                .filter(|base| !base.is_empty())
        })
        .unwrap_or(symbol)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerrainEntry {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
}

/// One entry list per direction; at most one entry per symbol in each
#[derive(Debug)]
pub struct TerrainTracker {
    window: Duration,
    long: Vec<TerrainEntry>,
    short: Vec<TerrainEntry>,
}

impl TerrainTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            long: Vec::new(),
            short: Vec::new(),
        }
    }

    fn list_mut(&mut self, direction: Direction) -> &mut Vec<TerrainEntry> {
        match direction {
            Direction::Long => &mut self.long,
            Direction::Short => &mut self.short,
        }
    }

    pub fn entries(&self, direction: Direction) -> &[TerrainEntry] {
        match direction {
            Direction::Long => &self.long,
            Direction::Short => &self.short,
        }
    }

    /// Upsert: refresh the timestamp of a known symbol, append otherwise
    pub fn register(&mut self, direction: Direction, symbol: &str, now: DateTime<Utc>) {
        let list = self.list_mut(direction);
        match list.iter_mut().find(|e| e.symbol == symbol) {
            Some(entry) => entry.timestamp = now,
            None => list.push(TerrainEntry {
                symbol: symbol.to_string(),
                timestamp: now,
            }),
        }
    }

    /// Drop entries older than the window, in both directions
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let window = self.window;
        let before = self.long.len() + self.short.len();
        self.long.retain(|e| now - e.timestamp <= window);
        self.short.retain(|e| now - e.timestamp <= window);
        before - (self.long.len() + self.short.len())
    }

    pub fn len(&self, direction: Direction) -> usize {
        self.entries(direction).len()
    }

    pub fn is_empty(&self) -> bool {
        self.long.is_empty() && self.short.is_empty()
    }

    pub fn members(&self, direction: Direction) -> Vec<String> {
        self.entries(direction)
            .iter()
            .map(|e| e.symbol.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedAlert {
    pub direction: Direction,
    /// Member symbols with the quote asset stripped
    pub members: Vec<String>,
    pub fired_at: DateTime<Utc>,
}

/// Fires one alert per direction when enough symbols share a terrain,
/// then holds that direction for `cooldown`.
#[derive(Debug)]
pub struct Consolidator {
    cooldown: Duration,
    min_members: usize,
    last_long: Option<DateTime<Utc>>,
    last_short: Option<DateTime<Utc>>,
}

impl Consolidator {
    pub fn new(cooldown: Duration, min_members: usize) -> Self {
        Self {
            cooldown,
            min_members,
            last_long: None,
            last_short: None,
        }
    }

    pub fn last_fired(&self, direction: Direction) -> Option<DateTime<Utc>> {
        match direction {
            Direction::Long => self.last_long,
            Direction::Short => self.last_short,
        }
    }

    fn cooled_down(&self, direction: Direction, now: DateTime<Utc>) -> bool {
        self.last_fired(direction)
            .map_or(true, |last| now - last > self.cooldown)
    }

    /// Members are left in the tracker after firing.
    pub fn check(&mut self, tracker: &TerrainTracker, now: DateTime<Utc>) -> Vec<ConsolidatedAlert> {
        let mut alerts = Vec::new();

        for direction in Direction::BOTH {
            if tracker.len(direction) < self.min_members || !self.cooled_down(direction, now) {
                continue;
            }

            let members = tracker
                .entries(direction)
                .iter()
                .map(|e| strip_quote_asset(&e.symbol).to_string())
                .collect();

            match direction {
                Direction::Long => self.last_long = Some(now),
                Direction::Short => self.last_short = Some(now),
            }

            alerts.push(ConsolidatedAlert {
                direction,
                members,
                fired_at: now,
            });
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn tracker() -> TerrainTracker {
        TerrainTracker::new(Duration::seconds(3600))
    }

    #[test]
    fn test_register_upserts() {
        let mut t = tracker();
        t.register(Direction::Long, "BTCUSDT", start());
        t.register(Direction::Long, "BTCUSDT", start() + Duration::minutes(5));
        t.register(Direction::Short, "BTCUSDT", start());

        assert_eq!(t.len(Direction::Long), 1);
        assert_eq!(t.entries(Direction::Long)[0].timestamp, start() + Duration::minutes(5));
        assert_eq!(t.len(Direction::Short), 1);
    }

    #[test]
    fn test_prune_drops_stale_entries() {
        let clock = ManualClock::new(start());
        let mut t = tracker();
        t.register(Direction::Long, "BTCUSDT", clock.now());
        clock.advance(Duration::minutes(30));
        t.register(Direction::Long, "ETHUSDT", clock.now());
        t.register(Direction::Short, "SOLUSDT", clock.now());

        clock.advance(Duration::minutes(30));
        assert_eq!(t.prune(clock.now()), 0, "exactly one hour old is kept");

        clock.advance(Duration::seconds(1));
        assert_eq!(t.prune(clock.now()), 1);
        assert_eq!(t.members(Direction::Long), vec!["ETHUSDT".to_string()]);

        clock.advance(Duration::hours(1));
        t.prune(clock.now());
        assert!(t.is_empty());
    }

    #[test]
    fn test_consolidation_fires_once_per_cooldown() {
        let clock = ManualClock::new(start());
        let mut t = tracker();
        let mut c = Consolidator::new(Duration::seconds(3600), 3);

        for sym in ["BTCUSDT", "ETHUSDT"] {
            t.register(Direction::Long, sym, clock.now());
        }
        assert!(c.check(&t, clock.now()).is_empty());

        t.register(Direction::Long, "SOLUSDT", clock.now());
        let fired = c.check(&t, clock.now());
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].direction, Direction::Long);
        assert_eq!(fired[0].members, vec!["BTC", "ETH", "SOL"]);

        // a fourth member inside the cooldown stays quiet
        clock.advance(Duration::minutes(20));
        t.register(Direction::Long, "ADAUSDT", clock.now());
        assert!(c.check(&t, clock.now()).is_empty());
        assert_eq!(t.len(Direction::Long), 4, "firing keeps members");

        // refresh everyone, then cross the cooldown
        clock.advance(Duration::minutes(40));
        for sym in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
            t.register(Direction::Long, sym, clock.now());
        }
        assert!(c.check(&t, clock.now()).is_empty(), "exactly one hour is still cooling");

        clock.advance(Duration::seconds(1));
        t.prune(clock.now());
        let fired = c.check(&t, clock.now());
        assert_eq!(fired.len(), 1);
        assert_eq!(c.last_fired(Direction::Long), Some(clock.now()));
        assert_eq!(c.last_fired(Direction::Short), None);
    }

    #[test]
    fn test_directions_are_independent() {
        let now = start();
        let mut t = tracker();
        let mut c = Consolidator::new(Duration::seconds(3600), 3);
        for sym in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
            t.register(Direction::Short, sym, now);
            t.register(Direction::Long, sym, now);
        }

        let fired = c.check(&t, now);
        let dirs: Vec<Direction> = fired.iter().map(|a| a.direction).collect();
        assert_eq!(dirs, vec![Direction::Long, Direction::Short]);
    }

    #[test]
    fn test_strip_quote_asset() {
        assert_eq!(strip_quote_asset("BTCUSDT"), "BTC");
        assert_eq!(strip_quote_asset("RENDERUSDT"), "RENDER");
        assert_eq!(strip_quote_asset("ETHFDUSD"), "ETH");
        assert_eq!(strip_quote_asset("USDT"), "USDT");
        assert_eq!(strip_quote_asset("ETHBTC"), "ETHBTC");
    }
}
