//! Momentum Monitor
//!
//! Polls klines for a set of symbols, derives a smoothed RSI momentum per
//! (symbol, interval), classifies it into a regime and alerts on terrain
//! setups, individually and as cross-symbol clusters.

pub mod api;
pub mod config;
pub mod dedup;
pub mod history;
pub mod indicators;
pub mod mood;
pub mod notify;
pub mod recipients;
pub mod regime;
pub mod runner;
pub mod state;
pub mod terrain;

pub use config::Settings;
pub use dedup::{AlertGate, SymbolKey};
pub use history::{AlertHistory, AlertHistoryEntry};
pub use indicators::{IndicatorError, IndicatorParams, MomentumReading};
pub use mood::MarketMood;
pub use notify::{DeliveryReceipt, LogNotifier, NotificationChannel, TelegramNotifier};
pub use recipients::{Recipient, RecipientDirectory};
pub use regime::{Classification, Curvature, Direction, Regime};
pub use runner::{CycleSummary, Monitor, ReportError};
pub use state::{EngineState, SharedState, SymbolState};
pub use terrain::{Clock, ManualClock, SystemClock};
