//! Monitor configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `momentum-monitor.{toml,yaml,json}` file, then `MONITOR_*` environment
//! variables. Telegram credentials and `PORT` come straight from the
//! environment.

use crate::indicators::IndicatorParams;
use crate::state::EngineConfig;
use chrono::Duration;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use market_data::Interval;
use serde::Deserialize;
use std::time::Duration as StdDuration;

pub const DEFAULT_SYMBOLS: [&str; 9] = [
    "BTCUSDT",
    "ETHUSDT",
    "SOLUSDT",
    "DOGEUSDT",
    "AVAXUSDT",
    "ADAUSDT",
    "RENDERUSDT",
    "NEARUSDT",
    "WLDUSDT",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub symbols: Vec<String>,
    pub intervals: Vec<Interval>,
    pub cycle_secs: u64,
    pub request_delay_ms: u64,
    pub candle_limit: usize,
    pub history_capacity: usize,
    pub terrain_window_secs: i64,
    pub cooldown_secs: i64,
    pub min_members: usize,
    pub min_smoothed_len: usize,
    pub binance_url: String,
    pub subscribers_file: Option<String>,
    pub port: u16,
    #[serde(skip)]
    pub telegram: TelegramSettings,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelegramSettings {
    pub token: Option<String>,
    pub chat_ids: Vec<String>,
    pub thread_id: Option<i64>,
    pub topic_group_id: Option<String>,
}

impl TelegramSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            token: non_empty("TELEGRAM_TOKEN"),
            chat_ids: non_empty("TELEGRAM_CHAT_ID")
                .map(|ids| {
                    ids.split(',')
                        .map(|id| id.trim().to_string())
                        .filter(|id| !id.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            thread_id: non_empty("TELEGRAM_THREAD_ID").and_then(|v| v.parse().ok()),
            topic_group_id: non_empty("TELEGRAM_TOPIC_GROUP_ID"),
        }
    }
}

/// Builder preloaded with every default
pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let symbols: Vec<String> = DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect();

    Config::builder()
        .set_default("symbols", symbols)?
        .set_default("intervals", vec!["1h".to_string(), "2h".to_string()])?
        .set_default("cycle_secs", 60)?
        .set_default("request_delay_ms", 250)?
        .set_default("candle_limit", 100)?
        .set_default("history_capacity", 20)?
        .set_default("terrain_window_secs", 3600)?
        .set_default("cooldown_secs", 3600)?
        .set_default("min_members", 3)?
        .set_default("min_smoothed_len", 15)?
        .set_default("binance_url", market_data::sources::binance::DEFAULT_BASE_URL)?
        .set_default("port", 3000)
}

impl Settings {
    /// Defaults, optional config file, `MONITOR_*` env, Telegram env
    pub fn new() -> Result<Self, ConfigError> {
        let builder = defaults()?
            .add_source(File::with_name("momentum-monitor").required(false))
            .add_source(
                Environment::with_prefix("MONITOR")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("symbols")
                    .with_list_parse_key("intervals"),
            );

        let builder = match std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            Some(port) => builder.set_override("port", i64::from(port))?,
            None => builder,
        };

        let mut settings = Self::from_builder(builder)?;
        settings.telegram = TelegramSettings::from_env();
        Ok(settings)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.symbols = settings
            .symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if settings.symbols.is_empty() || settings.intervals.is_empty() {
            return Err(ConfigError::Message(
                "at least one symbol and one interval must be configured".to_string(),
            ));
        }
        Ok(settings)
    }

    pub fn cycle_period(&self) -> StdDuration {
        StdDuration::from_secs(self.cycle_secs.max(1))
    }

    pub fn request_delay(&self) -> StdDuration {
        StdDuration::from_millis(self.request_delay_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            terrain_window: Duration::seconds(self.terrain_window_secs),
            cooldown: Duration::seconds(self.cooldown_secs),
            min_members: self.min_members,
            history_capacity: self.history_capacity,
            ..EngineConfig::default()
        }
    }

    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            min_smoothed_len: self.min_smoothed_len,
            ..IndicatorParams::default()
        }
    }

    /// Every (symbol, interval) pair the cycle polls, symbol-major
    pub fn pairs(&self) -> Vec<(String, Interval)> {
        self.symbols
            .iter()
            .flat_map(|s| self.intervals.iter().map(move |i| (s.clone(), *i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_builder(defaults().unwrap()).unwrap();

        assert_eq!(settings.symbols.len(), 9);
        assert_eq!(settings.symbols[0], "BTCUSDT");
        assert_eq!(settings.intervals, vec![Interval::Hour1, Interval::Hour2]);
        assert_eq!(settings.cycle_period(), StdDuration::from_secs(60));
        assert_eq!(settings.request_delay(), StdDuration::from_millis(250));
        assert_eq!(settings.candle_limit, 100);
        assert_eq!(settings.pairs().len(), 18);
        assert_eq!(settings.indicator_params().min_smoothed_len, 15);

        let engine = settings.engine_config();
        assert_eq!(engine.cooldown, Duration::hours(1));
        assert_eq!(engine.min_members, 3);
        assert_eq!(engine.terrain_window, Duration::hours(1));
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.telegram, TelegramSettings::default());
    }

    #[test]
    fn test_overrides() {
        let builder = defaults()
            .unwrap()
            .set_override("symbols", vec!["btcusdt".to_string()])
            .unwrap()
            .set_override("intervals", vec!["4h".to_string()])
            .unwrap()
            .set_override("min_smoothed_len", 20)
            .unwrap();
        let settings = Settings::from_builder(builder).unwrap();

        assert_eq!(settings.pairs(), vec![("BTCUSDT".to_string(), Interval::Hour4)]);
        assert_eq!(settings.indicator_params().min_smoothed_len, 20);
    }

    #[test]
    fn test_bad_interval_is_rejected() {
        let builder = defaults()
            .unwrap()
            .set_override("intervals", vec!["7h".to_string()])
            .unwrap();
        assert!(Settings::from_builder(builder).is_err());
    }

    #[test]
    fn test_telegram_from_lookup() {
        let telegram = TelegramSettings::from_lookup(|key| match key {
            "TELEGRAM_TOKEN" => Some("abc".to_string()),
            "TELEGRAM_CHAT_ID" => Some("1, 2,,3".to_string()),
            "TELEGRAM_THREAD_ID" => Some("42".to_string()),
            "TELEGRAM_TOPIC_GROUP_ID" => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(telegram.token.as_deref(), Some("abc"));
        assert_eq!(telegram.chat_ids, vec!["1", "2", "3"]);
        assert_eq!(telegram.thread_id, Some(42));
        assert_eq!(telegram.topic_group_id, None);
    }
}
