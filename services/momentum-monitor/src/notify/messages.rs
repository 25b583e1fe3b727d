//! Message text for alerts and reports

use crate::history::AlertHistoryEntry;
use crate::indicators::MomentumReading;
use crate::regime::{Classification, Regime};
use crate::terrain::ConsolidatedAlert;
use chrono::Duration;
use market_data::Interval;

fn price(value: f64) -> String {
    if value >= 100.0 {
        format!("{:.2}", value)
    } else if value >= 1.0 {
        format!("{:.4}", value)
    } else {
        format!("{:.6}", value)
    }
}

/// Per-symbol terrain alert, rebuilt from the history entry so annotations
/// can edit it later
pub fn terrain_alert(entry: &AlertHistoryEntry) -> String {
    let regime = Regime::terrain_of(entry.signal);
    format!(
        "{} {}\n{} ({})\nPrice: {}\nTangent: {:+.4}\n{}",
        regime.emoji(),
        entry.regime_text,
        entry.symbol,
        entry.interval,
        price(entry.price),
        entry.tangent,
        entry.time.format("%Y-%m-%d %H:%M UTC"),
    )
}

/// "hour", "2 hours" or "45 min"
fn window_span(window: Duration) -> String {
    let minutes = window.num_minutes();
    match (minutes / 60, minutes % 60) {
        (1, 0) => "hour".to_string(),
        (hours, 0) if hours > 1 => format!("{} hours", hours),
        _ => format!("{} min", minutes),
    }
}

pub fn consolidated_alert(alert: &ConsolidatedAlert, window: Duration) -> String {
    let regime = Regime::terrain_of(alert.direction);
    format!(
        "{} {} CLUSTER\n{} symbols in {} terrain within the last {}:\n{}",
        regime.emoji(),
        regime.label(),
        alert.members.len(),
        alert.direction,
        window_span(window),
        alert.members.join(", "),
    )
}

pub fn manual_report(
    symbol: &str,
    interval: Interval,
    reading: &MomentumReading,
    rsi: Option<f64>,
    classification: &Classification,
) -> String {
    let rsi = rsi.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v));
    format!(
        "📊 {} ({})\nPrice: {}\nRSI(22): {}\nMomentum: {:.2}\nTangent: {:+.4}\nRegime: {} {}",
        symbol,
        interval,
        price(reading.price),
        rsi,
        reading.momentum,
        reading.tangent,
        classification.emoji,
        classification.label,
    )
}

pub fn with_annotation(text: &str, annotation: &str) -> String {
    format!("{}\n\n📝 {}", text, annotation)
}
