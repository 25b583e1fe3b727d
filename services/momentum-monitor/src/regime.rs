//! Regime classification from (tangent, curvature)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of the smoothed-momentum series over the trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Curvature {
    Up,
    Down,
    Neutral,
}

/// Trade direction a terrain regime points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Long, Direction::Short];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    LongEuphoria,
    LongTrend,
    ShortEuphoria,
    ShortTrend,
    LongTerrain,
    ShortTerrain,
    Indecision,
}

impl Regime {
    pub fn label(&self) -> &'static str {
        match self {
            Regime::LongEuphoria => "LONG EUPHORIA",
            Regime::LongTrend => "LONG TREND",
            Regime::ShortEuphoria => "SHORT EUPHORIA",
            Regime::ShortTrend => "SHORT TREND",
            Regime::LongTerrain => "LONG TERRAIN",
            Regime::ShortTerrain => "SHORT TERRAIN",
            Regime::Indecision => "INDECISION",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Regime::LongEuphoria => "🚀",
            Regime::LongTrend => "📈",
            Regime::ShortEuphoria => "💥",
            Regime::ShortTrend => "📉",
            Regime::LongTerrain => "🟢",
            Regime::ShortTerrain => "🔴",
            Regime::Indecision => "⚖️",
        }
    }

    /// Contribution to the market mood; negative leans long
    pub fn weight(&self) -> i32 {
        match self {
            Regime::LongEuphoria => -10,
            Regime::LongTrend => -5,
            Regime::ShortEuphoria => 10,
            Regime::ShortTrend => 5,
            Regime::LongTerrain | Regime::ShortTerrain | Regime::Indecision => 0,
        }
    }

    pub fn terrain(&self) -> Option<Direction> {
        match self {
            Regime::LongTerrain => Some(Direction::Long),
            Regime::ShortTerrain => Some(Direction::Short),
            _ => None,
        }
    }

    /// Dispatchable signal. Only terrain regimes alert; euphoria and trend
    /// regimes are display-only.
    pub fn signal(&self) -> Option<Direction> {
        self.terrain()
    }

    pub fn euphoria(direction: Direction) -> Self {
        match direction {
            Direction::Long => Regime::LongEuphoria,
            Direction::Short => Regime::ShortEuphoria,
        }
    }

    pub fn trend(direction: Direction) -> Self {
        match direction {
            Direction::Long => Regime::LongTrend,
            Direction::Short => Regime::ShortTrend,
        }
    }

    pub fn terrain_of(direction: Direction) -> Self {
        match direction {
            Direction::Long => Regime::LongTerrain,
            Direction::Short => Regime::ShortTerrain,
        }
    }
}

/// Tangent cut-offs for the decision list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    pub euphoria: f64,
    pub trend: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            euphoria: 1.0,
            trend: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub regime: Regime,
    pub label: &'static str,
    pub emoji: &'static str,
    pub weight: i32,
    pub terrain: Option<Direction>,
}

impl From<Regime> for Classification {
    fn from(regime: Regime) -> Self {
        Self {
            regime,
            label: regime.label(),
            emoji: regime.emoji(),
            weight: regime.weight(),
            terrain: regime.terrain(),
        }
    }
}

/// Ordered decision list; the first matching arm wins. Euphoria arms must
/// stay ahead of the trend arms whose ranges contain them.
pub fn classify_with(tangent: f64, curvature: Curvature, th: &RegimeThresholds) -> Classification {
    let flat = tangent >= -th.trend && tangent <= th.trend;

    let regime = match curvature {
        _ if tangent > th.euphoria => Regime::LongEuphoria,
        _ if tangent > th.trend => Regime::LongTrend,
        _ if tangent < -th.euphoria => Regime::ShortEuphoria,
        _ if tangent < -th.trend => Regime::ShortTrend,
        Curvature::Down if flat => Regime::LongTerrain,
        Curvature::Up if flat => Regime::ShortTerrain,
        _ => Regime::Indecision,
    };

    regime.into()
}

pub fn classify(tangent: f64, curvature: Curvature) -> Classification {
    classify_with(tangent, curvature, &RegimeThresholds::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_list_order() {
        let cases = [
            (1.5, Curvature::Down, Regime::LongEuphoria),
            (1.0, Curvature::Neutral, Regime::LongTrend),
            (0.11, Curvature::Up, Regime::LongTrend),
            (-1.01, Curvature::Down, Regime::ShortEuphoria),
            (-0.5, Curvature::Neutral, Regime::ShortTrend),
            (0.05, Curvature::Down, Regime::LongTerrain),
            (-0.10, Curvature::Up, Regime::ShortTerrain),
            (0.10, Curvature::Down, Regime::LongTerrain),
            (0.0, Curvature::Neutral, Regime::Indecision),
            (f64::NAN, Curvature::Down, Regime::Indecision),
        ];

        for (tangent, curvature, expected) in cases {
            assert_eq!(
                classify(tangent, curvature).regime,
                expected,
                "tangent={tangent} curvature={curvature:?}"
            );
        }
    }

    #[test]
    fn test_euphoria_is_not_a_signal() {
        let c = classify(1.5, Curvature::Neutral);
        assert_eq!(c.regime, Regime::LongEuphoria);
        assert_eq!(c.weight, -10);
        assert_eq!(c.terrain, None);
        assert_eq!(c.regime.signal(), None);
    }

    #[test]
    fn test_long_terrain_is_a_signal() {
        let c = classify(0.05, Curvature::Down);
        assert_eq!(c.regime, Regime::LongTerrain);
        assert_eq!(c.weight, 0);
        assert_eq!(c.terrain, Some(Direction::Long));
        assert_eq!(c.regime.signal(), Some(Direction::Long));
    }

    #[test]
    fn test_classify_is_pure() {
        for _ in 0..3 {
            assert_eq!(classify(-0.07, Curvature::Up), classify(-0.07, Curvature::Up));
        }
        assert_eq!(classify(-0.07, Curvature::Up).weight, 0);
        assert_eq!(classify(-3.0, Curvature::Up).weight, 10);
        assert_eq!(classify(-0.2, Curvature::Up).weight, 5);
    }
}
