//! Aggregate market mood, recomputed from scratch every cycle

use crate::regime::{Direction, Regime};
use crate::terrain::strip_quote_asset;
use serde::{Serialize, Serializer};

/// Maximum |weight| a single symbol can contribute
const MAX_SYMBOL_WEIGHT: f64 = 10.0;

/// |angle| at which the euphoria label takes over
const EUPHORIA_ANGLE: f64 = 45.0;
/// |angle| at which the trend label takes over, and where the fire and
/// fade effects start
const TREND_ANGLE: f64 = 15.0;
const MAX_ANGLE: f64 = 90.0;

const NEUTRAL: Rgb = Rgb(156, 163, 175);
const GREEN: Rgb = Rgb(74, 222, 128);
const RED: Rgb = Rgb(248, 113, 113);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn blend(from: Rgb, to: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketMood {
    /// −90 (all long euphoria) … +90 (all short euphoria)
    pub angle: f64,
    pub color: Rgb,
    pub dominant_label: String,
    pub fire_intensity: f64,
    pub saturation: f64,
    pub opacity: f64,
    pub terrain_note: Option<String>,
}

impl Default for MarketMood {
    fn default() -> Self {
        score(&[], &[], &[])
    }
}

pub fn angle(weights: &[i32]) -> f64 {
    if weights.is_empty() {
        return 0.0;
    }
    let total: i32 = weights.iter().sum();
    let max = weights.len() as f64 * MAX_SYMBOL_WEIGHT;
    (total as f64 / max) * MAX_ANGLE
}

fn dominant(angle: f64, long_terrain: &[String], short_terrain: &[String]) -> (Regime, Option<String>) {
    if !long_terrain.is_empty() || !short_terrain.is_empty() {
        let (direction, members) = if long_terrain.len() >= short_terrain.len() {
            (Direction::Long, long_terrain)
        } else {
            (Direction::Short, short_terrain)
        };
        let names: Vec<&str> = members.iter().map(|s| strip_quote_asset(s)).collect();
        let note = format!(
            "{} in {} terrain: {}",
            members.len(),
            direction,
            names.join(", ")
        );
        return (Regime::terrain_of(direction), Some(note));
    }

    let direction = if angle < 0.0 {
        Direction::Long
    } else {
        Direction::Short
    };
    let regime = if angle.abs() >= EUPHORIA_ANGLE {
        Regime::euphoria(direction)
    } else if angle.abs() >= TREND_ANGLE {
        Regime::trend(direction)
    } else {
        Regime::Indecision
    };
    (regime, None)
}

/// Fold this cycle's regime weights and terrain members into a mood.
pub fn score(weights: &[i32], long_terrain: &[String], short_terrain: &[String]) -> MarketMood {
    let angle = angle(weights);
    let (regime, terrain_note) = dominant(angle, long_terrain, short_terrain);

    let fire_intensity = if angle <= -TREND_ANGLE {
        ((-angle - TREND_ANGLE) / (MAX_ANGLE - TREND_ANGLE)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let (saturation, opacity) = if angle >= TREND_ANGLE {
        let factor = ((angle - MAX_ANGLE) / (TREND_ANGLE - MAX_ANGLE)).clamp(0.0, 1.0);
        (factor, 0.4 + 0.6 * factor)
    } else {
        (1.0, 1.0)
    };

    let target = if angle < 0.0 { GREEN } else { RED };
    let color = Rgb::blend(NEUTRAL, target, (angle.abs() / MAX_ANGLE).min(1.0));

    MarketMood {
        angle,
        color,
        dominant_label: format!("{} {}", regime.emoji(), regime.label()),
        fire_intensity,
        saturation,
        opacity,
        terrain_note,
    }
}
