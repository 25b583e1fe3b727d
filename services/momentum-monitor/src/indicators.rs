//! Momentum indicator pipeline
//!
//! Closing prices → RSI → SMA of the RSI (smoothed momentum) → slope of the
//! last step (tangent) and a trailing-window curvature read.

use crate::regime::Curvature;
use serde::{Deserialize, Serialize};

/// Tunables for the pipeline. Every threshold is named so that revisions of
/// the smoothed-length floor do not hide as literals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub sma_period: usize,
    /// Minimum number of closes accepted as input
    pub min_closes: usize,
    /// Minimum RSI series length
    pub min_rsi_len: usize,
    /// Minimum smoothed-momentum series length
    pub min_smoothed_len: usize,
    /// Points inspected for curvature, taken just before the latest value
    pub curvature_window: usize,
    /// Share of same-direction steps needed to call a curvature
    pub curvature_ratio: f64,
    /// Decimal places each RSI value is rounded to before smoothing;
    /// `None` keeps full precision
    pub rsi_decimals: Option<u32>,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 20,
            sma_period: 20,
            min_closes: 50,
            min_rsi_len: 20,
            min_smoothed_len: 15,
            curvature_window: 10,
            curvature_ratio: 0.9,
            rsi_decimals: Some(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndicatorError {
    #[error("insufficient data for {stage}: need {needed}, got {got}")]
    InsufficientData {
        stage: &'static str,
        needed: usize,
        got: usize,
    },
}

/// Latest pipeline output for one symbol/interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MomentumReading {
    pub momentum: f64,
    pub tangent: f64,
    pub curvature: Curvature,
    pub price: f64,
}

/// Wilder RSI. Output has `closes.len() - period` points; empty when there
/// are not enough closes to seed the averages.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period_f;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period_f;

    let mut out = Vec::with_capacity(closes.len() - period);
    out.push(rsi_value(avg_gain, avg_loss));

    for change in &changes[period..] {
        avg_gain = (avg_gain * (period_f - 1.0) + change.max(0.0)) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + (-change).max(0.0)) / period_f;
        out.push(rsi_value(avg_gain, avg_loss));
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Last RSI value, if the series is long enough
pub fn latest_rsi(closes: &[f64], period: usize) -> Option<f64> {
    rsi(closes, period).last().copied()
}

/// Simple moving average; `values.len() - period + 1` points
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Curvature of the `window` points preceding the latest value.
pub fn classify_curvature(series: &[f64], window: usize, ratio: f64) -> Curvature {
    if window < 2 || series.len() < window + 1 {
        return Curvature::Neutral;
    }

    let end = series.len() - 1;
    let slice = &series[end - window..end];
    let transitions = (slice.len() - 1) as f64;

    let (ups, downs) = slice.windows(2).fold((0usize, 0usize), |(u, d), w| {
        if w[1] > w[0] {
            (u + 1, d)
        } else if w[1] < w[0] {
            (u, d + 1)
        } else {
            (u, d)
        }
    });

    if downs as f64 >= ratio * transitions {
        Curvature::Down
    } else if ups as f64 >= ratio * transitions {
        Curvature::Up
    } else {
        Curvature::Neutral
    }
}

/// Run the full pipeline over chronological closes.
pub fn compute(closes: &[f64], params: &IndicatorParams) -> Result<MomentumReading, IndicatorError> {
    if closes.len() < params.min_closes {
        return Err(IndicatorError::InsufficientData {
            stage: "closes",
            needed: params.min_closes,
            got: closes.len(),
        });
    }

    let mut rsi_series = rsi(closes, params.rsi_period);
    if let Some(decimals) = params.rsi_decimals {
        rsi_series.iter_mut().for_each(|v| *v = round_to(*v, decimals));
    }
    if rsi_series.len() < params.min_rsi_len {
        return Err(IndicatorError::InsufficientData {
            stage: "rsi",
            needed: params.min_rsi_len,
            got: rsi_series.len(),
        });
    }

    let smoothed = sma(&rsi_series, params.sma_period);
    // tangent needs two points, curvature needs the window plus the latest
    let needed = params
        .min_smoothed_len
        .max(params.curvature_window + 1)
        .max(2);
    if smoothed.len() < needed {
        return Err(IndicatorError::InsufficientData {
            stage: "smoothed momentum",
            needed,
            got: smoothed.len(),
        });
    }

    let last = smoothed.len() - 1;
    let price = *closes.last().ok_or(IndicatorError::InsufficientData {
        stage: "closes",
        needed: params.min_closes,
        got: 0,
    })?;

    Ok(MomentumReading {
        momentum: smoothed[last],
        tangent: smoothed[last] - smoothed[last - 1],
        curvature: classify_curvature(&smoothed, params.curvature_window, params.curvature_ratio),
        price,
    })
}
