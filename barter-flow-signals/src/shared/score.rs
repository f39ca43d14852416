//! Gauge fusion into a composite bull/bear score.

use crate::shared::types::CompositeScore;
use serde::{Deserialize, Serialize};

/// Number of gauges fed into the score
pub const GAUGE_COUNT: usize = 8;
/// Default weights in gauge order:
/// confirm, warn, squeeze, fake, LaR, resilience, shock, momentum
pub const DEFAULT_WEIGHTS: [f64; GAUGE_COUNT] = [1.4, 1.2, 1.0, 1.0, 0.7, 0.7, 0.8, 0.6];
/// Default amplification applied before clamping
pub const DEFAULT_AMPLIFY: f64 = 1.5;

/// Identifies one gauge slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeKind {
    Confirm,
    Warn,
    Squeeze,
    Fake,
    Lar,
    Resilience,
    Shock,
    Momentum,
}

/// Latest signed gauge values, each nominally in [-1, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Gauges {
    pub confirm: f64,
    pub warn: f64,
    pub squeeze: f64,
    pub fake: f64,
    pub lar: f64,
    pub resilience: f64,
    pub shock: f64,
    pub momentum: f64,
}

impl Gauges {
    /// Gauge vector in fusion order
    pub fn to_raw(&self) -> [f64; GAUGE_COUNT] {
        [
            self.confirm,
            self.warn,
            self.squeeze,
            self.fake,
            self.lar,
            self.resilience,
            self.shock,
            self.momentum,
        ]
    }

    pub fn set(&mut self, kind: GaugeKind, value: f64) {
        let value = if value.is_finite() { value } else { 0.0 };
        match kind {
            GaugeKind::Confirm => self.confirm = value,
            GaugeKind::Warn => self.warn = value,
            GaugeKind::Squeeze => self.squeeze = value,
            GaugeKind::Fake => self.fake = value,
            GaugeKind::Lar => self.lar = value,
            GaugeKind::Resilience => self.resilience = value,
            GaugeKind::Shock => self.shock = value,
            GaugeKind::Momentum => self.momentum = value,
        }
    }

    /// Composite score with the default weights and amplification
    pub fn score(&self) -> CompositeScore {
        fuse(&self.to_raw(), &DEFAULT_WEIGHTS, DEFAULT_AMPLIFY)
    }
}

/// Fuse signed gauges into bull/bear percentages.
///
/// `bull = clamp(amplify * Σ max(0, raw_i) * w_i / Σw * 100, 0, 100)`, and
/// `bear` the same over `max(0, -raw_i)`.
pub fn fuse(
    raw: &[f64; GAUGE_COUNT],
    weights: &[f64; GAUGE_COUNT],
    amplify: f64,
) -> CompositeScore {
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum <= 0.0 || !weight_sum.is_finite() {
        return CompositeScore::default();
    }

    let (bull, bear) = raw
        .iter()
        .zip(weights.iter())
        .filter(|(r, _)| r.is_finite())
        .fold((0.0, 0.0), |(bull, bear), (r, w)| {
            (bull + r.max(0.0) * w, bear + (-r).max(0.0) * w)
        });

    let pct = |sum: f64| (amplify * sum / weight_sum * 100.0).clamp(0.0, 100.0);

    CompositeScore {
        bull_pct: pct(bull),
        bear_pct: pct(bear),
    }
}
