//! Signal engine: the state owned by the offloaded analytics worker.
//!
//! Holds the adaptive threshold engine, every pattern detector and the gauge
//! board. Purely synchronous so it can be driven directly in tests; the async
//! worker in [`crate::shared::worker`] wraps it.

use crate::shared::adaptive::{AdaptiveThresholdEngine, AdaptiveThresholds};
use crate::shared::config::FlowConfig;
use crate::shared::detectors::{
    ControlledMoveDetector, HiddenFlowDetector, IcebergStreakDetector, MomentumIgnitionDetector,
    SqueezeDetector,
};
use crate::shared::score::{GaugeKind, Gauges};
use crate::shared::types::{ClassifiedFlowEvent, CompositeScore, Side, SignalEvent, SignalKind};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one book snapshot, computed on the hot path
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct DepthSample {
    pub ts: DateTime<Utc>,
    /// Total resting notional, both sides
    pub depth: f64,
    /// (bid - ask) / (bid + ask)
    pub imbalance: f64,
}

/// Messages consumed by the analytics worker
#[derive(Debug, Clone)]
pub enum WorkerInput {
    /// A classified print
    Flow(ClassifiedFlowEvent),
    /// Raw trade notional and direction (one per trade)
    Trade {
        ts: DateTime<Utc>,
        side: Side,
        notional: f64,
    },
    /// Book depth summary
    Depth(DepthSample),
    /// Latest rolling bias value
    Confirmation { ts: DateTime<Utc>, value: f64 },
    /// Externally computed gauge
    Gauge { kind: GaugeKind, value: f64 },
}

/// Messages published by the analytics worker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkerOutput {
    Signal(SignalEvent),
    Adapt(AdaptiveThresholds),
    Score(CompositeScore),
}

#[derive(Debug, Clone)]
pub struct SignalEngine {
    adaptive: AdaptiveThresholdEngine,
    squeeze: SqueezeDetector,
    iceberg: IcebergStreakDetector,
    controlled: ControlledMoveDetector,
    hidden: HiddenFlowDetector,
    momentum: MomentumIgnitionDetector,
    gauges: Gauges,
    published_score: Option<CompositeScore>,
    extreme_imbalance: f64,
    squeeze_hold_ms: i64,
    last_depth: Option<DepthSample>,
    last_squeeze: Option<(f64, DateTime<Utc>)>,
}

impl SignalEngine {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            adaptive: AdaptiveThresholdEngine::new(config.notional_window, config.depth_window),
            squeeze: SqueezeDetector::new(config.squeeze),
            iceberg: IcebergStreakDetector::new(config.iceberg),
            controlled: ControlledMoveDetector::new(config.controlled),
            hidden: HiddenFlowDetector::new(config.hidden),
            momentum: MomentumIgnitionDetector::new(config.momentum),
            gauges: Gauges::default(),
            published_score: None,
            extreme_imbalance: config.extreme_imbalance,
            squeeze_hold_ms: config.squeeze.staleness_ms,
            last_depth: None,
            last_squeeze: None,
        }
    }

    pub fn thresholds(&self) -> AdaptiveThresholds {
        self.adaptive.thresholds()
    }

    pub fn gauges(&self) -> Gauges {
        self.gauges
    }

    /// Apply one input and return everything it produced, in order:
    /// adapt (if thresholds refreshed), signals, then the score (if it changed).
    pub fn handle(&mut self, input: WorkerInput, now: DateTime<Utc>) -> Vec<WorkerOutput> {
        let mut signals = Vec::new();

        match input {
            WorkerInput::Flow(event) => {
                signals.extend(self.squeeze.on_flow(&event));
                signals.extend(self.iceberg.on_flow(&event));
            }
            WorkerInput::Trade { ts, side, notional } => {
                self.adaptive.push_trade_notional(notional);
                let threshold = self.adaptive.thresholds().momentum_count_threshold;
                signals.extend(self.momentum.push(side, ts, threshold));
            }
            WorkerInput::Depth(sample) => {
                signals.extend(self.on_depth(sample));
            }
            WorkerInput::Confirmation { ts, value } => {
                self.gauges.set(GaugeKind::Confirm, value);
                signals.extend(self.hidden.push(value, ts));
            }
            WorkerInput::Gauge { kind, value } => {
                self.gauges.set(kind, value);
            }
        }

        for signal in &signals {
            if signal.kind == SignalKind::Squeeze {
                self.last_squeeze = Some((signal.signed_strength(), signal.ts));
            }
        }
        self.update_squeeze_gauge(now);
        self.update_momentum_gauge(now);

        let mut outputs = Vec::with_capacity(signals.len() + 2);
        if self.adaptive.refresh(now) {
            outputs.push(WorkerOutput::Adapt(self.adaptive.thresholds()));
        }
        outputs.extend(signals.into_iter().map(WorkerOutput::Signal));

        let score = self.gauges.score();
        if self.published_score != Some(score) {
            self.published_score = Some(score);
            outputs.push(WorkerOutput::Score(score));
        }
        outputs
    }

    fn on_depth(&mut self, sample: DepthSample) -> Vec<SignalEvent> {
        let mut signals = Vec::new();
        let shock_scale = self.adaptive.thresholds().shock_scale;
        self.adaptive.push_book_depth(sample.depth);

        if sample.imbalance.abs() >= self.extreme_imbalance {
            let side = if sample.imbalance > 0.0 { Side::Buy } else { Side::Sell };
            self.squeeze.on_extreme(side, sample.ts);
        }

        if let Some(previous) = self.last_depth {
            let shock = if shock_scale > 0.0 {
                ((sample.depth - previous.depth) / shock_scale).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            self.gauges.set(GaugeKind::Shock, shock);

            let delta = sample.imbalance - previous.imbalance;
            signals.extend(self.controlled.push(delta, self.gauges.confirm, sample.ts));
        }
        self.last_depth = Some(sample);
        signals
    }

    /// Net print count over the window ending at `now`, so the gauge decays
    /// to zero once trading goes quiet
    fn update_momentum_gauge(&mut self, now: DateTime<Utc>) {
        let threshold = self.adaptive.thresholds().momentum_count_threshold;
        let intensity = self.momentum.intensity(now, threshold);
        self.gauges.set(GaugeKind::Momentum, intensity);
    }

    fn update_squeeze_gauge(&mut self, now: DateTime<Utc>) {
        let hold = ChronoDuration::milliseconds(self.squeeze_hold_ms);
        let value = match self.last_squeeze {
            Some((signed, ts)) if now - ts <= hold => signed,
            Some(_) => {
                self.last_squeeze = None;
                0.0
            }
            None => 0.0,
        };
        self.gauges.set(GaugeKind::Squeeze, value);
    }
}
