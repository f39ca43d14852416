use super::cooled_down;
use crate::shared::types::{ClassifiedFlowEvent, Side, SignalEvent, SignalKind, SignalMeta};
use chrono::{DateTime, Utc};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct SqueezeConfig {
    /// How long an extreme imbalance stays eligible
    pub staleness_ms: i64,
    /// Minimum spacing between two squeeze signals
    pub cooldown_ms: i64,
}

impl Default for SqueezeConfig {
    fn default() -> Self {
        Self {
            staleness_ms: 5_000,
            cooldown_ms: 3_000,
        }
    }
}

/// Extreme book imbalance followed by exhaustion on the opposite side.
///
/// An extreme is consumed when it fires, so one extreme yields at most one
/// signal. The signal side is the crowded (extreme) side.
#[derive(Debug, Clone, Default)]
pub struct SqueezeDetector {
    config: SqueezeConfig,
    extreme: Option<(Side, DateTime<Utc>)>,
    last_fire: Option<DateTime<Utc>>,
}

impl SqueezeDetector {
    pub fn new(config: SqueezeConfig) -> Self {
        Self {
            config,
            extreme: None,
            last_fire: None,
        }
    }

    /// Record the latest extreme imbalance. Replaces any earlier one.
    pub fn on_extreme(&mut self, side: Side, ts: DateTime<Utc>) {
        if side == Side::Unknown {
            return;
        }
        self.extreme = Some((side, ts));
    }

    /// Most recent extreme, if any
    pub fn extreme(&self) -> Option<(Side, DateTime<Utc>)> {
        self.extreme
    }

    pub fn on_flow(&mut self, event: &ClassifiedFlowEvent) -> Option<SignalEvent> {
        if !event.is_exhaustion() {
            return None;
        }
        let (extreme_side, extreme_ts) = self.extreme?;

        let age_ms = (event.ts - extreme_ts).num_milliseconds();
        if age_ms > self.config.staleness_ms {
            // Too old to pair with anything later either
            self.extreme = None;
            return None;
        }
        if age_ms < 0 || event.side != extreme_side.opposite() {
            return None;
        }
        if !cooled_down(self.last_fire, event.ts, self.config.cooldown_ms) {
            return None;
        }

        self.extreme = None;
        self.last_fire = Some(event.ts);

        let strength = if self.config.staleness_ms > 0 {
            1.0 - age_ms as f64 / self.config.staleness_ms as f64
        } else {
            1.0
        };
        debug!(side = %extreme_side, age_ms, "squeeze detected");

        Some(SignalEvent::new(
            event.ts,
            SignalKind::Squeeze,
            extreme_side,
            strength,
            SignalMeta::Squeeze {
                extreme_side,
                exhausted_side: event.side,
                extreme_age_ms: age_ms,
            },
        ))
    }
}
