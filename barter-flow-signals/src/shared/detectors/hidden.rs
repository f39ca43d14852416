use crate::shared::types::{Side, SignalEvent, SignalKind, SignalMeta};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
pub struct HiddenFlowConfig {
    /// Gauge must stay beyond ±threshold
    pub threshold: f64,
    /// Consecutive ticks required
    pub min_streak: usize,
}

impl Default for HiddenFlowConfig {
    fn default() -> Self {
        Self {
            threshold: 0.10,
            min_streak: 6,
        }
    }
}

/// Sustained confirmation gauge: hidden accumulation above +threshold,
/// hidden distribution below -threshold. Fires once per run.
#[derive(Debug, Clone, Default)]
pub struct HiddenFlowDetector {
    config: HiddenFlowConfig,
    acc_streak: usize,
    dist_streak: usize,
    acc_fired: bool,
    dist_fired: bool,
}

impl HiddenFlowDetector {
    pub fn new(config: HiddenFlowConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn push(&mut self, gauge: f64, ts: DateTime<Utc>) -> Option<SignalEvent> {
        if gauge > self.config.threshold {
            self.reset_distribution();
            self.acc_streak += 1;
            if self.acc_streak >= self.config.min_streak && !self.acc_fired {
                self.acc_fired = true;
                let streak = self.acc_streak;
                let kind = SignalKind::HiddenAccumulation;
                return Some(self.signal(kind, Side::Buy, streak, gauge, ts));
            }
        } else if gauge < -self.config.threshold {
            self.reset_accumulation();
            self.dist_streak += 1;
            if self.dist_streak >= self.config.min_streak && !self.dist_fired {
                self.dist_fired = true;
                let streak = self.dist_streak;
                let kind = SignalKind::HiddenDistribution;
                return Some(self.signal(kind, Side::Sell, streak, gauge, ts));
            }
        } else {
            // NaN lands here too
            self.reset_accumulation();
            self.reset_distribution();
        }
        None
    }

    pub fn streaks(&self) -> (usize, usize) {
        (self.acc_streak, self.dist_streak)
    }

    fn reset_accumulation(&mut self) {
        self.acc_streak = 0;
        self.acc_fired = false;
    }

    fn reset_distribution(&mut self) {
        self.dist_streak = 0;
        self.dist_fired = false;
    }

    fn signal(
        &self,
        kind: SignalKind,
        side: Side,
        streak: usize,
        gauge: f64,
        ts: DateTime<Utc>,
    ) -> SignalEvent {
        let meta = SignalMeta::Hidden { streak, gauge };
        SignalEvent::new(ts, kind, side, gauge.abs(), meta)
    }
}
