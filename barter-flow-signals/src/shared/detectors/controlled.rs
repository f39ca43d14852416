use super::cooled_down;
use crate::shared::aggregation::RollingWindow;
use crate::shared::types::{Side, SignalEvent, SignalKind, SignalMeta};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
pub struct ControlledMoveConfig {
    /// Samples that must all agree
    pub window: usize,
    /// Imbalance deltas used to estimate sigma
    pub sigma_window: usize,
    pub cooldown_ms: i64,
}

impl Default for ControlledMoveConfig {
    fn default() -> Self {
        Self {
            window: 4,
            sigma_window: 60,
            cooldown_ms: 5_000,
        }
    }
}

/// Controlled pullback / pop.
///
/// Pullback: every imbalance delta in the window sits strictly inside
/// `(0, sigma)` while every confirmation sample is negative, i.e. flow leans
/// against a book that is quietly firming. Signals Buy.
///
/// Pop: every delta in `(-sigma, 0)` with every confirmation positive. Signals Sell.
#[derive(Debug, Clone)]
pub struct ControlledMoveDetector {
    config: ControlledMoveConfig,
    deltas: VecDeque<(f64, DateTime<Utc>)>,
    confirms: VecDeque<(f64, DateTime<Utc>)>,
    sigma: RollingWindow,
    /// Pattern that matched on the previous sample
    active: Option<SignalKind>,
    last_fire: Option<DateTime<Utc>>,
}

impl Default for ControlledMoveDetector {
    fn default() -> Self {
        Self::new(ControlledMoveConfig::default())
    }
}

impl ControlledMoveDetector {
    pub fn new(config: ControlledMoveConfig) -> Self {
        Self {
            config,
            deltas: VecDeque::with_capacity(config.window),
            confirms: VecDeque::with_capacity(config.window),
            sigma: RollingWindow::new(config.sigma_window),
            active: None,
            last_fire: None,
        }
    }

    /// Current sigma estimate: population std of recent imbalance deltas
    pub fn sigma(&self) -> f64 {
        self.sigma.std()
    }

    /// Push one paired sample and evaluate both patterns
    pub fn push(
        &mut self,
        imbalance_delta: f64,
        confirmation: f64,
        ts: DateTime<Utc>,
    ) -> Option<SignalEvent> {
        if !imbalance_delta.is_finite() || !confirmation.is_finite() || self.config.window == 0 {
            return None;
        }

        self.sigma.push(imbalance_delta);
        if self.deltas.len() >= self.config.window {
            self.deltas.pop_front();
            self.confirms.pop_front();
        }
        self.deltas.push_back((imbalance_delta, ts));
        self.confirms.push_back((confirmation, ts));

        let matched = self.evaluate();
        let edge = matched.is_some() && matched != self.active;
        self.active = matched;

        let kind = matched?;
        if !edge || !cooled_down(self.last_fire, ts, self.config.cooldown_ms) {
            return None;
        }
        self.last_fire = Some(ts);

        let sigma = self.sigma();
        let min_abs_delta = self
            .deltas
            .iter()
            .map(|(d, _)| d.abs())
            .fold(f64::INFINITY, f64::min);
        let strength = 1.0 - (min_abs_delta / sigma).min(1.0);
        let side = match kind {
            SignalKind::ControlledPullback => Side::Buy,
            _ => Side::Sell,
        };

        Some(SignalEvent::new(
            ts,
            kind,
            side,
            strength,
            SignalMeta::Controlled {
                min_abs_delta,
                sigma,
            },
        ))
    }

    fn evaluate(&self) -> Option<SignalKind> {
        if self.deltas.len() < self.config.window {
            return None;
        }
        let sigma = self.sigma();
        if sigma <= 0.0 {
            return None;
        }

        let pullback = self.deltas.iter().all(|(d, _)| *d > 0.0 && *d < sigma)
            && self.confirms.iter().all(|(c, _)| *c < 0.0);
        let pop = self.deltas.iter().all(|(d, _)| *d < 0.0 && *d > -sigma)
            && self.confirms.iter().all(|(c, _)| *c > 0.0);

        if pullback {
            Some(SignalKind::ControlledPullback)
        } else if pop {
            Some(SignalKind::ControlledPop)
        } else {
            None
        }
    }
}
