use super::cooled_down;
use crate::shared::types::{Side, SignalEvent, SignalKind, SignalMeta};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;

/// Hard cap on remembered timestamps per direction
const MAX_PRINTS: usize = 4_096;

#[derive(Debug, Clone, Copy)]
pub struct MomentumConfig {
    /// Sliding window the prints are counted over
    pub window_ms: i64,
    /// Minimum spacing between sparks in the same direction
    pub cooldown_ms: i64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            window_ms: 2_000,
            cooldown_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Direction {
    prints: VecDeque<DateTime<Utc>>,
    above: bool,
    last_fire: Option<DateTime<Utc>>,
}

impl Direction {
    fn prune(&mut self, now: DateTime<Utc>, window_ms: i64) {
        let cutoff = now - ChronoDuration::milliseconds(window_ms);
        while self.prints.front().is_some_and(|t| *t <= cutoff) {
            self.prints.pop_front();
        }
    }
}

/// Burst of prints in one direction crossing the adaptive count threshold
#[derive(Debug, Clone, Default)]
pub struct MomentumIgnitionDetector {
    config: MomentumConfig,
    buys: Direction,
    sells: Direction,
}

impl MomentumIgnitionDetector {
    pub fn new(config: MomentumConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Record a print and check for an upward crossing of `threshold`
    pub fn push(&mut self, side: Side, ts: DateTime<Utc>, threshold: f64) -> Option<SignalEvent> {
        let window_ms = self.config.window_ms;
        let cooldown_ms = self.config.cooldown_ms;
        let direction = match side {
            Side::Buy => &mut self.buys,
            Side::Sell => &mut self.sells,
            Side::Unknown => return None,
        };

        direction.prune(ts, window_ms);
        if direction.prints.len() >= MAX_PRINTS {
            direction.prints.pop_front();
        }
        direction.prints.push_back(ts);

        let count = direction.prints.len();
        let above = count as f64 >= threshold;
        let crossed = above && !direction.above;
        direction.above = above;

        if !crossed || !cooled_down(direction.last_fire, ts, cooldown_ms) {
            return None;
        }
        direction.last_fire = Some(ts);

        let strength = if threshold > 0.0 {
            count as f64 / (2.0 * threshold)
        } else {
            1.0
        };

        Some(SignalEvent::new(
            ts,
            SignalKind::MomentumIgnition,
            side,
            strength,
            SignalMeta::Momentum { count, threshold },
        ))
    }

    /// Prints inside the window ending at `now`
    pub fn count(&mut self, side: Side, now: DateTime<Utc>) -> usize {
        let window_ms = self.config.window_ms;
        match side {
            Side::Buy => {
                self.buys.prune(now, window_ms);
                self.buys.prints.len()
            }
            Side::Sell => {
                self.sells.prune(now, window_ms);
                self.sells.prints.len()
            }
            Side::Unknown => 0,
        }
    }

    /// Net directional intensity in [-1, 1]: (buys - sells) / threshold
    pub fn intensity(&mut self, now: DateTime<Utc>, threshold: f64) -> f64 {
        if threshold <= 0.0 {
            return 0.0;
        }
        let net = self.count(Side::Buy, now) as f64 - self.count(Side::Sell, now) as f64;
        (net / threshold).clamp(-1.0, 1.0)
    }
}
