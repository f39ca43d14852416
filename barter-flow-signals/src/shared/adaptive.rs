//! Adaptive thresholds derived from rolling trade and depth statistics.
//!
//! The engine owns the trade-notional and book-depth windows and recomputes all
//! four thresholds together, at most once per second.

use crate::shared::aggregation::RollingWindow;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Floor for the big-print notional threshold (USD)
pub const BIG_PRINT_FLOOR: f64 = 25_000.0;
/// Floor for the neutral window (ms)
pub const NEUTRAL_WINDOW_FLOOR_MS: f64 = 800.0;
/// Floor for the momentum count threshold
pub const MOMENTUM_COUNT_FLOOR: f64 = 5.0;
/// Floor for the depth shock scale (USD)
pub const SHOCK_SCALE_FLOOR: f64 = 100_000.0;
/// Minimum spacing between two recomputations
pub const REFRESH_INTERVAL_MS: i64 = 1_000;
/// Nominal window the print rate is measured over (5 minutes)
const PRINT_RATE_WINDOW_SECS: f64 = 300.0;
/// Lower bound on prints/sec used for the neutral window
const MIN_PRINT_RATE: f64 = 0.2;

/// Thresholds recomputed as one group on every refresh
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AdaptiveThresholds {
    pub big_print_notional: f64,
    pub neutral_window_ms: f64,
    pub momentum_count_threshold: f64,
    pub shock_scale: f64,
}

impl AdaptiveThresholds {
    /// Compute thresholds from the current window contents
    pub fn compute(trade_notional: &RollingWindow, book_depth: &RollingWindow) -> Self {
        let p90 = trade_notional.percentile(0.90);
        let print_rate = trade_notional.len() as f64 / PRINT_RATE_WINDOW_SECS;

        Self {
            big_print_notional: BIG_PRINT_FLOOR.max(p90),
            neutral_window_ms: NEUTRAL_WINDOW_FLOOR_MS
                .max(1_200.0 / print_rate.max(MIN_PRINT_RATE)),
            // Percentile of notional, not of counts: kept as the floor-dominated rule
            momentum_count_threshold: MOMENTUM_COUNT_FLOOR.max(p90),
            shock_scale: SHOCK_SCALE_FLOOR.max(2.0 * book_depth.std()),
        }
    }
}

impl Default for AdaptiveThresholds {
    /// Thresholds on empty windows: every value sits at its floor
    fn default() -> Self {
        Self::compute(&RollingWindow::new(0), &RollingWindow::new(0))
    }
}

/// Owns the rolling inputs and the latest thresholds
#[derive(Debug, Clone)]
pub struct AdaptiveThresholdEngine {
    trade_notional: RollingWindow,
    book_depth: RollingWindow,
    thresholds: AdaptiveThresholds,
    last_refresh: Option<DateTime<Utc>>,
    refresh_count: u64,
}

impl AdaptiveThresholdEngine {
    pub fn new(notional_capacity: usize, depth_capacity: usize) -> Self {
        Self {
            trade_notional: RollingWindow::new(notional_capacity),
            book_depth: RollingWindow::new(depth_capacity),
            thresholds: AdaptiveThresholds::default(),
            last_refresh: None,
            refresh_count: 0,
        }
    }

    pub fn push_trade_notional(&mut self, notional: f64) {
        self.trade_notional.push(notional);
    }

    pub fn push_book_depth(&mut self, depth: f64) {
        self.book_depth.push(depth);
    }

    /// Recompute thresholds unless the previous refresh was under a second ago.
    ///
    /// Returns `true` when a recomputation happened.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_refresh {
            if now - last < ChronoDuration::milliseconds(REFRESH_INTERVAL_MS) {
                return false;
            }
        }

        self.thresholds = AdaptiveThresholds::compute(&self.trade_notional, &self.book_depth);
        self.last_refresh = Some(now);
        self.refresh_count += 1;

        debug!(
            big_print = self.thresholds.big_print_notional,
            neutral_ms = self.thresholds.neutral_window_ms,
            momentum = self.thresholds.momentum_count_threshold,
            shock = self.thresholds.shock_scale,
            samples = self.trade_notional.len(),
            "adaptive thresholds refreshed"
        );
        true
    }

    /// Latest thresholds (floors until the first refresh)
    pub fn thresholds(&self) -> AdaptiveThresholds {
        self.thresholds
    }

    /// Number of recomputations performed so far
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    pub fn trade_notional(&self) -> &RollingWindow {
        &self.trade_notional
    }

    pub fn book_depth(&self) -> &RollingWindow {
        &self.book_depth
    }
}
