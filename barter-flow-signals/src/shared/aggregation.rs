/// Rolling statistics primitives for flow analysis
///
/// Bounded FIFO windows that every detector and the adaptive threshold engine
/// build on. Statistics are computed on demand from the current buffer and
/// return 0.0 on an empty window rather than NaN.
use crate::shared::types::{FlowKind, Side};
use std::collections::VecDeque;

/// Fixed-capacity window of numeric samples
#[derive(Debug, Clone)]
pub struct RollingWindow {
    /// Maximum number of samples to keep
    capacity: usize,
    /// Samples, oldest first
    samples: VecDeque<f64>,
}

impl RollingWindow {
    /// Create a new window with specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, evicting the oldest one when full.
    /// Non-finite samples are ignored.
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() || self.capacity == 0 {
            return;
        }

        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Arithmetic mean
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Population standard deviation (divides by N)
    pub fn std(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let mean = self.mean();
        let variance = self
            .samples
            .iter()
            .map(|&x| {
                let diff = x - mean;
                diff * diff
            })
            .sum::<f64>()
            / self.samples.len() as f64;

        variance.sqrt()
    }

    /// Median; even length averages the two middle samples
    pub fn median(&self) -> f64 {
        let sorted = self.sorted();
        let n = sorted.len();
        if n == 0 {
            return 0.0;
        }

        if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        }
    }

    /// Percentile by nearest-rank on a sorted copy:
    /// index = clamp(floor(q * len), 0, len - 1)
    pub fn percentile(&self, q: f64) -> f64 {
        let sorted = self.sorted();
        if sorted.is_empty() {
            return 0.0;
        }

        let raw = (q * sorted.len() as f64).floor();
        let index = if raw.is_finite() && raw > 0.0 {
            (raw as usize).min(sorted.len() - 1)
        } else {
            0
        };
        sorted[index]
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted
    }
}

/// Rolling directional bias from classified prints
///
/// Absorption counts ±1, exhaustion ±0.3 (buy positive). Prints without a
/// resolved side are dropped. `value()` is the mean of the window, in [-1, 1].
#[derive(Debug, Clone)]
pub struct RollingBias {
    window: VecDeque<f64>,
    max_size: usize,
}

impl RollingBias {
    /// Weight of an absorption print
    pub const ABSORPTION_WEIGHT: f64 = 1.0;
    /// Weight of an exhaustion print
    pub const EXHAUSTION_WEIGHT: f64 = 0.3;

    pub fn new(max_size: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Record a classified print
    pub fn push(&mut self, kind: FlowKind, side: Side) {
        let magnitude = match kind {
            FlowKind::Absorption => Self::ABSORPTION_WEIGHT,
            FlowKind::Exhaustion => Self::EXHAUSTION_WEIGHT,
        };
        let signed = match side {
            Side::Buy => magnitude,
            Side::Sell => -magnitude,
            Side::Unknown => return,
        };

        if self.max_size == 0 {
            return;
        }
        if self.window.len() >= self.max_size {
            self.window.pop_front();
        }
        self.window.push_back(signed);
    }

    /// Mean of the window, 0.0 when empty
    pub fn value(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_capacity_never_exceeded() {
        let mut window = RollingWindow::new(3);

        for i in 0..10 {
            window.push(i as f64);
            assert!(window.len() <= window.capacity());
        }

        assert_eq!(window.len(), 3);
        assert_eq!(window.latest(), Some(9.0));
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_window_drops_non_finite() {
        let mut window = RollingWindow::new(5);
        window.push(1.0);
        window.push(f64::NAN);
        window.push(f64::INFINITY);
        window.push(f64::NEG_INFINITY);
        window.push(3.0);

        assert_eq!(window.len(), 2);
        assert_eq!(window.mean(), 2.0);
    }

    #[test]
    fn test_window_empty_stats_are_zero() {
        let window = RollingWindow::new(4);
        assert_eq!(window.mean(), 0.0);
        assert_eq!(window.std(), 0.0);
        assert_eq!(window.median(), 0.0);
        assert_eq!(window.percentile(0.9), 0.0);
    }

    #[test]
    fn test_window_median() {
        let mut odd = RollingWindow::new(10);
        for x in [5.0, 1.0, 3.0] {
            odd.push(x);
        }
        assert_eq!(odd.median(), 3.0);

        let mut even = RollingWindow::new(10);
        for x in [4.0, 1.0, 3.0, 2.0] {
            even.push(x);
        }
        assert_eq!(even.median(), 2.5);
    }

    #[test]
    fn test_window_population_std() {
        let mut window = RollingWindow::new(10);
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            window.push(x);
        }
        assert_eq!(window.mean(), 5.0);
        assert!((window.std() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_window_percentile_index() {
        let mut window = RollingWindow::new(10);
        for x in 1..=10 {
            window.push(x as f64);
        }

        // floor(0.9 * 10) = 9 -> 10th value
        assert_eq!(window.percentile(0.9), 10.0);
        // floor(0.5 * 10) = 5 -> 6th value
        assert_eq!(window.percentile(0.5), 6.0);
        assert_eq!(window.percentile(0.0), 1.0);
        // Clamped at both ends
        assert_eq!(window.percentile(1.5), 10.0);
        assert_eq!(window.percentile(-1.0), 1.0);
    }

    #[test]
    fn test_bias_single_absorption_buy() {
        let mut bias = RollingBias::new(1);
        bias.push(FlowKind::Absorption, Side::Buy);
        assert_eq!(bias.value(), 1.0);
    }

    #[test]
    fn test_bias_single_exhaustion_sell() {
        let mut bias = RollingBias::new(8);
        bias.push(FlowKind::Exhaustion, Side::Sell);
        assert_eq!(bias.value(), -0.3);
    }

    #[test]
    fn test_bias_drops_unknown_side_and_evicts() {
        let mut bias = RollingBias::new(2);
        assert_eq!(bias.value(), 0.0);

        bias.push(FlowKind::Absorption, Side::Unknown);
        assert!(bias.is_empty());

        bias.push(FlowKind::Absorption, Side::Sell);
        bias.push(FlowKind::Absorption, Side::Buy);
        bias.push(FlowKind::Absorption, Side::Buy);
        assert_eq!(bias.len(), 2);
        assert_eq!(bias.value(), 1.0);
    }
}
