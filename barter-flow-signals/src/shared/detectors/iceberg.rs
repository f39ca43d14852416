use super::cooled_down;
use crate::shared::types::{ClassifiedFlowEvent, Side, SignalEvent, SignalKind, SignalMeta};
use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy)]
pub struct IcebergConfig {
    /// Consecutive qualifying prints required
    pub streak: usize,
    /// Each print must exceed this notional
    pub min_notional: f64,
    /// Maximum visible_depth / notional for a print to count as hidden
    pub max_visible_ratio: f64,
    /// Prints remembered per (side, maker)
    pub history: usize,
    pub cooldown_ms: i64,
}

impl Default for IcebergConfig {
    fn default() -> Self {
        Self {
            streak: 3,
            min_notional: 50_000.0,
            max_visible_ratio: 0.1,
            history: 10,
            cooldown_ms: 10_000,
        }
    }
}

type StreakKey = (Side, Option<SmolStr>);

#[derive(Debug, Clone, Copy)]
struct Print {
    notional: f64,
    qualifies: bool,
}

#[derive(Debug, Clone, Default)]
struct StreakState {
    prints: VecDeque<Print>,
    /// Condition was met on the previous evaluation
    active: bool,
    last_fire: Option<DateTime<Utc>>,
}

/// Repeated large absorption prints against thin visible depth from one maker
#[derive(Debug, Clone, Default)]
pub struct IcebergStreakDetector {
    config: IcebergConfig,
    streaks: HashMap<StreakKey, StreakState>,
}

impl IcebergStreakDetector {
    pub fn new(config: IcebergConfig) -> Self {
        Self {
            config,
            streaks: HashMap::new(),
        }
    }

    fn qualifies(&self, event: &ClassifiedFlowEvent) -> bool {
        event.is_absorption()
            && event.notional > self.config.min_notional
            && event.visible_depth / event.notional <= self.config.max_visible_ratio
    }

    pub fn on_flow(&mut self, event: &ClassifiedFlowEvent) -> Option<SignalEvent> {
        if event.side == Side::Unknown || self.config.streak == 0 {
            return None;
        }

        let print = Print {
            notional: event.notional,
            qualifies: self.qualifies(event),
        };
        let streak = self.config.streak;
        let capacity = self.config.history.max(streak);
        let min_notional = self.config.min_notional;
        let cooldown_ms = self.config.cooldown_ms;

        let state = self
            .streaks
            .entry((event.side, event.maker.clone()))
            .or_default();

        if state.prints.len() >= capacity {
            state.prints.pop_front();
        }
        state.prints.push_back(print);

        let recent: Vec<Print> = state.prints.iter().rev().take(streak).copied().collect();
        let met = recent.len() == streak && recent.iter().all(|p| p.qualifies);

        if !met {
            state.active = false;
            return None;
        }
        if state.active || !cooled_down(state.last_fire, event.ts, cooldown_ms) {
            return None;
        }

        state.active = true;
        state.last_fire = Some(event.ts);

        let avg_notional = recent.iter().map(|p| p.notional).sum::<f64>() / streak as f64;
        let strength = if min_notional > 0.0 {
            (avg_notional / min_notional).min(1.0)
        } else {
            1.0
        };

        Some(SignalEvent::new(
            event.ts,
            SignalKind::Iceberg,
            event.side,
            strength,
            SignalMeta::Iceberg {
                maker: event.maker.clone(),
                streak,
                avg_notional,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::detectors::test_util::at;
    use crate::shared::types::FlowKind;

    fn print(side: Side, maker: &str, notional: f64, visible: f64, ms: i64) -> ClassifiedFlowEvent {
        ClassifiedFlowEvent {
            ts: at(ms),
            kind: FlowKind::Absorption,
            side,
            notional,
            price: 100.0,
            bid_eaten: 1.0,
            ask_eaten: 0.0,
            iceberg: notional > visible,
            visible_depth: visible,
            maker: Some(SmolStr::new(maker)),
        }
    }

    #[test]
    fn test_three_hidden_prints_fire() {
        let mut detector = IcebergStreakDetector::default();

        assert!(detector.on_flow(&print(Side::Buy, "mm1", 60_000.0, 1_000.0, 0)).is_none());
        assert!(detector.on_flow(&print(Side::Buy, "mm1", 80_000.0, 2_000.0, 100)).is_none());
        let signal = detector
            .on_flow(&print(Side::Buy, "mm1", 100_000.0, 0.0, 200))
            .expect("iceberg");

        assert_eq!(signal.kind, SignalKind::Iceberg);
        assert_eq!(signal.side, Side::Buy);
        // avg 80k vs 50k min -> capped at 1
        assert_eq!(signal.strength, 1.0);
        match signal.meta {
            SignalMeta::Iceberg { streak, avg_notional, .. } => {
                assert_eq!(streak, 3);
                assert!((avg_notional - 80_000.0).abs() < 1e-9);
            }
            other => panic!("unexpected meta {other:?}"),
        }
    }

    #[test]
    fn test_visible_ratio_breaks_streak() {
        let mut detector = IcebergStreakDetector::default();

        detector.on_flow(&print(Side::Sell, "mm1", 60_000.0, 0.0, 0));
        // 20% visible: does not qualify
        detector.on_flow(&print(Side::Sell, "mm1", 60_000.0, 12_000.0, 100));
        assert!(detector.on_flow(&print(Side::Sell, "mm1", 60_000.0, 0.0, 200)).is_none());
        assert!(detector.on_flow(&print(Side::Sell, "mm1", 60_000.0, 0.0, 300)).is_none());
        assert!(detector.on_flow(&print(Side::Sell, "mm1", 60_000.0, 0.0, 400)).is_some());
    }

    #[test]
    fn test_streaks_are_per_side_and_maker() {
        let mut detector = IcebergStreakDetector::default();

        detector.on_flow(&print(Side::Buy, "mm1", 60_000.0, 0.0, 0));
        detector.on_flow(&print(Side::Buy, "mm2", 60_000.0, 0.0, 100));
        detector.on_flow(&print(Side::Sell, "mm1", 60_000.0, 0.0, 200));
        assert!(detector.on_flow(&print(Side::Buy, "mm1", 60_000.0, 0.0, 300)).is_none());
        assert!(detector.on_flow(&print(Side::Buy, "mm1", 60_000.0, 0.0, 400)).is_some());
    }

    #[test]
    fn test_sustained_streak_is_edge_triggered() {
        let mut detector = IcebergStreakDetector::new(IcebergConfig {
            cooldown_ms: 0,
            ..IcebergConfig::default()
        });

        let mut fired = 0;
        for i in 0..6 {
            if detector.on_flow(&print(Side::Buy, "mm1", 60_000.0, 0.0, i * 100)).is_some() {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);

        // Break, then a fresh run re-arms
        detector.on_flow(&print(Side::Buy, "mm1", 10_000.0, 0.0, 700));
        for i in 0..3 {
            if detector.on_flow(&print(Side::Buy, "mm1", 60_000.0, 0.0, 800 + i * 100)).is_some() {
                fired += 1;
            }
        }
        assert_eq!(fired, 2);
    }

    #[test]
    fn test_strength_saturates_when_every_print_clears_minimum() {
        let mut detector = IcebergStreakDetector::new(IcebergConfig {
            min_notional: 100_000.0,
            streak: 1,
            ..IcebergConfig::default()
        });

        let signal = detector
            .on_flow(&print(Side::Sell, "mm1", 100_001.0, 0.0, 0))
            .expect("iceberg");
        assert_eq!(signal.strength, 1.0);
        assert!(detector.on_flow(&print(Side::Sell, "mm1", 100_000.0, 0.0, 100)).is_none());
    }
}
