//! Depth-diff trade classification.
//!
//! A trade is bracketed by a book snapshot taken when it arrives (`pre`) and one
//! taken a fixed look-ahead later (`post`). Liquidity removed from *either* side
//! of the book in that window marks the print as absorption; an untouched book
//! marks it as exhaustion.

use crate::shared::types::{
    BookSnapshot, ClassifiedFlowEvent, DepthDelta, FlowKind, Level, Side, TradeEvent,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Liquidity removed per side between `pre` and `post`.
///
/// For every level in `pre`, adds `max(0, pre_size - post_size_at_same_price)`
/// where a level missing from `post` counts as size 0. Independent of the
/// trade's own side.
pub fn depth_diff(pre: &BookSnapshot, post: &BookSnapshot) -> DepthDelta {
    DepthDelta {
        bid_eaten: eaten(&pre.bids, &post.bids),
        ask_eaten: eaten(&pre.asks, &post.asks),
    }
}

fn eaten(pre: &[Level], post: &[Level]) -> f64 {
    let post_map = BookSnapshot::level_map(post);

    pre.iter()
        .map(|level| {
            let after = post_map.get(&level.price).copied().unwrap_or(Decimal::ZERO);
            (level.amount - after).max(Decimal::ZERO)
        })
        .filter_map(|removed| removed.to_f64())
        .sum()
}

/// Stateless depth-diff classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowClassifier;

impl FlowClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a trade, stamping the event with the current time
    pub fn classify(
        &self,
        trade: &TradeEvent,
        pre: &BookSnapshot,
        post: &BookSnapshot,
    ) -> ClassifiedFlowEvent {
        self.classify_at(trade, pre, post, Utc::now())
    }

    /// Classify a trade with an explicit detection time
    pub fn classify_at(
        &self,
        trade: &TradeEvent,
        pre: &BookSnapshot,
        post: &BookSnapshot,
        now: DateTime<Utc>,
    ) -> ClassifiedFlowEvent {
        let delta = depth_diff(pre, post);
        let kind = if delta.total() > 0.0 {
            FlowKind::Absorption
        } else {
            FlowKind::Exhaustion
        };

        let side = trade.side;
        let notional = trade.notional();

        let (visible_depth, iceberg) = match kind {
            FlowKind::Absorption => {
                // Buyers lift asks, sellers hit bids
                let visible_depth = pre
                    .size_at(side.opposite(), trade.price)
                    .and_then(|size| size.to_f64())
                    .map(|size| size * trade.price)
                    .unwrap_or(0.0);
                (visible_depth, notional > visible_depth)
            }
            FlowKind::Exhaustion => (0.0, false),
        };

        ClassifiedFlowEvent {
            ts: now,
            kind,
            side,
            notional,
            price: trade.price,
            bid_eaten: delta.bid_eaten,
            ask_eaten: delta.ask_eaten,
            iceberg,
            visible_depth,
            maker: trade.maker.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade(side: Side, price: f64, size: f64) -> TradeEvent {
        TradeEvent {
            ts: Utc::now(),
            side,
            price,
            size,
            maker: None,
        }
    }

    fn book(bids: Vec<(Decimal, Decimal)>, asks: Vec<(Decimal, Decimal)>) -> BookSnapshot {
        BookSnapshot::new(
            Utc::now(),
            bids.into_iter().map(|(p, a)| Level::new(p, a)).collect(),
            asks.into_iter().map(|(p, a)| Level::new(p, a)).collect(),
        )
    }

    #[test]
    fn test_untouched_book_is_exhaustion() {
        let pre = book(vec![(dec!(99), dec!(5))], vec![(dec!(101), dec!(5))]);
        let post = pre.clone();

        let event = FlowClassifier::new().classify(&trade(Side::Buy, 101.0, 1.0), &pre, &post);

        assert_eq!(event.kind, FlowKind::Exhaustion);
        assert_eq!(event.bid_eaten, 0.0);
        assert_eq!(event.ask_eaten, 0.0);
        assert!(!event.iceberg);
        assert_eq!(event.visible_depth, 0.0);
    }

    #[test]
    fn test_added_liquidity_is_not_eaten() {
        let pre = book(vec![(dec!(99), dec!(5))], vec![(dec!(101), dec!(5))]);
        let post = book(vec![(dec!(99), dec!(8))], vec![(dec!(101), dec!(9))]);

        let delta = depth_diff(&pre, &post);
        assert_eq!(delta, DepthDelta::default());
    }

    #[test]
    fn test_removed_level_counts_fully() {
        let pre = book(
            vec![(dec!(99), dec!(5)), (dec!(98), dec!(2))],
            vec![(dec!(101), dec!(4))],
        );
        let post = book(vec![(dec!(99), dec!(1.5))], vec![(dec!(101), dec!(4))]);

        let delta = depth_diff(&pre, &post);
        assert_eq!(delta.bid_eaten, 5.5);
        assert_eq!(delta.ask_eaten, 0.0);
    }

    #[test]
    fn test_opposite_side_removal_still_absorption() {
        // A buy print while only bids were pulled is still absorption
        let pre = book(vec![(dec!(99), dec!(5))], vec![(dec!(101), dec!(5))]);
        let post = book(vec![(dec!(99), dec!(2))], vec![(dec!(101), dec!(5))]);

        let event = FlowClassifier::new().classify(&trade(Side::Buy, 101.0, 1.0), &pre, &post);

        assert_eq!(event.kind, FlowKind::Absorption);
        assert_eq!(event.bid_eaten, 3.0);
        // 1 * 101 notional vs 5 * 101 visible
        assert_eq!(event.visible_depth, 505.0);
        assert!(!event.iceberg);
    }

    #[test]
    fn test_large_print_against_thin_level_is_iceberg() {
        // 50 asks at 100 = 5,000 visible; buy 1,200 @ 100 = 120,000 notional
        let pre = book(vec![(dec!(99), dec!(10))], vec![(dec!(100), dec!(50))]);
        let post = book(vec![(dec!(99), dec!(10))], vec![(dec!(100), dec!(20))]);

        let event = FlowClassifier::new().classify(&trade(Side::Buy, 100.0, 1_200.0), &pre, &post);

        assert_eq!(event.kind, FlowKind::Absorption);
        assert_eq!(event.notional, 120_000.0);
        assert_eq!(event.visible_depth, 5_000.0);
        assert!(event.iceberg);
    }

    #[test]
    fn test_sell_reads_bids_and_missing_price_is_zero_depth() {
        let pre = book(vec![(dec!(99), dec!(10))], vec![(dec!(101), dec!(10))]);
        let post = book(vec![(dec!(99), dec!(4))], vec![(dec!(101), dec!(10))]);

        let at_level = FlowClassifier::new().classify(&trade(Side::Sell, 99.0, 2.0), &pre, &post);
        assert_eq!(at_level.visible_depth, 990.0);
        assert!(!at_level.iceberg);

        let off_level = FlowClassifier::new().classify(&trade(Side::Sell, 98.5, 2.0), &pre, &post);
        assert_eq!(off_level.visible_depth, 0.0);
        assert!(off_level.iceberg);
    }

    #[test]
    fn test_empty_books_and_unknown_side_degrade() {
        let empty = BookSnapshot::empty(Utc::now());
        let print = trade(Side::Unknown, 100.0, 1.0);
        let event = FlowClassifier::new().classify(&print, &empty, &empty);
        assert_eq!(event.kind, FlowKind::Exhaustion);
        assert_eq!(event.side, Side::Unknown);

        let pre = book(vec![(dec!(99), dec!(1))], vec![]);
        let event = FlowClassifier::new().classify(&trade(Side::Unknown, 99.0, 1.0), &pre, &empty);
        assert_eq!(event.kind, FlowKind::Absorption);
        assert_eq!(event.visible_depth, 0.0);
    }

    #[test]
    fn test_classification_time_is_detection_time() {
        let mut print = trade(Side::Buy, 100.0, 1.0);
        print.ts = DateTime::from_timestamp_millis(0).unwrap();
        let now = DateTime::from_timestamp_millis(1_000).unwrap();
        let empty = BookSnapshot::empty(now);

        let event = FlowClassifier::new().classify_at(&print, &empty, &empty, now);
        assert_eq!(event.ts, now);
    }
}
