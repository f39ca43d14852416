/// Core data types for the flow analytics pipeline
///
/// Inputs arrive from the feed collaborator (trades, book snapshots, fills) and
/// outputs are handed to whatever consumes signals and scores. Every type here is
/// serde-friendly so the transport layer can frame them as JSON.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::HashMap;

/// Aggressor side of a trade or fill
///
/// Exchanges report sides with their own codes ("B"/"A", "buy"/"sell", ...).
/// Unrecognised codes resolve to [`Side::Unknown`] rather than failing.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "&'static str")]
pub enum Side {
    Buy,
    Sell,
    Unknown,
}

impl Side {
    /// Map an exchange side code to a [`Side`]
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "B" | "b" | "buy" | "Buy" | "BUY" | "bid" | "Bid" => Side::Buy,
            "A" | "a" | "S" | "s" | "sell" | "Sell" | "SELL" | "ask" | "Ask" => Side::Sell,
            _ => Side::Unknown,
        }
    }

    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
            Side::Unknown => "Unknown",
        }
    }

    /// Check if this is a buy
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Check if this is a sell
    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }

    /// The other side of the book. Unknown stays unknown.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
            Side::Unknown => Side::Unknown,
        }
    }

    /// +1 for buy, -1 for sell, 0 when unresolved
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
            Side::Unknown => 0.0,
        }
    }
}

impl From<&str> for Side {
    fn from(code: &str) -> Self {
        Side::from_code(code)
    }
}

impl From<String> for Side {
    fn from(code: String) -> Self {
        Side::from_code(&code)
    }
}

impl From<Side> for &'static str {
    fn from(side: Side) -> Self {
        side.as_str()
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single matched trade from the feed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradeEvent {
    /// Exchange timestamp of the match
    pub ts: DateTime<Utc>,
    /// Aggressor side
    pub side: Side,
    /// Execution price
    pub price: f64,
    /// Trade size in base currency
    pub size: f64,
    /// Passive counterparty / market maker id, when the venue exposes it
    #[serde(default)]
    pub maker: Option<SmolStr>,
}

impl TradeEvent {
    /// Quote notional of the trade: |size| * price
    pub fn notional(&self) -> f64 {
        self.size.abs() * self.price
    }
}

/// Price/quantity level in an order book
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Level {
    /// Price level
    pub price: Decimal,
    /// Quantity at this level
    pub amount: Decimal,
}

impl Level {
    pub fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }

    /// Convert price to f64 for calculations
    pub fn price_f64(&self) -> f64 {
        self.price.to_f64().unwrap_or(0.0)
    }

    /// Convert amount to f64 for calculations
    pub fn amount_f64(&self) -> f64 {
        self.amount.to_f64().unwrap_or(0.0)
    }

    /// Resting quote notional at this level
    pub fn notional(&self) -> f64 {
        self.price_f64() * self.amount_f64()
    }
}

/// Full or partial order book view
///
/// Levels are unique by price. A snapshot missing a side is treated as having
/// an empty side.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookSnapshot {
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}

impl BookSnapshot {
    pub fn new(ts: DateTime<Utc>, bids: Vec<Level>, asks: Vec<Level>) -> Self {
        Self { ts, bids, asks }
    }

    /// Snapshot with no resting liquidity on either side
    pub fn empty(ts: DateTime<Utc>) -> Self {
        Self::new(ts, Vec::new(), Vec::new())
    }

    /// Price → amount lookup for one side
    pub fn level_map(levels: &[Level]) -> HashMap<Decimal, Decimal> {
        levels.iter().map(|l| (l.price, l.amount)).collect()
    }

    /// Resting size at an exact price on the given book side
    ///
    /// `Side::Buy` reads bids, `Side::Sell` reads asks.
    pub fn size_at(&self, book_side: Side, price: f64) -> Option<Decimal> {
        let levels = match book_side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
            Side::Unknown => return None,
        };
        let price = Decimal::from_f64(price)?;
        levels
            .iter()
            .find(|l| l.price.normalize() == price.normalize())
            .map(|l| l.amount)
    }

    /// Total resting bid notional
    pub fn bid_notional(&self) -> f64 {
        self.bids.iter().map(Level::notional).sum()
    }

    /// Total resting ask notional
    pub fn ask_notional(&self) -> f64 {
        self.asks.iter().map(Level::notional).sum()
    }

    /// Total resting notional across both sides
    pub fn depth_notional(&self) -> f64 {
        self.bid_notional() + self.ask_notional()
    }

    /// Order book imbalance in [-1, 1]: positive = bid heavy
    pub fn imbalance(&self) -> f64 {
        let bid = self.bid_notional();
        let ask = self.ask_notional();
        let total = bid + ask;
        if total > 0.0 {
            (bid - ask) / total
        } else {
            0.0
        }
    }
}

/// Liquidity removed per book side between two snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct DepthDelta {
    pub bid_eaten: f64,
    pub ask_eaten: f64,
}

impl DepthDelta {
    pub fn total(&self) -> f64 {
        self.bid_eaten + self.ask_eaten
    }
}

/// Absorption vs exhaustion classification of a trade
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum FlowKind {
    /// Print accompanied by measurable removal of resting liquidity
    Absorption,
    /// Print with no measurable liquidity removal
    Exhaustion,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Absorption => "absorption",
            FlowKind::Exhaustion => "exhaustion",
        }
    }
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A trade after depth-diff classification
///
/// `ts` is the classification time, not the trade time.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifiedFlowEvent {
    pub ts: DateTime<Utc>,
    pub kind: FlowKind,
    pub side: Side,
    pub notional: f64,
    pub price: f64,
    pub bid_eaten: f64,
    pub ask_eaten: f64,
    /// Visible resting size at the print price was smaller than the print
    pub iceberg: bool,
    /// Opposing visible notional at the print price (absorption only)
    pub visible_depth: f64,
    /// Market maker carried through from the trade
    #[serde(default)]
    pub maker: Option<SmolStr>,
}

impl ClassifiedFlowEvent {
    pub fn is_absorption(&self) -> bool {
        matches!(self.kind, FlowKind::Absorption)
    }

    pub fn is_exhaustion(&self) -> bool {
        matches!(self.kind, FlowKind::Exhaustion)
    }
}

/// A raw fill fed to the burst aggregator
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Fill {
    pub trader_id: SmolStr,
    pub side: Side,
    pub notional: f64,
    pub price: f64,
    /// Trader weight in [0, 1] (e.g. from an address list)
    #[serde(default)]
    pub weight: f64,
    /// Trader bias label passed through to the row
    #[serde(default)]
    pub bias: f64,
}

/// One aggregated burst of same-trader, same-side fills
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BurstRow {
    pub trader_id: SmolStr,
    pub side: Side,
    pub notional: f64,
    /// Notional-weighted VWAP of the burst
    pub price: f64,
    pub weight: f64,
    pub bias: f64,
    /// Top-weighted trader (weight >= 0.6)
    pub top: bool,
}

/// Kind of pattern signal
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Squeeze,
    Iceberg,
    HiddenAccumulation,
    HiddenDistribution,
    ControlledPullback,
    ControlledPop,
    MomentumIgnition,
}

impl SignalKind {
    pub fn label(&self) -> &'static str {
        match self {
            SignalKind::Squeeze => "SQUEEZE",
            SignalKind::Iceberg => "ICEBERG",
            SignalKind::HiddenAccumulation => "HIDDEN-ACC",
            SignalKind::HiddenDistribution => "HIDDEN-DIST",
            SignalKind::ControlledPullback => "PULLBACK",
            SignalKind::ControlledPop => "POP",
            SignalKind::MomentumIgnition => "IGNITION",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Detector specific context attached to a [`SignalEvent`]
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMeta {
    Squeeze {
        extreme_side: Side,
        exhausted_side: Side,
        extreme_age_ms: i64,
    },
    Iceberg {
        maker: Option<SmolStr>,
        streak: usize,
        avg_notional: f64,
    },
    Controlled {
        min_abs_delta: f64,
        sigma: f64,
    },
    Hidden {
        streak: usize,
        gauge: f64,
    },
    Momentum {
        count: usize,
        threshold: f64,
    },
}

/// Edge-triggered pattern signal
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SignalEvent {
    pub ts: DateTime<Utc>,
    pub kind: SignalKind,
    pub side: Side,
    /// Strength in [0, 1]
    pub strength: f64,
    pub meta: SignalMeta,
}

impl SignalEvent {
    pub fn new(
        ts: DateTime<Utc>,
        kind: SignalKind,
        side: Side,
        strength: f64,
        meta: SignalMeta,
    ) -> Self {
        Self {
            ts,
            kind,
            side,
            strength: strength.clamp(0.0, 1.0),
            meta,
        }
    }

    /// Strength signed by side (+ bullish, - bearish)
    pub fn signed_strength(&self) -> f64 {
        self.side.sign() * self.strength
    }
}

/// Composite bull/bear score, both in [0, 100]
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
pub struct CompositeScore {
    pub bull_pct: f64,
    pub bear_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Buy.to_string(), "Buy");
        assert_eq!(Side::Sell.to_string(), "Sell");
        assert_eq!(Side::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_side_checks() {
        assert!(Side::Buy.is_buy());
        assert!(!Side::Buy.is_sell());
        assert!(Side::Sell.is_sell());
        assert!(!Side::Sell.is_buy());
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Unknown.opposite(), Side::Unknown);
    }

    #[test]
    fn test_side_from_code() {
        struct TestCase {
            input: &'static str,
            expected: Side,
        }

        let tests = vec![
            TestCase {
                input: "B",
                expected: Side::Buy,
            },
            TestCase {
                input: "A",
                expected: Side::Sell,
            },
            TestCase {
                input: "buy",
                expected: Side::Buy,
            },
            TestCase {
                input: "Sell",
                expected: Side::Sell,
            },
            TestCase {
                input: "X",
                expected: Side::Unknown,
            },
            TestCase {
                input: "",
                expected: Side::Unknown,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(Side::from_code(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_trade_deserialize_with_side_code() {
        let json = r#"{"ts":"2024-01-01T00:00:00Z","side":"A","price":100.0,"size":-2.0}"#;
        let trade: TradeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(trade.side, Side::Sell);
        assert_eq!(trade.notional(), 200.0);
        assert!(trade.maker.is_none());

        let out = serde_json::to_value(&trade).unwrap();
        assert_eq!(out["side"], "Sell");
    }

    #[test]
    fn test_book_missing_side_is_empty() {
        let json = r#"{"ts":"2024-01-01T00:00:00Z","bids":[{"price":"100","amount":"2"}]}"#;
        let book: BookSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(book.bids.len(), 1);
        assert!(book.asks.is_empty());
        assert_eq!(book.imbalance(), 1.0);
    }

    #[test]
    fn test_book_calculations() {
        let book = BookSnapshot::new(
            Utc::now(),
            vec![Level::new(dec!(100.0), dec!(3))],
            vec![Level::new(dec!(100.5), dec!(1))],
        );

        assert_eq!(book.size_at(Side::Buy, 100.0), Some(dec!(3)));
        assert_eq!(book.size_at(Side::Sell, 100.5), Some(dec!(1)));
        assert_eq!(book.size_at(Side::Sell, 100.0), None);
        assert_eq!(book.size_at(Side::Unknown, 100.0), None);

        assert!((book.bid_notional() - 300.0).abs() < 1e-9);
        assert!((book.depth_notional() - 400.5).abs() < 1e-9);
        let imbalance = book.imbalance();
        assert!((imbalance - (300.0 - 100.5) / 400.5).abs() < 1e-9);
        assert_eq!(BookSnapshot::empty(Utc::now()).imbalance(), 0.0);
    }

    #[test]
    fn test_signal_strength_clamped() {
        let signal = SignalEvent::new(
            Utc::now(),
            SignalKind::Squeeze,
            Side::Sell,
            1.7,
            SignalMeta::Hidden {
                streak: 1,
                gauge: 0.0,
            },
        );
        assert_eq!(signal.strength, 1.0);
        assert_eq!(signal.signed_strength(), -1.0);
    }
}
