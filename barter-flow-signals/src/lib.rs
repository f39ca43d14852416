/// Barter Flow Signals - Order Flow Analytics Library
///
/// Turns a live stream of trades, order book snapshots and attributed fills
/// into trading-flow analytics:
/// - absorption / exhaustion classification from bracketing book snapshots
/// - adaptive thresholds from rolling trade and depth statistics
/// - pattern detectors (squeeze, iceberg, pullback/pop, hidden flow, momentum)
/// - a composite bull/bear score fused from signed gauges
/// - burst aggregation of same-trader fills
///
/// The library includes:
/// - `FlowPipeline` for the synchronous hot path and `run_feed` to drive it
/// - `AnalyticsWorker`, a tokio task owning every windowed computation
/// - `BurstAggregator` with one debounce timer per bucket
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{
    BookSnapshot, BurstRow, ClassifiedFlowEvent, CompositeScore, DepthDelta, Fill, FlowKind,
    Level, Side, SignalEvent, SignalKind, SignalMeta, TradeEvent,
};

pub use shared::adaptive::{AdaptiveThresholdEngine, AdaptiveThresholds};
pub use shared::aggregation::{RollingBias, RollingWindow};
pub use shared::burst::BurstAggregator;
pub use shared::classifier::{depth_diff, FlowClassifier};
pub use shared::config::FlowConfig;
pub use shared::engine::{DepthSample, SignalEngine, WorkerInput, WorkerOutput};
pub use shared::error::FlowError;
pub use shared::pipeline::{run_feed, FeedMessage, FlowPipeline};
pub use shared::score::{fuse, GaugeKind, Gauges};
pub use shared::worker::{AnalyticsWorker, WorkerHandle};
