/// Pipeline configuration
///
/// Defaults match the production tuning; every field can be overridden via an
/// environment variable (see [`FlowConfig::from_env`]) or the builder methods.
use crate::shared::detectors::{
    ControlledMoveConfig, HiddenFlowConfig, IcebergConfig, MomentumConfig, SqueezeConfig,
};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Debounce window per burst bucket
    pub bucket_window: Duration,
    /// Delay between the pre and post book snapshots bracketing a trade
    pub lookahead: Duration,
    /// Trade notional samples kept for adaptive thresholds
    pub notional_window: usize,
    /// Book depth samples kept for the shock scale
    pub depth_window: usize,
    /// Classified prints kept by the rolling bias
    pub bias_window: usize,
    /// |imbalance| at or above which the book counts as extreme
    pub extreme_imbalance: f64,
    /// Worker output channel capacity
    pub channel_buffer_size: usize,
    pub squeeze: SqueezeConfig,
    pub iceberg: IcebergConfig,
    pub controlled: ControlledMoveConfig,
    pub hidden: HiddenFlowConfig,
    pub momentum: MomentumConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            bucket_window: Duration::from_millis(1_000),
            lookahead: Duration::from_millis(100),
            notional_window: 2_000,
            depth_window: 300,
            bias_window: 50,
            extreme_imbalance: 0.6,
            channel_buffer_size: 10_000,
            squeeze: SqueezeConfig::default(),
            iceberg: IcebergConfig::default(),
            controlled: ControlledMoveConfig::default(),
            hidden: HiddenFlowConfig::default(),
            momentum: MomentumConfig::default(),
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl FlowConfig {
    /// Defaults overridden by `FLOW_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bucket_window: Duration::from_millis(env_or(
                "FLOW_BUCKET_MS",
                defaults.bucket_window.as_millis() as u64,
            )),
            lookahead: Duration::from_millis(env_or(
                "FLOW_LOOKAHEAD_MS",
                defaults.lookahead.as_millis() as u64,
            )),
            notional_window: env_or("FLOW_NOTIONAL_WINDOW", defaults.notional_window),
            depth_window: env_or("FLOW_DEPTH_WINDOW", defaults.depth_window),
            bias_window: env_or("FLOW_BIAS_WINDOW", defaults.bias_window),
            extreme_imbalance: env_or("FLOW_EXTREME_IMBALANCE", defaults.extreme_imbalance),
            channel_buffer_size: env_or("FLOW_CHANNEL_BUFFER", defaults.channel_buffer_size),
            iceberg: IcebergConfig {
                min_notional: env_or("FLOW_ICEBERG_MIN_NOTIONAL", defaults.iceberg.min_notional),
                ..defaults.iceberg
            },
            ..defaults
        }
    }

    pub fn with_bucket_window(mut self, window: Duration) -> Self {
        self.bucket_window = window;
        self
    }

    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_extreme_imbalance(mut self, threshold: f64) -> Self {
        self.extreme_imbalance = threshold;
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    pub fn with_iceberg(mut self, iceberg: IcebergConfig) -> Self {
        self.iceberg = iceberg;
        self
    }

    pub fn with_squeeze(mut self, squeeze: SqueezeConfig) -> Self {
        self.squeeze = squeeze;
        self
    }
}
