//! Stateful pattern detectors
//!
//! Each detector owns a short bounded history and its own cooldown. All of them
//! are edge-triggered: they fire when a condition is first met and re-arm only
//! after the condition breaks.

mod controlled;
mod hidden;
mod iceberg;
mod momentum;
mod squeeze;

pub use controlled::{ControlledMoveConfig, ControlledMoveDetector};
pub use hidden::{HiddenFlowConfig, HiddenFlowDetector};
pub use iceberg::{IcebergConfig, IcebergStreakDetector};
pub use momentum::{MomentumConfig, MomentumIgnitionDetector};
pub use squeeze::{SqueezeConfig, SqueezeDetector};

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// True when `last` is unset or at least `cooldown_ms` before `now`
pub(crate) fn cooled_down(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_ms: i64,
) -> bool {
    match last {
        Some(last) => now - last >= ChronoDuration::milliseconds(cooldown_ms),
        None => true,
    }
}
