//! Debounced fill clustering.
//!
//! Rapid fills from the same trader on the same side are folded into one
//! VWAP'd [`BurstRow`]. The first fill for a key opens a bucket and arms a
//! one-shot timer; when it fires the bucket is flushed and destroyed. Bursts
//! below the adaptive big-print notional are counted as hidden and dropped.

use crate::shared::adaptive::AdaptiveThresholds;
use crate::shared::types::{BurstRow, Fill, Side};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default debounce window per bucket
pub const BUCKET_MS: u64 = 1_000;
/// Weight at or above which a trader is flagged as top
pub const TOP_WEIGHT: f64 = 0.6;

/// Bucket key: one live bucket per trader and side
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BurstKey {
    pub trader_id: SmolStr,
    pub side: Side,
}

#[derive(Debug)]
struct BurstBucket {
    /// Generation id, so a timer only ever flushes the bucket it was armed for
    id: u64,
    total_notional: f64,
    vwap_numerator: f64,
    weight: f64,
    bias: f64,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct BurstState {
    buckets: HashMap<BurstKey, BurstBucket>,
    next_id: u64,
    hidden_count: u64,
}

/// Keyed debounce buffer for trader fills
///
/// Cloning shares the same bucket map.
#[derive(Debug, Clone)]
pub struct BurstAggregator {
    state: Arc<Mutex<BurstState>>,
    bucket_window: Duration,
    thresholds: watch::Receiver<AdaptiveThresholds>,
    row_tx: mpsc::UnboundedSender<BurstRow>,
}

impl BurstAggregator {
    /// Create an aggregator gated by the published adaptive thresholds.
    ///
    /// Returns the aggregator and the receiver for emitted rows.
    pub fn new(
        bucket_window: Duration,
        thresholds: watch::Receiver<AdaptiveThresholds>,
    ) -> (Self, mpsc::UnboundedReceiver<BurstRow>) {
        let (row_tx, row_rx) = mpsc::unbounded_channel();
        let aggregator = Self {
            state: Arc::new(Mutex::new(BurstState::default())),
            bucket_window,
            thresholds,
            row_tx,
        };
        (aggregator, row_rx)
    }

    /// Current notional gate: `max(25_000, p90(recent notional))`
    pub fn notional_threshold(&self) -> f64 {
        self.thresholds.borrow().big_print_notional
    }

    /// Add a fill to its bucket, opening one (and its timer) if needed
    pub async fn handle_fill(&self, fill: Fill) {
        if !fill.notional.is_finite() || !fill.price.is_finite() || fill.notional <= 0.0 {
            debug!(trader = %fill.trader_id, "ignoring fill with invalid notional/price");
            return;
        }

        let key = BurstKey {
            trader_id: fill.trader_id.clone(),
            side: fill.side,
        };

        let mut state = self.state.lock().await;
        if !state.buckets.contains_key(&key) {
            let id = state.next_id;
            state.next_id += 1;

            let timer = {
                let this = self.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(this.bucket_window).await;
                    this.flush(&key, id).await;
                })
            };

            state.buckets.insert(
                key.clone(),
                BurstBucket {
                    id,
                    total_notional: 0.0,
                    vwap_numerator: 0.0,
                    weight: fill.weight,
                    bias: fill.bias,
                    timer: Some(timer),
                },
            );
        }

        if let Some(bucket) = state.buckets.get_mut(&key) {
            bucket.total_notional += fill.notional;
            bucket.vwap_numerator += fill.notional * fill.price;
        }
    }

    /// Flush and destroy the bucket for `key` if it is still generation `id`
    async fn flush(&self, key: &BurstKey, id: u64) {
        let bucket = {
            let mut state = self.state.lock().await;
            match state.buckets.get(key) {
                Some(bucket) if bucket.id == id => {}
                _ => return,
            }
            let Some(bucket) = state.buckets.remove(key) else {
                return;
            };

            if bucket.total_notional < self.notional_threshold() {
                state.hidden_count += 1;
                debug!(
                    trader = %key.trader_id,
                    side = %key.side,
                    notional = bucket.total_notional,
                    "burst below notional threshold, hidden"
                );
                return;
            }
            bucket
        };

        let price = if bucket.total_notional > 0.0 {
            bucket.vwap_numerator / bucket.total_notional
        } else {
            0.0
        };

        let row = BurstRow {
            trader_id: key.trader_id.clone(),
            side: key.side,
            notional: bucket.total_notional,
            price,
            weight: bucket.weight,
            bias: bucket.bias,
            top: bucket.weight >= TOP_WEIGHT,
        };

        debug!(
            trader = %row.trader_id,
            side = %row.side,
            notional = row.notional,
            price,
            "burst flushed"
        );
        if self.row_tx.send(row).is_err() {
            warn!("burst row receiver dropped");
        }
    }

    /// Number of bursts suppressed by the notional gate
    pub async fn hidden_count(&self) -> u64 {
        self.state.lock().await.hidden_count
    }

    /// Number of buckets currently accumulating
    pub async fn live_buckets(&self) -> usize {
        self.state.lock().await.buckets.len()
    }

    /// Dispose of every pending timer; open buckets are discarded unflushed
    pub async fn shutdown(&self) {
        let timers: Vec<JoinHandle<()>> = {
            let mut state = self.state.lock().await;
            state
                .buckets
                .drain()
                .filter_map(|(_, mut bucket)| bucket.timer.take())
                .collect()
        };

        for timer in &timers {
            timer.abort();
        }
        // Aborted tasks resolve to a cancellation error
        let _ = futures::future::join_all(timers).await;
    }
}
