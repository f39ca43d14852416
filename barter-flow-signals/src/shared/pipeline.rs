//! Hot path: trade classification, rolling bias and the feed runner.
//!
//! [`FlowPipeline`] is synchronous and single-owner. It classifies a trade from
//! its bracketing books, updates the bias inline and forwards samples to the
//! analytics worker without waiting. [`run_feed`] drives it from a stream of
//! [`FeedMessage`]s, holding each trade until its post-trade book is due.

use crate::shared::aggregation::RollingBias;
use crate::shared::burst::BurstAggregator;
use crate::shared::classifier::FlowClassifier;
use crate::shared::config::FlowConfig;
use crate::shared::engine::{DepthSample, WorkerInput};
use crate::shared::score::GaugeKind;
use crate::shared::types::{BookSnapshot, ClassifiedFlowEvent, Fill, TradeEvent};
use crate::shared::worker::WorkerHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One line of the input feed
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Trade(TradeEvent),
    Book(BookSnapshot),
    Fill(Fill),
    /// Externally computed gauge (warn, fake, LaR, resilience, ...)
    Gauge { kind: GaugeKind, value: f64 },
}

pub struct FlowPipeline {
    classifier: FlowClassifier,
    bias: RollingBias,
    worker: WorkerHandle,
    worker_lost: bool,
    classified: u64,
}

impl FlowPipeline {
    pub fn new(config: &FlowConfig, worker: WorkerHandle) -> Self {
        Self {
            classifier: FlowClassifier::new(),
            bias: RollingBias::new(config.bias_window),
            worker,
            worker_lost: false,
            classified: 0,
        }
    }

    /// Classify a trade now and forward it to the worker
    pub fn on_trade(
        &mut self,
        trade: &TradeEvent,
        pre: &BookSnapshot,
        post: &BookSnapshot,
    ) -> ClassifiedFlowEvent {
        self.on_trade_at(trade, pre, post, Utc::now())
    }

    pub fn on_trade_at(
        &mut self,
        trade: &TradeEvent,
        pre: &BookSnapshot,
        post: &BookSnapshot,
        now: DateTime<Utc>,
    ) -> ClassifiedFlowEvent {
        let event = self.classifier.classify_at(trade, pre, post, now);
        self.bias.push(event.kind, event.side);
        self.classified += 1;

        self.forward(WorkerInput::Trade {
            ts: now,
            side: event.side,
            notional: event.notional,
        });
        self.forward(WorkerInput::Flow(event.clone()));
        self.forward(WorkerInput::Confirmation {
            ts: now,
            value: self.bias.value(),
        });
        event
    }

    /// Forward the depth summary of a fresh book
    pub fn on_book(&mut self, book: &BookSnapshot) {
        self.on_book_at(book, Utc::now())
    }

    pub fn on_book_at(&mut self, book: &BookSnapshot, now: DateTime<Utc>) {
        self.forward(WorkerInput::Depth(DepthSample {
            ts: now,
            depth: book.depth_notional(),
            imbalance: book.imbalance(),
        }));
    }

    /// Forward a gauge computed outside the pipeline
    pub fn on_gauge(&mut self, kind: GaugeKind, value: f64) {
        self.forward(WorkerInput::Gauge { kind, value });
    }

    /// Current rolling bias in [-1, 1]
    pub fn bias(&self) -> f64 {
        self.bias.value()
    }

    /// Trades classified so far
    pub fn classified(&self) -> u64 {
        self.classified
    }

    fn forward(&mut self, input: WorkerInput) {
        if let Err(error) = self.worker.send(input) {
            if !self.worker_lost {
                warn!(%error, "Dropping analytics input");
                self.worker_lost = true;
            }
        }
    }
}

/// Trade waiting for its post-trade book
struct Pending {
    due: Instant,
    trade: TradeEvent,
    pre: BookSnapshot,
}

/// Drive the pipeline from a feed until the feed closes.
///
/// Each trade is paired with the latest book at arrival (`pre`) and the latest
/// book once `lookahead` has elapsed (`post`). Classified events are emitted in
/// trade arrival order. Trades still pending when the feed closes are
/// classified against the last book seen. Fills go straight to the burst
/// aggregator and gauges straight to the worker.
pub async fn run_feed(
    mut pipeline: FlowPipeline,
    burst: BurstAggregator,
    lookahead: Duration,
    mut feed_rx: mpsc::Receiver<FeedMessage>,
    flow_tx: mpsc::UnboundedSender<ClassifiedFlowEvent>,
) -> FlowPipeline {
    info!(lookahead_ms = lookahead.as_millis() as u64, "Feed runner started");

    let mut latest: Option<BookSnapshot> = None;
    let mut pending: VecDeque<Pending> = VecDeque::new();

    loop {
        let next_due = pending.front().map(|p| p.due);
        let deadline = tokio::time::sleep_until(next_due.unwrap_or_else(Instant::now));

        tokio::select! {
            biased;

            _ = deadline, if next_due.is_some() => {
                if let Some(p) = pending.pop_front() {
                    emit(&mut pipeline, &flow_tx, p, latest.as_ref());
                }
            }

            message = feed_rx.recv() => match message {
                Some(FeedMessage::Book(book)) => {
                    pipeline.on_book(&book);
                    latest = Some(book);
                }
                Some(FeedMessage::Trade(trade)) => {
                    let pre = latest
                        .clone()
                        .unwrap_or_else(|| BookSnapshot::empty(trade.ts));
                    pending.push_back(Pending {
                        due: Instant::now() + lookahead,
                        trade,
                        pre,
                    });
                }
                Some(FeedMessage::Fill(fill)) => {
                    burst.handle_fill(fill).await;
                }
                Some(FeedMessage::Gauge { kind, value }) => {
                    pipeline.on_gauge(kind, value);
                }
                None => break,
            }
        }
    }

    debug!(pending = pending.len(), "Feed closed, flushing pending trades");
    while let Some(p) = pending.pop_front() {
        emit(&mut pipeline, &flow_tx, p, latest.as_ref());
    }

    info!(classified = pipeline.classified(), "Feed runner stopped");
    pipeline
}

fn emit(
    pipeline: &mut FlowPipeline,
    flow_tx: &mpsc::UnboundedSender<ClassifiedFlowEvent>,
    pending: Pending,
    latest: Option<&BookSnapshot>,
) {
    let empty;
    let post = match latest {
        Some(book) => book,
        None => {
            empty = BookSnapshot::empty(pending.trade.ts);
            &empty
        }
    };

    let event = pipeline.on_trade(&pending.trade, &pending.pre, post);
    // A dropped consumer only loses the event stream; analytics keep running
    let _ = flow_tx.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::engine::WorkerOutput;
    use crate::shared::score::{DEFAULT_AMPLIFY, DEFAULT_WEIGHTS};
    use crate::shared::types::{FlowKind, Level, Side};
    use crate::shared::worker::AnalyticsWorker;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn book(bid_amount: Decimal, ask_amount: Decimal) -> BookSnapshot {
        BookSnapshot::new(
            Utc::now(),
            vec![Level::new(dec!(99), bid_amount)],
            vec![Level::new(dec!(101), ask_amount)],
        )
    }

    fn trade(side: Side, price: f64, size: f64) -> TradeEvent {
        TradeEvent {
            ts: Utc::now(),
            side,
            price,
            size,
            maker: None,
        }
    }

    #[test]
    fn test_feed_message_decodes_tagged_json() {
        struct TestCase {
            input: &'static str,
            expected: fn(&FeedMessage) -> bool,
        }

        let tests = vec![
            TestCase {
                // TC0: exchange side code, maker omitted
                input: r#"{"type":"trade","ts":"2024-01-01T00:00:00Z","side":"B",
                    "price":101.0,"size":2.0}"#,
                expected: |m| {
                    matches!(m, FeedMessage::Trade(t) if t.side.is_buy() && t.maker.is_none())
                },
            },
            TestCase {
                // TC1: missing ask side defaults to empty
                input: r#"{"type":"book","ts":"2024-01-01T00:00:00Z",
                    "bids":[{"price":99,"amount":3}]}"#,
                expected: |m| {
                    matches!(m, FeedMessage::Book(b) if b.asks.is_empty() && b.bids.len() == 1)
                },
            },
            TestCase {
                // TC2: fill without weight or bias
                input: r#"{"type":"fill","trader_id":"0xabc","side":"sell",
                    "notional":5000.0,"price":10.0}"#,
                expected: |m| {
                    matches!(m, FeedMessage::Fill(f) if f.weight == 0.0 && f.side.is_sell())
                },
            },
            TestCase {
                // TC3: externally computed gauge
                input: r#"{"type":"gauge","kind":"warn","value":-0.4}"#,
                expected: |m| {
                    matches!(
                        m,
                        FeedMessage::Gauge { kind: GaugeKind::Warn, value } if *value == -0.4
                    )
                },
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual: FeedMessage = serde_json::from_str(test.input).unwrap();
            assert!((test.expected)(&actual), "TC{} failed: {:?}", index, actual);
        }
    }

    #[tokio::test]
    async fn test_pipeline_updates_bias_and_forwards() {
        let worker = AnalyticsWorker::new(&FlowConfig::default());
        let mut pipeline = FlowPipeline::new(&FlowConfig::default(), worker.handle());

        let pre = book(dec!(10), dec!(10));
        let post = book(dec!(10), dec!(4));
        let event = pipeline.on_trade(&trade(Side::Buy, 101.0, 6.0), &pre, &post);
        assert_eq!(event.kind, FlowKind::Absorption);
        assert_eq!(pipeline.bias(), 1.0);

        let event = pipeline.on_trade(&trade(Side::Sell, 99.0, 1.0), &post, &post);
        assert_eq!(event.kind, FlowKind::Exhaustion);
        assert!((pipeline.bias() - 0.35).abs() < 1e-12);
        assert_eq!(pipeline.classified(), 2);

        pipeline.on_book(&post);

        let (mut outputs, task) = worker.start();
        drop(pipeline);
        let mut scores = 0;
        while let Some(output) = outputs.recv().await {
            if matches!(output, WorkerOutput::Score(_)) {
                scores += 1;
            }
        }
        task.await.unwrap();
        assert!(scores > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_close_flushes_pending_trade_against_latest_book() {
        let config = FlowConfig::default();
        let (worker, _outputs, thresholds, _worker_task) = AnalyticsWorker::spawn(&config);
        let (burst, _rows) = BurstAggregator::new(config.bucket_window, thresholds);
        let pipeline = FlowPipeline::new(&config, worker);

        let (feed_tx, feed_rx) = mpsc::channel(8);
        let (flow_tx, mut flows) = mpsc::unbounded_channel();
        let runner = tokio::spawn(run_feed(pipeline, burst, config.lookahead, feed_rx, flow_tx));

        // Close the feed well inside the look-ahead window
        feed_tx.send(FeedMessage::Book(book(dec!(10), dec!(10)))).await.unwrap();
        feed_tx.send(FeedMessage::Trade(trade(Side::Buy, 101.0, 6.0))).await.unwrap();
        feed_tx.send(FeedMessage::Book(book(dec!(10), dec!(4)))).await.unwrap();
        drop(feed_tx);

        let pipeline = runner.await.unwrap();
        assert_eq!(pipeline.classified(), 1);

        let event = flows.try_recv().unwrap();
        assert_eq!(event.kind, FlowKind::Absorption);
        assert_eq!(event.ask_eaten, 6.0);
        assert!(flows.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_gauge_reaches_worker_score() {
        let worker = AnalyticsWorker::new(&FlowConfig::default());
        let mut pipeline = FlowPipeline::new(&FlowConfig::default(), worker.handle());
        pipeline.on_gauge(GaugeKind::Resilience, -1.0);

        let (mut outputs, task) = worker.start();
        drop(pipeline);
        let mut bear = 0.0;
        while let Some(output) = outputs.recv().await {
            if let WorkerOutput::Score(score) = output {
                bear = score.bear_pct;
            }
        }
        task.await.unwrap();
        let weight_sum: f64 = DEFAULT_WEIGHTS.iter().sum();
        assert!((bear - DEFAULT_AMPLIFY * 0.7 / weight_sum * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_closed_worker_does_not_panic() {
        let worker = AnalyticsWorker::new(&FlowConfig::default());
        let handle = worker.handle();
        drop(worker);

        let mut pipeline = FlowPipeline::new(&FlowConfig::default(), handle);
        let empty = BookSnapshot::empty(Utc::now());
        pipeline.on_book(&empty);
        pipeline.on_gauge(GaugeKind::Warn, 0.5);
        let event = pipeline.on_trade(&trade(Side::Unknown, 100.0, 1.0), &empty, &empty);
        assert_eq!(event.side, Side::Unknown);
        assert_eq!(pipeline.bias(), 0.0);
    }
}
