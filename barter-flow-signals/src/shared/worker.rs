//! Offloaded analytics worker.
//!
//! The hot path only classifies and forwards; everything windowed (adaptive
//! thresholds, detectors, gauges) runs here on its own task. Inputs travel over
//! an unbounded channel so the hot path never waits, outputs over a bounded one,
//! and the latest thresholds are published on a watch channel.

use crate::shared::adaptive::AdaptiveThresholds;
use crate::shared::config::FlowConfig;
use crate::shared::engine::{SignalEngine, WorkerInput, WorkerOutput};
use crate::shared::error::FlowError;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cloneable sender half used by the hot path
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<WorkerInput>,
}

impl WorkerHandle {
    /// Queue an input without waiting
    pub fn send(&self, input: WorkerInput) -> Result<(), FlowError> {
        self.tx.send(input).map_err(|_| FlowError::WorkerClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct AnalyticsWorker {
    engine: SignalEngine,
    input_tx: mpsc::UnboundedSender<WorkerInput>,
    input_rx: mpsc::UnboundedReceiver<WorkerInput>,
    output_tx: mpsc::Sender<WorkerOutput>,
    output_rx: mpsc::Receiver<WorkerOutput>,
    thresholds_tx: watch::Sender<AdaptiveThresholds>,
}

impl AnalyticsWorker {
    pub fn new(config: &FlowConfig) -> Self {
        let engine = SignalEngine::new(config);
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::channel(config.channel_buffer_size.max(1));
        let (thresholds_tx, _) = watch::channel(engine.thresholds());

        Self {
            engine,
            input_tx,
            input_rx,
            output_tx,
            output_rx,
            thresholds_tx,
        }
    }

    /// Sender for the hot path. Take every handle you need before [`start`](Self::start).
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            tx: self.input_tx.clone(),
        }
    }

    /// Receiver for the latest adaptive thresholds
    pub fn thresholds(&self) -> watch::Receiver<AdaptiveThresholds> {
        self.thresholds_tx.subscribe()
    }

    /// Build and start a worker in one step
    pub fn spawn(
        config: &FlowConfig,
    ) -> (
        WorkerHandle,
        mpsc::Receiver<WorkerOutput>,
        watch::Receiver<AdaptiveThresholds>,
        JoinHandle<()>,
    ) {
        let worker = Self::new(config);
        let handle = worker.handle();
        let thresholds = worker.thresholds();
        let (outputs, task) = worker.start();
        (handle, outputs, thresholds, task)
    }

    /// Spawn the worker task.
    ///
    /// The task exits once every [`WorkerHandle`] is dropped and the queue is
    /// drained, or when the output receiver is dropped.
    pub fn start(self) -> (mpsc::Receiver<WorkerOutput>, JoinHandle<()>) {
        let Self {
            engine,
            input_tx,
            input_rx,
            output_tx,
            output_rx,
            thresholds_tx,
        } = self;
        drop(input_tx);

        let task = tokio::spawn(async move {
            run_worker_loop(engine, input_rx, output_tx, thresholds_tx).await;
        });

        (output_rx, task)
    }
}

async fn run_worker_loop(
    mut engine: SignalEngine,
    mut input_rx: mpsc::UnboundedReceiver<WorkerInput>,
    output_tx: mpsc::Sender<WorkerOutput>,
    thresholds_tx: watch::Sender<AdaptiveThresholds>,
) {
    info!("Analytics worker started");
    let mut processed: u64 = 0;

    while let Some(input) = input_rx.recv().await {
        processed += 1;

        for output in engine.handle(input, Utc::now()) {
            match &output {
                WorkerOutput::Adapt(thresholds) => {
                    thresholds_tx.send_replace(*thresholds);
                }
                WorkerOutput::Signal(signal) => {
                    info!(
                        kind = signal.kind.label(),
                        side = %signal.side,
                        strength = signal.strength,
                        "signal"
                    );
                }
                WorkerOutput::Score(score) => {
                    debug!(bull = score.bull_pct, bear = score.bear_pct, "score updated");
                }
            }

            if output_tx.send(output).await.is_err() {
                warn!("Output receiver dropped, stopping analytics worker");
                return;
            }
        }
    }

    info!(processed, "Analytics worker stopped");
}
