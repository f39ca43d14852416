/// Flow Monitor - NDJSON adapter for the flow signal pipeline
///
/// Reads one `FeedMessage` per line from stdin:
///   {"type":"trade","ts":"...","side":"B","price":101.5,"size":0.4}
///   {"type":"book","ts":"...","bids":[{"price":101,"amount":3}],"asks":[...]}
///   {"type":"fill","trader_id":"0xabc","side":"sell","notional":42000,"price":101}
///   {"type":"gauge","kind":"warn","value":-0.35}
///
/// Writes every classified event, signal, threshold refresh, score and burst
/// row as one JSON line to stdout. Logs go to stderr (`RUST_LOG` filters them).
use barter_flow_signals::{
    run_feed, AdaptiveThresholds, AnalyticsWorker, BurstAggregator, BurstRow, ClassifiedFlowEvent,
    CompositeScore, FeedMessage, FlowConfig, FlowError, FlowPipeline, SignalEvent, WorkerOutput,
};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum OutputLine {
    Flow(ClassifiedFlowEvent),
    Signal(SignalEvent),
    Adapt(AdaptiveThresholds),
    Score(CompositeScore),
    Burst(BurstRow),
}

impl From<WorkerOutput> for OutputLine {
    fn from(output: WorkerOutput) -> Self {
        match output {
            WorkerOutput::Signal(signal) => Self::Signal(signal),
            WorkerOutput::Adapt(thresholds) => Self::Adapt(thresholds),
            WorkerOutput::Score(score) => Self::Score(score),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), FlowError> {
    init_logging();

    let config = FlowConfig::from_env();
    info!(?config, "Starting flow monitor");

    let (worker, outputs, thresholds, worker_task) = AnalyticsWorker::spawn(&config);
    let (burst, rows) = BurstAggregator::new(config.bucket_window, thresholds);
    let pipeline = FlowPipeline::new(&config, worker);

    let (feed_tx, feed_rx) = mpsc::channel(config.channel_buffer_size.max(1));
    let (flow_tx, flows) = mpsc::unbounded_channel();

    let feed_task = tokio::spawn(run_feed(
        pipeline,
        burst.clone(),
        config.lookahead,
        feed_rx,
        flow_tx,
    ));
    let writer_task = tokio::spawn(write_outputs(flows, outputs, rows));

    let read_result = tokio::select! {
        result = read_feed(feed_tx) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };

    // Input done: classify what is pending, let open buckets fire, then stop
    let pipeline = feed_task
        .await
        .map_err(|e| FlowError::Io(e.to_string()))?;
    tokio::time::sleep(config.bucket_window).await;
    burst.shutdown().await;
    info!(
        classified = pipeline.classified(),
        hidden_bursts = burst.hidden_count().await,
        "Flow monitor draining"
    );
    drop(pipeline);
    drop(burst);

    worker_task
        .await
        .map_err(|e| FlowError::Io(e.to_string()))?;
    writer_task
        .await
        .map_err(|e| FlowError::Io(e.to_string()))??;

    read_result
}

/// Initialize logging to stderr
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Forward stdin lines to the feed runner until EOF
async fn read_feed(feed_tx: mpsc::Sender<FeedMessage>) -> Result<(), FlowError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut skipped: u64 = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match serde_json::from_str::<FeedMessage>(line) {
            Ok(message) => message,
            Err(error) => {
                let error = FlowError::from(error);
                skipped += 1;
                warn!(%error, skipped, "Skipping feed line");
                continue;
            }
        };

        if feed_tx.send(message).await.is_err() {
            return Err(FlowError::FeedClosed);
        }
    }

    info!(skipped, "Input closed");
    Ok(())
}

/// Serialize every output stream to stdout until all of them close
async fn write_outputs(
    mut flows: mpsc::UnboundedReceiver<ClassifiedFlowEvent>,
    mut outputs: mpsc::Receiver<WorkerOutput>,
    mut rows: mpsc::UnboundedReceiver<BurstRow>,
) -> Result<(), FlowError> {
    let mut stdout = tokio::io::stdout();
    let (mut flows_open, mut outputs_open, mut rows_open) = (true, true, true);

    while flows_open || outputs_open || rows_open {
        let line = tokio::select! {
            flow = flows.recv(), if flows_open => match flow {
                Some(event) => OutputLine::Flow(event),
                None => {
                    flows_open = false;
                    continue;
                }
            },
            output = outputs.recv(), if outputs_open => match output {
                Some(output) => OutputLine::from(output),
                None => {
                    outputs_open = false;
                    continue;
                }
            },
            row = rows.recv(), if rows_open => match row {
                Some(row) => OutputLine::Burst(row),
                None => {
                    rows_open = false;
                    continue;
                }
            },
        };

        let mut json = serde_json::to_vec(&line)?;
        json.push(b'\n');
        stdout.write_all(&json).await?;
        stdout.flush().await?;
    }

    Ok(())
}
