//! Orchestrator for the worker consumers.
//!
//! Declares the broker topology, makes sure the search index exists, then runs
//! one subscriber loop per enabled consumer until shutdown.

use std::sync::Arc;
use std::time::Instant;

use document_broker::{
    run_subscriber, BrokerTopology, BrokerTransport, MessageHandler, StatsSnapshot,
    SubscriberStats,
};
use document_search::SearchIndexProvider;
use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, instrument};

use crate::errors::WorkerError;

/// Default interval between progress log lines.
const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// A queue and the handler that consumes it.
struct Consumer {
    name: String,
    queue: String,
    handler: Arc<dyn MessageHandler>,
    stats: Arc<SubscriberStats>,
}

/// Coordinates the subscriber loops of the worker.
///
/// The orchestrator:
/// - Prepares the broker topology and the search index
/// - Runs each consumer as its own task
/// - Logs progress counters periodically
/// - Stops on Ctrl-C or `shutdown`, letting in-flight messages finish
pub struct Orchestrator {
    transport: Arc<dyn BrokerTransport>,
    topology: BrokerTopology,
    index: Arc<dyn SearchIndexProvider>,
    consumers: Vec<Consumer>,
    progress_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        topology: BrokerTopology,
        index: Arc<dyn SearchIndexProvider>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            transport,
            topology,
            index,
            consumers: Vec::new(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            shutdown_tx,
        }
    }

    pub fn with_progress_interval(mut self, progress_interval: Duration) -> Self {
        self.progress_interval = progress_interval;
        self
    }

    /// Consume `queue` with `handler` once the orchestrator runs.
    pub fn with_consumer(
        mut self,
        name: impl Into<String>,
        queue: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        self.consumers.push(Consumer {
            name: name.into(),
            queue: queue.into(),
            handler,
            stats: Arc::new(SubscriberStats::default()),
        });
        self
    }

    /// Sender that stops the orchestrator when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Counters of each consumer, by name.
    pub fn stats(&self) -> Vec<(String, StatsSnapshot)> {
        self.consumers
            .iter()
            .map(|c| (c.name.clone(), c.stats.snapshot()))
            .collect()
    }

    /// Run all consumers until shutdown or until every subscription closes.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), WorkerError> {
        info!("Starting document worker orchestrator");

        if self.consumers.is_empty() {
            return Err(WorkerError::config("No consumers enabled"));
        }

        self.transport.declare_topology(&self.topology).await?;
        self.index.ensure_index_exists().await?;

        // Subscribe before listening for shutdown so no signal is missed
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut handles = Vec::with_capacity(self.consumers.len());
        for consumer in &self.consumers {
            let subscription = self.transport.subscribe(&consumer.queue).await?;
            let name = consumer.name.clone();
            let handler = consumer.handler.clone();
            let stats = consumer.stats.clone();
            let shutdown = self.shutdown_tx.subscribe();
            info!(consumer = %name, queue = %consumer.queue, "Consumer subscribed");
            handles.push(tokio::spawn(async move {
                run_subscriber(&name, subscription, handler, stats, shutdown).await
            }));
        }
        let mut consumers_done = Box::pin(join_all(handles));

        let mut progress_timer = interval(self.progress_interval);
        progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        progress_timer.tick().await;

        let mut previous: Vec<StatsSnapshot> =
            self.consumers.iter().map(|c| c.stats.snapshot()).collect();
        let mut prev_time = Instant::now();
        let mut finished = false;

        loop {
            tokio::select! {
                results = &mut consumers_done => {
                    log_join_results(results);
                    info!("All consumers stopped");
                    finished = true;
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = progress_timer.tick() => {
                    let now = Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    for (consumer, prev) in self.consumers.iter().zip(previous.iter_mut()) {
                        let current = consumer.stats.snapshot();
                        let per_sec = if elapsed_secs > 0.0 {
                            (current.processed.saturating_sub(prev.processed) as f64) / elapsed_secs
                        } else {
                            0.0
                        };
                        info!(
                            consumer = %consumer.name,
                            processed = current.processed,
                            dropped = current.dropped,
                            requeued = current.requeued,
                            dead_lettered = current.dead_lettered,
                            processed_per_sec = format!("{:.2}", per_sec),
                            "Processing progress"
                        );
                        *prev = current;
                    }
                    prev_time = now;
                }
            }
        }

        if !finished {
            // Subscribers finish their in-flight message before exiting
            log_join_results(consumers_done.await);
        }

        for (name, stats) in self.stats() {
            info!(
                consumer = %name,
                processed = stats.processed,
                dropped = stats.dropped,
                requeued = stats.requeued,
                dead_lettered = stats.dead_lettered,
                "Orchestrator shutdown complete"
            );
        }
        Ok(())
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn log_join_results(results: Vec<Result<(), tokio::task::JoinError>>) {
    for result in results {
        if let Err(e) = result {
            error!(error = %e, "Consumer task failed");
        }
    }
}
