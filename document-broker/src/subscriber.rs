//! Subscriber loop shared by the pipeline consumers.
//!
//! The loop pulls one delivery at a time, hands it to a `MessageHandler` and
//! turns the handler's verdict into an ack or a reject. Retry limits live in
//! the transport, so handlers stay stateless.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::transport::{Delivery, RejectDisposition, Subscription};

/// A handler's verdict on one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Work done, acknowledge.
    Processed,
    /// The payload can never be processed; drop it without retrying.
    Malformed(String),
    /// A transient failure; redeliver.
    Retry(String),
    /// Give up on this message; dead-letter it.
    Reject(String),
}

/// Processes deliveries from one queue.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> HandleOutcome;
}

/// Counters maintained by a subscriber loop.
#[derive(Debug, Default)]
pub struct SubscriberStats {
    processed: AtomicU64,
    dropped: AtomicU64,
    requeued: AtomicU64,
    dead_lettered: AtomicU64,
}

/// Point-in-time copy of `SubscriberStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub processed: u64,
    pub dropped: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
}

impl SubscriberStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }

    fn record_rejection(&self, disposition: RejectDisposition) {
        let counter = match disposition {
            RejectDisposition::Requeued => &self.requeued,
            RejectDisposition::DeadLettered => &self.dead_lettered,
            RejectDisposition::Discarded => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Consume a subscription until the transport closes or shutdown is signalled.
///
/// A delivery that is being handled when shutdown arrives is finished and
/// acknowledged before the loop exits.
///
/// # Arguments
///
/// * `name` - Consumer name used in logs
/// * `subscription` - The queue to consume
/// * `handler` - Decides the fate of each delivery
/// * `stats` - Counters updated as deliveries are settled
/// * `shutdown` - Shutdown signal receiver
#[instrument(skip(subscription, handler, stats, shutdown))]
pub async fn run_subscriber(
    name: &str,
    mut subscription: Box<dyn Subscription>,
    handler: Arc<dyn MessageHandler>,
    stats: Arc<SubscriberStats>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("Subscriber started");

    loop {
        let delivery = tokio::select! {
            _ = shutdown.recv() => {
                info!("Subscriber received shutdown signal");
                break;
            }
            delivery = subscription.next() => delivery,
        };

        let Some(delivery) = delivery else {
            info!("Subscription closed");
            break;
        };

        debug!(
            tag = delivery.tag,
            routing_key = %delivery.routing_key,
            delivery_count = delivery.delivery_count,
            "Handling delivery"
        );

        let settled = match handler.handle(&delivery).await {
            HandleOutcome::Processed => {
                let acked = subscription.ack(&delivery).await;
                if acked.is_ok() {
                    stats.processed.fetch_add(1, Ordering::Relaxed);
                }
                acked
            }
            HandleOutcome::Malformed(reason) => {
                warn!(tag = delivery.tag, reason = %reason, "Dropping malformed message");
                let acked = subscription.ack(&delivery).await;
                if acked.is_ok() {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                }
                acked
            }
            HandleOutcome::Retry(reason) => {
                warn!(
                    tag = delivery.tag,
                    delivery_count = delivery.delivery_count,
                    reason = %reason,
                    "Handler failed, requesting redelivery"
                );
                subscription
                    .reject(&delivery, true)
                    .await
                    .map(|disposition| stats.record_rejection(disposition))
            }
            HandleOutcome::Reject(reason) => {
                error!(tag = delivery.tag, reason = %reason, "Handler rejected message");
                subscription
                    .reject(&delivery, false)
                    .await
                    .map(|disposition| stats.record_rejection(disposition))
            }
        };

        // Unsettled deliveries are redelivered by the transport
        if let Err(e) = settled {
            error!(tag = delivery.tag, error = %e, "Failed to settle delivery");
        }
    }

    let final_stats = stats.snapshot();
    info!(
        processed = final_stats.processed,
        dropped = final_stats.dropped,
        requeued = final_stats.requeued,
        dead_lettered = final_stats.dead_lettered,
        "Subscriber stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerTopology;
    use crate::transport::{BrokerTransport, InMemoryBroker};
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct ScriptedHandler {
        outcome: HandleOutcome,
        calls: AtomicUsize,
        seen: Mutex<Vec<Bytes>>,
    }

    impl ScriptedHandler {
        fn new(outcome: HandleOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        async fn handle(&self, delivery: &Delivery) -> HandleOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(delivery.payload.clone());
            self.outcome.clone()
        }
    }

    async fn run_until_idle(
        broker: &InMemoryBroker,
        queue: &str,
        handler: Arc<ScriptedHandler>,
    ) -> StatsSnapshot {
        let subscription = broker.subscribe(queue).await.unwrap();
        let stats = Arc::new(SubscriberStats::default());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(run_subscriber(
            "test",
            subscription,
            handler,
            stats.clone(),
            shutdown_rx,
        ));

        // Let the loop drain what is queued
        for _ in 0..50 {
            tokio::task::yield_now().await;
            if broker.queue_depth(queue) == 0 && broker.in_flight() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let _ = shutdown_tx.send(());
        task.await.unwrap();
        stats.snapshot()
    }

    async fn setup_with_message(payload: &'static str) -> (InMemoryBroker, BrokerTopology) {
        let broker = InMemoryBroker::new();
        let topology = BrokerTopology::default();
        broker.declare_topology(&topology).await.unwrap();
        broker
            .publish(&topology.exchange, &topology.routing_key, Bytes::from(payload))
            .await
            .unwrap();
        (broker, topology)
    }

    #[tokio::test]
    async fn test_processed_is_acked() {
        let (broker, topology) = setup_with_message("ok").await;
        let handler = ScriptedHandler::new(HandleOutcome::Processed);

        let stats = run_until_idle(&broker, &topology.upload_queue, handler.clone()).await;

        assert_eq!(stats.processed, 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(broker.queue_depth(&topology.upload_queue), 0);
        assert_eq!(broker.queue_depth(&topology.dead_letter_queue), 0);
    }

    #[tokio::test]
    async fn test_malformed_is_dropped_not_retried() {
        let (broker, topology) = setup_with_message("{not json").await;
        let handler = ScriptedHandler::new(HandleOutcome::Malformed("bad json".to_string()));

        let stats = run_until_idle(&broker, &topology.upload_queue, handler.clone()).await;

        assert_eq!(stats.dropped, 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(broker.queue_depth(&topology.dead_letter_queue), 0);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts_then_dead_letters() {
        let (broker, topology) = setup_with_message("poison").await;
        let handler = ScriptedHandler::new(HandleOutcome::Retry("backend down".to_string()));

        let stats = run_until_idle(&broker, &topology.upload_queue, handler.clone()).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.requeued, 2);
        assert_eq!(stats.dead_lettered, 1);
        assert_eq!(
            broker.drain(&topology.dead_letter_queue),
            vec![Bytes::from("poison")]
        );
    }

    #[tokio::test]
    async fn test_reject_dead_letters_on_first_attempt() {
        let (broker, topology) = setup_with_message("corrupt").await;
        let handler = ScriptedHandler::new(HandleOutcome::Reject("corrupt".to_string()));

        let stats = run_until_idle(&broker, &topology.upload_queue, handler.clone()).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.dead_lettered, 1);
        assert_eq!(broker.queue_depth(&topology.dead_letter_queue), 1);
    }

    #[tokio::test]
    async fn test_loop_exits_when_transport_closes() {
        let broker = InMemoryBroker::new();
        let topology = BrokerTopology::default();
        broker.declare_topology(&topology).await.unwrap();
        let subscription = broker.subscribe(&topology.upload_queue).await.unwrap();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        broker.close();
        run_subscriber(
            "test",
            subscription,
            ScriptedHandler::new(HandleOutcome::Processed),
            Arc::new(SubscriberStats::default()),
            shutdown_rx,
        )
        .await;
    }
}
