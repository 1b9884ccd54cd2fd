//! Kafka-backed transport.
//!
//! Kafka has no exchanges or queues, so the topology is mapped onto topics:
//!
//! - a routing key is a topic name; publishing to the default exchange uses
//!   the queue name as the topic
//! - a queue consumes the topic its routing key names, in its own consumer group
//! - dead letters are produced to the `<routing_key>.dlq` topic
//!
//! Kafka cannot put a message back, so a requeue produces a copy to the same
//! topic with an incremented `x-delivery-count` header and commits the original.
//! When that copy (or the dead letter) cannot be produced, the consumer is
//! rewound to the original record so it is consumed again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, error, info, warn};

use crate::config::{BrokerTopology, KafkaConfig, DEFAULT_MAX_DELIVERY_ATTEMPTS};
use crate::errors::BrokerError;
use crate::transport::{BrokerTransport, Delivery, RejectDisposition, Subscription};

/// Header carrying how many times a message has been delivered.
const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

/// Upper bound for rewinding a partition after a failed settle.
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Back-off after a consumer error before polling again.
const CONSUMER_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// How a consumed queue maps onto Kafka topics.
#[derive(Debug, Clone)]
struct QueueRoute {
    topic: String,
    dead_letter_topic: Option<String>,
}

/// Broker transport over a Kafka cluster.
pub struct KafkaTransport {
    config: KafkaConfig,
    producer: FutureProducer,
    routes: RwLock<HashMap<String, QueueRoute>>,
    max_delivery_attempts: AtomicU32,
}

impl KafkaTransport {
    /// Create a new Kafka transport.
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaTransport)` - A transport with a connected producer
    /// * `Err(BrokerError)` - If the producer cannot be created
    pub fn new(config: KafkaConfig) -> Result<Self, BrokerError> {
        let producer: FutureProducer = config
            .client_config()
            .set("compression.type", "zstd")
            .set(
                "message.timeout.ms",
                config.publish_timeout.as_millis().to_string(),
            )
            .set("enable.idempotence", "true")
            .create()?;

        info!(brokers = %config.brokers, client_id = %config.client_id, "Created Kafka producer");

        Ok(Self {
            config,
            producer,
            routes: RwLock::new(HashMap::new()),
            max_delivery_attempts: AtomicU32::new(DEFAULT_MAX_DELIVERY_ATTEMPTS),
        })
    }

    fn route_for(&self, queue: &str) -> QueueRoute {
        self.routes
            .read()
            .ok()
            .and_then(|routes| routes.get(queue).cloned())
            .unwrap_or_else(|| QueueRoute {
                topic: queue.to_string(),
                dead_letter_topic: None,
            })
    }

    async fn create_topics(&self, topics: &[&str]) -> Result<(), BrokerError> {
        let admin: AdminClient<DefaultClientContext> = self.config.client_config().create()?;
        let new_topics: Vec<NewTopic<'_>> = topics
            .iter()
            .map(|name| NewTopic::new(name, 1, TopicReplication::Fixed(1)))
            .collect();

        let results = admin
            .create_topics(new_topics.iter(), &AdminOptions::new())
            .await?;

        for result in results {
            match result {
                Ok(topic) => info!(topic = %topic, "Created Kafka topic"),
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!(topic = %topic, "Kafka topic already exists")
                }
                Err((topic, code)) => {
                    return Err(BrokerError::kafka(format!(
                        "Failed to create topic {}: {}",
                        topic, code
                    )))
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerTransport for KafkaTransport {
    async fn declare_topology(&self, topology: &BrokerTopology) -> Result<(), BrokerError> {
        let dead_letter_topic = topology.dead_letter_routing_key();

        self.create_topics(&[
            topology.routing_key.as_str(),
            dead_letter_topic.as_str(),
            topology.summary_queue.as_str(),
        ])
        .await?;

        if let Ok(mut routes) = self.routes.write() {
            routes.insert(
                topology.upload_queue.clone(),
                QueueRoute {
                    topic: topology.routing_key.clone(),
                    dead_letter_topic: Some(dead_letter_topic.clone()),
                },
            );
            routes.insert(
                topology.dead_letter_queue.clone(),
                QueueRoute {
                    topic: dead_letter_topic,
                    dead_letter_topic: None,
                },
            );
            routes.insert(
                topology.summary_queue.clone(),
                QueueRoute {
                    topic: topology.summary_queue.clone(),
                    dead_letter_topic: None,
                },
            );
        }
        self.max_delivery_attempts
            .store(topology.max_delivery_attempts, Ordering::Relaxed);

        info!(
            upload_topic = %topology.routing_key,
            summary_topic = %topology.summary_queue,
            "Declared Kafka topology"
        );
        Ok(())
    }

    async fn publish(
        &self,
        _exchange: &str,
        routing_key: &str,
        payload: Bytes,
    ) -> Result<(), BrokerError> {
        produce(
            &self.producer,
            routing_key,
            &payload,
            1,
            self.config.publish_timeout,
        )
        .await
    }

    async fn subscribe(&self, queue: &str) -> Result<Box<dyn Subscription>, BrokerError> {
        let route = self.route_for(queue);
        let group_id = format!("{}.{}", self.config.group_id, queue);

        let consumer: StreamConsumer = self
            .config
            .client_config()
            .set("group.id", &group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()?;
        consumer.subscribe(&[route.topic.as_str()])?;

        info!(queue = %queue, topic = %route.topic, group_id = %group_id, "Subscribed to Kafka topic");

        Ok(Box::new(KafkaSubscription {
            consumer,
            producer: KafkaRecordProducer {
                producer: self.producer.clone(),
                timeout: self.config.publish_timeout,
            },
            route,
            max_delivery_attempts: self.max_delivery_attempts.load(Ordering::Relaxed),
            pending: HashMap::new(),
            next_tag: 0,
        }))
    }
}

/// Produces requeued copies and dead letters.
#[async_trait]
trait RecordProducer: Send + Sync {
    async fn produce(
        &self,
        topic: &str,
        payload: &[u8],
        delivery_count: u32,
    ) -> Result<(), BrokerError>;
}

/// Moves the consumed position of a partition.
trait OffsetControl: Send + Sync {
    /// Mark everything before `offset` as consumed.
    fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<(), BrokerError>;

    /// Make `offset` the next record returned for the partition.
    fn rewind(&self, topic: &str, partition: i32, offset: i64) -> Result<(), BrokerError>;
}

struct KafkaRecordProducer {
    producer: FutureProducer,
    timeout: Duration,
}

#[async_trait]
impl RecordProducer for KafkaRecordProducer {
    async fn produce(
        &self,
        topic: &str,
        payload: &[u8],
        delivery_count: u32,
    ) -> Result<(), BrokerError> {
        produce(&self.producer, topic, payload, delivery_count, self.timeout).await
    }
}

impl OffsetControl for StreamConsumer {
    fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<(), BrokerError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, Offset::Offset(offset))?;
        Consumer::commit(self, &tpl, CommitMode::Async)?;
        Ok(())
    }

    fn rewind(&self, topic: &str, partition: i32, offset: i64) -> Result<(), BrokerError> {
        Consumer::seek(self, topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)?;
        Ok(())
    }
}

struct KafkaSubscription {
    consumer: StreamConsumer,
    producer: KafkaRecordProducer,
    route: QueueRoute,
    max_delivery_attempts: u32,
    /// Delivery tag to (partition, offset) of the consumed record.
    pending: HashMap<u64, (i32, i64)>,
    next_tag: u64,
}

/// Settle a rejected record: requeue a copy, dead-letter it, or discard it,
/// then commit past it.
///
/// If the copy cannot be produced the partition is rewound to the record, so
/// a later commit can never skip it.
async fn reject_record(
    producer: &dyn RecordProducer,
    offsets: &dyn OffsetControl,
    route: &QueueRoute,
    (partition, offset): (i32, i64),
    delivery: &Delivery,
    requeue: bool,
    max_delivery_attempts: u32,
) -> Result<RejectDisposition, BrokerError> {
    let (target, delivery_count, disposition) =
        if requeue && delivery.delivery_count < max_delivery_attempts {
            (
                Some(route.topic.as_str()),
                delivery.delivery_count + 1,
                RejectDisposition::Requeued,
            )
        } else if let Some(dead_letter_topic) = &route.dead_letter_topic {
            (
                Some(dead_letter_topic.as_str()),
                1,
                RejectDisposition::DeadLettered,
            )
        } else {
            (None, 0, RejectDisposition::Discarded)
        };

    if let Some(topic) = target {
        if let Err(e) = producer
            .produce(topic, &delivery.payload, delivery_count)
            .await
        {
            warn!(
                topic = %route.topic,
                partition,
                offset,
                error = %e,
                "Failed to settle rejected message, rewinding"
            );
            if let Err(seek_error) = offsets.rewind(&route.topic, partition, offset) {
                error!(
                    topic = %route.topic,
                    partition,
                    offset,
                    error = %seek_error,
                    "Failed to rewind consumer"
                );
            }
            return Err(e);
        }
    }

    if disposition == RejectDisposition::DeadLettered {
        warn!(
            topic = %route.topic,
            delivery_count = delivery.delivery_count,
            "Message dead-lettered"
        );
    }

    offsets.commit(&route.topic, partition, offset + 1)?;
    Ok(disposition)
}

#[async_trait]
impl Subscription for KafkaSubscription {
    async fn next(&mut self) -> Option<Delivery> {
        loop {
            let error = match self.consumer.recv().await {
                Ok(msg) => {
                    let delivery_count = msg
                        .headers()
                        .and_then(|headers| {
                            headers
                                .iter()
                                .find(|h| h.key == DELIVERY_COUNT_HEADER)
                                .and_then(|h| h.value)
                                .and_then(|v| std::str::from_utf8(v).ok())
                                .and_then(|s| s.parse::<u32>().ok())
                        })
                        .unwrap_or(1);

                    self.next_tag += 1;
                    let tag = self.next_tag;
                    self.pending.insert(tag, (msg.partition(), msg.offset()));

                    debug!(
                        topic = %msg.topic(),
                        partition = msg.partition(),
                        offset = msg.offset(),
                        delivery_count = delivery_count,
                        "Received message from Kafka"
                    );

                    return Some(Delivery {
                        tag,
                        payload: Bytes::copy_from_slice(msg.payload().unwrap_or(&[])),
                        routing_key: msg.topic().to_string(),
                        delivery_count,
                    });
                }
                Err(e) => e,
            };

            error!(topic = %self.route.topic, error = %error, "Kafka error");
            tokio::time::sleep(CONSUMER_ERROR_BACKOFF).await;
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BrokerError> {
        let (partition, offset) = self
            .pending
            .remove(&delivery.tag)
            .ok_or(BrokerError::UnknownDelivery(delivery.tag))?;
        OffsetControl::commit(&self.consumer, &self.route.topic, partition, offset + 1)
    }

    async fn reject(
        &mut self,
        delivery: &Delivery,
        requeue: bool,
    ) -> Result<RejectDisposition, BrokerError> {
        let position = self
            .pending
            .remove(&delivery.tag)
            .ok_or(BrokerError::UnknownDelivery(delivery.tag))?;

        reject_record(
            &self.producer,
            &self.consumer,
            &self.route,
            position,
            delivery,
            requeue,
            self.max_delivery_attempts,
        )
        .await
    }
}

async fn produce(
    producer: &FutureProducer,
    topic: &str,
    payload: &[u8],
    delivery_count: u32,
    timeout: Duration,
) -> Result<(), BrokerError> {
    let count = delivery_count.to_string();
    let record = FutureRecord::<(), [u8]>::to(topic)
        .payload(payload)
        .headers(OwnedHeaders::new().insert(Header {
            key: DELIVERY_COUNT_HEADER,
            value: Some(count.as_str()),
        }));

    producer
        .send(record, Timeout::After(timeout))
        .await
        .map_err(|(e, _)| BrokerError::kafka(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockProducer {
        should_fail: AtomicBool,
        produced: Mutex<Vec<(String, u32)>>,
    }

    #[async_trait]
    impl RecordProducer for MockProducer {
        async fn produce(
            &self,
            topic: &str,
            _payload: &[u8],
            delivery_count: u32,
        ) -> Result<(), BrokerError> {
            if self.should_fail.load(Ordering::SeqCst) {
                return Err(BrokerError::kafka("Mock failure"));
            }
            self.produced
                .lock()
                .unwrap()
                .push((topic.to_string(), delivery_count));
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockOffsets {
        commits: Mutex<Vec<(i32, i64)>>,
        rewinds: Mutex<Vec<(i32, i64)>>,
    }

    impl OffsetControl for MockOffsets {
        fn commit(&self, _topic: &str, partition: i32, offset: i64) -> Result<(), BrokerError> {
            self.commits.lock().unwrap().push((partition, offset));
            Ok(())
        }

        fn rewind(&self, _topic: &str, partition: i32, offset: i64) -> Result<(), BrokerError> {
            self.rewinds.lock().unwrap().push((partition, offset));
            Ok(())
        }
    }

    fn upload_route() -> QueueRoute {
        QueueRoute {
            topic: "document.uploaded".to_string(),
            dead_letter_topic: Some("document.uploaded.dlq".to_string()),
        }
    }

    fn delivery(delivery_count: u32) -> Delivery {
        Delivery {
            tag: 1,
            payload: Bytes::from("event"),
            routing_key: "document.uploaded".to_string(),
            delivery_count,
        }
    }

    #[tokio::test]
    async fn test_requeue_produces_copy_and_commits() {
        let producer = MockProducer::default();
        let offsets = MockOffsets::default();

        let disposition = reject_record(
            &producer,
            &offsets,
            &upload_route(),
            (0, 5),
            &delivery(1),
            true,
            3,
        )
        .await
        .unwrap();

        assert_eq!(disposition, RejectDisposition::Requeued);
        assert_eq!(
            *producer.produced.lock().unwrap(),
            vec![("document.uploaded".to_string(), 2)]
        );
        assert_eq!(*offsets.commits.lock().unwrap(), vec![(0, 6)]);
        assert!(offsets.rewinds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_attempt_goes_to_dead_letter_topic() {
        let producer = MockProducer::default();
        let offsets = MockOffsets::default();

        let disposition = reject_record(
            &producer,
            &offsets,
            &upload_route(),
            (0, 5),
            &delivery(3),
            true,
            3,
        )
        .await
        .unwrap();

        assert_eq!(disposition, RejectDisposition::DeadLettered);
        assert_eq!(
            *producer.produced.lock().unwrap(),
            vec![("document.uploaded.dlq".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_failed_requeue_rewinds_instead_of_committing() {
        let producer = MockProducer::default();
        producer.should_fail.store(true, Ordering::SeqCst);
        let offsets = MockOffsets::default();

        let result = reject_record(
            &producer,
            &offsets,
            &upload_route(),
            (2, 5),
            &delivery(1),
            true,
            3,
        )
        .await;

        assert!(result.is_err());
        assert!(offsets.commits.lock().unwrap().is_empty());
        assert_eq!(*offsets.rewinds.lock().unwrap(), vec![(2, 5)]);
    }

    #[tokio::test]
    async fn test_failed_dead_letter_rewinds_instead_of_committing() {
        let producer = MockProducer::default();
        producer.should_fail.store(true, Ordering::SeqCst);
        let offsets = MockOffsets::default();

        let result = reject_record(
            &producer,
            &offsets,
            &upload_route(),
            (0, 9),
            &delivery(1),
            false,
            3,
        )
        .await;

        assert!(result.is_err());
        assert!(offsets.commits.lock().unwrap().is_empty());
        assert_eq!(*offsets.rewinds.lock().unwrap(), vec![(0, 9)]);
    }

    #[tokio::test]
    async fn test_reject_without_dead_letter_topic_discards() {
        let producer = MockProducer::default();
        let offsets = MockOffsets::default();
        let route = QueueRoute {
            topic: "summary-results".to_string(),
            dead_letter_topic: None,
        };

        let disposition = reject_record(&producer, &offsets, &route, (0, 1), &delivery(1), false, 3)
            .await
            .unwrap();

        assert_eq!(disposition, RejectDisposition::Discarded);
        assert!(producer.produced.lock().unwrap().is_empty());
        assert_eq!(*offsets.commits.lock().unwrap(), vec![(0, 2)]);
    }
}
