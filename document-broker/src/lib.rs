//! # Document Broker
//!
//! Durable publish/subscribe plumbing for the document pipeline.
//!
//! ## Components
//!
//! - **Transport**: `BrokerTransport`/`Subscription` with Kafka and in-memory implementations
//! - **Publishers**: `EventPublisher` for upload events, `SummaryPublisher` for summaries
//! - **Subscriber**: `run_subscriber` drives a `MessageHandler` and settles deliveries
//!
//! ## Delivery guarantees
//!
//! Delivery is at-least-once. A message whose handler asks for a retry is
//! redelivered until it has been delivered `max_delivery_attempts` times, after
//! which it is routed to the dead-letter queue.

pub mod config;
pub mod errors;
pub mod publisher;
pub mod subscriber;
pub mod transport;

pub use config::{BrokerTopology, KafkaConfig, DEFAULT_MAX_DELIVERY_ATTEMPTS};
pub use errors::{BrokerError, PublishError};
pub use publisher::{EventPublisher, SummaryPublisher, DEFAULT_PUBLISH_TIMEOUT};
pub use subscriber::{run_subscriber, HandleOutcome, MessageHandler, StatsSnapshot, SubscriberStats};
pub use transport::{
    BrokerTransport, Delivery, ExchangeKind, InMemoryBroker, KafkaTransport, RejectDisposition,
    Subscription, DEFAULT_EXCHANGE,
};
