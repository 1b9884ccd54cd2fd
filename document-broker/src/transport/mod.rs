//! Broker transport abstraction.
//!
//! A transport is a durable publish/subscribe service with AMQP-style
//! addressing: messages are published to an exchange with a routing key and
//! consumed from queues. The transport owns the poison-message policy, so a
//! consumer only ever says "ack", "try again" or "give up".

mod kafka;
mod memory;

pub use kafka::KafkaTransport;
pub use memory::{ExchangeKind, InMemoryBroker};

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::BrokerTopology;
use crate::errors::BrokerError;

/// Name of the default exchange, which routes by queue name.
pub const DEFAULT_EXCHANGE: &str = "";

/// A message handed to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Transport-assigned tag used to ack or reject this delivery.
    pub tag: u64,
    pub payload: Bytes,
    pub routing_key: String,
    /// 1 on first delivery, incremented on every requeue.
    pub delivery_count: u32,
}

/// What happened to a rejected delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectDisposition {
    /// Put back on its queue for another attempt.
    Requeued,
    /// Routed to the dead-letter exchange.
    DeadLettered,
    /// Dropped because its queue has no dead-letter exchange.
    Discarded,
}

/// A durable publish/subscribe transport.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Declare the exchanges, queues and bindings of the pipeline.
    ///
    /// Declaring the same topology twice is a no-op.
    async fn declare_topology(&self, topology: &BrokerTopology) -> Result<(), BrokerError>;

    /// Publish a message. Resolves once the broker has accepted it.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Bytes,
    ) -> Result<(), BrokerError>;

    /// Start consuming from a queue.
    async fn subscribe(&self, queue: &str) -> Result<Box<dyn Subscription>, BrokerError>;
}

/// A consumer attached to one queue.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next delivery. Returns `None` once the transport is closed.
    async fn next(&mut self) -> Option<Delivery>;

    /// Acknowledge a delivery; it will not be seen again.
    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BrokerError>;

    /// Reject a delivery.
    ///
    /// With `requeue` set the message is redelivered unless it has already
    /// been delivered `max_delivery_attempts` times, in which case it is
    /// dead-lettered like a rejection without requeue.
    async fn reject(
        &mut self,
        delivery: &Delivery,
        requeue: bool,
    ) -> Result<RejectDisposition, BrokerError>;
}
