//! Error types for the broker transport and publishers.

use thiserror::Error;

/// Errors raised by a broker transport.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Kafka client or delivery error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// Publish to an exchange that was never declared.
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    /// Subscribe to a queue that was never declared.
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// Ack or reject of a delivery tag that is not in flight.
    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(u64),

    /// The transport has been closed.
    #[error("Transport closed")]
    Closed,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl BrokerError {
    /// Create a Kafka error.
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<rdkafka::error::KafkaError> for BrokerError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}

/// Errors raised while publishing a pipeline message.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The broker did not accept the message in time or refused it.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PublishError {
    /// Create a publish failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::PublishFailed(msg.into())
    }
}

impl From<BrokerError> for PublishError {
    fn from(err: BrokerError) -> Self {
        Self::PublishFailed(err.to_string())
    }
}
