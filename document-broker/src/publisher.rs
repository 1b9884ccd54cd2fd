//! Publishers for the pipeline's two message types.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use document_shared::{SummaryMessage, UploadEvent};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::config::BrokerTopology;
use crate::errors::PublishError;
use crate::transport::{BrokerTransport, DEFAULT_EXCHANGE};

/// Default time to wait for the broker to accept a message.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

async fn publish_json<T: Serialize>(
    transport: &dyn BrokerTransport,
    exchange: &str,
    routing_key: &str,
    message: &T,
    timeout: Duration,
) -> Result<(), PublishError> {
    let payload = Bytes::from(serde_json::to_vec(message)?);

    match tokio::time::timeout(timeout, transport.publish(exchange, routing_key, payload)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PublishError::from(e)),
        Err(_) => Err(PublishError::failed(format!(
            "broker did not acknowledge within {:?}",
            timeout
        ))),
    }
}

/// Publishes `UploadEvent`s to the upload exchange.
#[derive(Clone)]
pub struct EventPublisher {
    transport: Arc<dyn BrokerTransport>,
    exchange: String,
    routing_key: String,
    timeout: Duration,
}

impl EventPublisher {
    pub fn new(transport: Arc<dyn BrokerTransport>, topology: &BrokerTopology) -> Self {
        Self {
            transport,
            exchange: topology.exchange.clone(),
            routing_key: topology.routing_key.clone(),
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Publish an upload event and wait for the broker to accept it.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The broker accepted the event
    /// * `Err(PublishError::PublishFailed)` - The broker refused it or timed out
    #[instrument(skip(self, event), fields(document_id = %event.document_id))]
    pub async fn publish(&self, event: &UploadEvent) -> Result<(), PublishError> {
        let result = publish_json(
            self.transport.as_ref(),
            &self.exchange,
            &self.routing_key,
            event,
            self.timeout,
        )
        .await;

        match &result {
            Ok(()) => debug!(
                exchange = %self.exchange,
                routing_key = %self.routing_key,
                "Published upload event"
            ),
            Err(e) => error!(error = %e, "Failed to publish upload event"),
        }
        result
    }
}

/// Publishes `SummaryMessage`s straight to the summary queue.
#[derive(Clone)]
pub struct SummaryPublisher {
    transport: Arc<dyn BrokerTransport>,
    queue: String,
    timeout: Duration,
}

impl SummaryPublisher {
    pub fn new(transport: Arc<dyn BrokerTransport>, topology: &BrokerTopology) -> Self {
        Self {
            transport,
            queue: topology.summary_queue.clone(),
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn publish(&self, message: &SummaryMessage) -> Result<(), PublishError> {
        publish_json(
            self.transport.as_ref(),
            DEFAULT_EXCHANGE,
            &self.queue,
            message,
            self.timeout,
        )
        .await?;

        debug!(document_id = %message.document_id, queue = %self.queue, "Published summary");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BrokerError;
    use crate::transport::{InMemoryBroker, Subscription};
    use async_trait::async_trait;
    use document_shared::Document;
    use uuid::Uuid;

    struct SlowTransport;

    #[async_trait]
    impl BrokerTransport for SlowTransport {
        async fn declare_topology(&self, _: &BrokerTopology) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn publish(&self, _: &str, _: &str, _: Bytes) -> Result<(), BrokerError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn subscribe(&self, queue: &str) -> Result<Box<dyn Subscription>, BrokerError> {
            Err(BrokerError::UnknownQueue(queue.to_string()))
        }
    }

    fn event() -> UploadEvent {
        let document = Document::new(
            Uuid::new_v4(),
            "report.pdf",
            "application/pdf",
            10,
            "alice",
            "key",
        );
        UploadEvent::from_document(&document)
    }

    #[tokio::test]
    async fn test_publish_upload_event_as_json() {
        let broker = InMemoryBroker::new();
        let topology = BrokerTopology::default();
        broker.declare_topology(&topology).await.unwrap();

        let publisher = EventPublisher::new(Arc::new(broker.clone()), &topology);
        let event = event();
        publisher.publish(&event).await.unwrap();

        let payloads = broker.drain(&topology.upload_queue);
        assert_eq!(payloads.len(), 1);
        let decoded: UploadEvent = serde_json::from_slice(&payloads[0]).unwrap();
        assert_eq!(decoded, event);
    }

    #[tokio::test]
    async fn test_publish_to_undeclared_exchange_fails() {
        let publisher =
            EventPublisher::new(Arc::new(InMemoryBroker::new()), &BrokerTopology::default());
        let result = publisher.publish(&event()).await;
        assert!(matches!(result, Err(PublishError::PublishFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_times_out() {
        let publisher = EventPublisher::new(Arc::new(SlowTransport), &BrokerTopology::default())
            .with_timeout(Duration::from_millis(100));
        let result = publisher.publish(&event()).await;
        assert!(matches!(result, Err(PublishError::PublishFailed(_))));
    }

    #[tokio::test]
    async fn test_summary_goes_to_summary_queue() {
        let broker = InMemoryBroker::new();
        let topology = BrokerTopology::default();
        broker.declare_topology(&topology).await.unwrap();

        let publisher = SummaryPublisher::new(Arc::new(broker.clone()), &topology);
        let id = Uuid::new_v4();
        publisher
            .publish(&SummaryMessage::new(id, "short".to_string()))
            .await
            .unwrap();

        let payloads = broker.drain(&topology.summary_queue);
        let decoded: SummaryMessage = serde_json::from_slice(&payloads[0]).unwrap();
        assert_eq!(decoded.document_uuid().unwrap(), id);
        assert_eq!(decoded.summary, "short");
    }
}
