//! Summary consumer: stores summaries and mirrors them into the index.

use std::sync::Arc;

use async_trait::async_trait;
use document_broker::{Delivery, HandleOutcome, MessageHandler};
use document_manager::{DocumentService, ServiceError};
use document_search::SearchIndexProvider;
use document_shared::SummaryMessage;
use tracing::{debug, info, instrument};

pub struct SummaryHandler {
    documents: Arc<DocumentService>,
    index: Arc<dyn SearchIndexProvider>,
}

impl SummaryHandler {
    pub fn new(documents: Arc<DocumentService>, index: Arc<dyn SearchIndexProvider>) -> Self {
        Self { documents, index }
    }
}

#[async_trait]
impl MessageHandler for SummaryHandler {
    #[instrument(skip(self, delivery), fields(delivery_count = delivery.delivery_count))]
    async fn handle(&self, delivery: &Delivery) -> HandleOutcome {
        let message: SummaryMessage = match serde_json::from_slice(&delivery.payload) {
            Ok(message) => message,
            Err(e) => return HandleOutcome::Malformed(format!("invalid summary message: {}", e)),
        };
        let id = match message.document_uuid() {
            Ok(id) => id,
            Err(e) => {
                return HandleOutcome::Malformed(format!(
                    "invalid document id '{}': {}",
                    message.document_id, e
                ))
            }
        };

        // Summaries of deleted documents must not recreate index entries
        match self.documents.get(id).await {
            Ok(_) => {}
            Err(ServiceError::NotFound(_)) => {
                info!(document_id = %id, "Skipping summary for deleted document");
                return HandleOutcome::Processed;
            }
            Err(e) => return HandleOutcome::Retry(format!("loading document: {}", e)),
        }

        if let Err(e) = self.documents.save_summary(id, &message.summary).await {
            return HandleOutcome::Retry(format!("saving summary: {}", e));
        }

        if let Err(e) = self.index.update_summary(id, &message.summary).await {
            return HandleOutcome::Retry(format!("indexing summary: {}", e));
        }

        debug!(document_id = %id, "Summary applied");
        HandleOutcome::Processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use document_broker::{BrokerTopology, EventPublisher, InMemoryBroker};
    use document_manager::UploadRequest;
    use document_repository::InMemoryDocumentStore;
    use document_search::InMemorySearchIndex;
    use document_storage::ObjectStoreStorage;
    use uuid::Uuid;

    fn setup() -> (SummaryHandler, Arc<DocumentService>, InMemorySearchIndex) {
        let store = InMemoryDocumentStore::new();
        let service = Arc::new(DocumentService::new(
            Arc::new(store),
            Arc::new(ObjectStoreStorage::in_memory()),
            EventPublisher::new(Arc::new(InMemoryBroker::new()), &BrokerTopology::default()),
        ));
        let index = InMemorySearchIndex::new();
        let handler = SummaryHandler::new(service.clone(), Arc::new(index.clone()));
        (handler, service, index)
    }

    fn delivery(message: &SummaryMessage) -> Delivery {
        Delivery {
            tag: 1,
            payload: Bytes::from(serde_json::to_vec(message).unwrap()),
            routing_key: "summary-results".into(),
            delivery_count: 1,
        }
    }

    #[tokio::test]
    async fn test_summary_is_saved_and_indexed_idempotently() {
        let (handler, service, index) = setup();
        let document = service
            .upload(UploadRequest::new("hello", "a.txt", "text/plain"))
            .await
            .unwrap();
        let message = SummaryMessage::new(document.id, "greeting");

        assert_eq!(handler.handle(&delivery(&message)).await, HandleOutcome::Processed);
        assert_eq!(handler.handle(&delivery(&message)).await, HandleOutcome::Processed);

        let saved = service.get(document.id).await.unwrap();
        assert_eq!(saved.summary.as_deref(), Some("greeting"));
        assert_eq!(
            index.get(document.id).await.unwrap().summary.as_deref(),
            Some("greeting")
        );
    }

    #[tokio::test]
    async fn test_summary_for_deleted_document_is_skipped() {
        let (handler, _, index) = setup();
        let message = SummaryMessage::new(Uuid::new_v4(), "stale");

        assert_eq!(handler.handle(&delivery(&message)).await, HandleOutcome::Processed);
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_summary_is_dropped() {
        let (handler, _, _) = setup();
        let outcome = handler
            .handle(&Delivery {
                tag: 1,
                payload: Bytes::from_static(b"{}"),
                routing_key: "summary-results".into(),
                delivery_count: 1,
            })
            .await;
        assert!(matches!(outcome, HandleOutcome::Malformed(_)));
    }
}
