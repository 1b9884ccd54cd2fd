//! Upload consumer: extracts, persists, indexes and summarizes new content.

use std::sync::Arc;

use async_trait::async_trait;
use document_broker::{Delivery, HandleOutcome, MessageHandler, SummaryPublisher};
use document_repository::DocumentRepository;
use document_search::SearchIndexProvider;
use document_shared::{ocr_text_key, IndexedDocument, SummaryMessage, UploadEvent};
use document_storage::ObjectStorage;
use tracing::{debug, info, instrument, warn};

use crate::errors::ExtractionError;
use crate::extract::{Summarizer, TextExtractor, FALLBACK_SUMMARY};

const TEXT_CONTENT_TYPE: &str = "text/plain";

pub struct UploadHandler {
    documents: Arc<dyn DocumentRepository>,
    storage: Arc<dyn ObjectStorage>,
    index: Arc<dyn SearchIndexProvider>,
    summarizer: Arc<dyn Summarizer>,
    summaries: SummaryPublisher,
    extractor: TextExtractor,
    persist_text: bool,
}

impl UploadHandler {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        storage: Arc<dyn ObjectStorage>,
        index: Arc<dyn SearchIndexProvider>,
        summarizer: Arc<dyn Summarizer>,
        summaries: SummaryPublisher,
    ) -> Self {
        Self {
            documents,
            storage,
            index,
            summarizer,
            summaries,
            extractor: TextExtractor::new(),
            persist_text: true,
        }
    }

    /// Whether extracted text is written to `ocr/<id>.txt`.
    pub fn with_persist_text(mut self, persist_text: bool) -> Self {
        self.persist_text = persist_text;
        self
    }
}

#[async_trait]
impl MessageHandler for UploadHandler {
    #[instrument(skip(self, delivery), fields(delivery_count = delivery.delivery_count))]
    async fn handle(&self, delivery: &Delivery) -> HandleOutcome {
        let event: UploadEvent = match serde_json::from_slice(&delivery.payload) {
            Ok(event) => event,
            Err(e) => return HandleOutcome::Malformed(format!("invalid upload event: {}", e)),
        };
        let id = match event.document_uuid() {
            Ok(id) => id,
            Err(e) => {
                return HandleOutcome::Malformed(format!(
                    "invalid document id '{}': {}",
                    event.document_id, e
                ))
            }
        };

        let document = match self.documents.find_by_id(id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                info!(document_id = %id, "Skipping upload event for deleted document");
                return HandleOutcome::Processed;
            }
            Err(e) => return HandleOutcome::Retry(format!("repository: {}", e)),
        };

        let content = match self.storage.load(&document.storage_key).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                info!(
                    document_id = %id,
                    storage_key = %document.storage_key,
                    "Skipping upload event; content no longer stored"
                );
                return HandleOutcome::Processed;
            }
            Err(e) => return HandleOutcome::Retry(format!("storage: {}", e)),
        };

        let text = match self.extractor.extract(&document.content_type, content).await {
            Ok(text) => text,
            Err(ExtractionError::Corrupt(reason)) => {
                return HandleOutcome::Reject(format!("corrupt document {}: {}", id, reason))
            }
            Err(e) => return HandleOutcome::Retry(e.to_string()),
        };

        if self.persist_text {
            let bytes = bytes::Bytes::from(text.clone());
            let size = bytes.len() as u64;
            if let Err(e) = self
                .storage
                .store(bytes, size, TEXT_CONTENT_TYPE, &ocr_text_key(id))
                .await
            {
                return HandleOutcome::Retry(format!("storing extracted text: {}", e));
            }
        }

        if let Err(e) = self
            .index
            .index_document(&IndexedDocument::from_document(&document, text.as_str()))
            .await
        {
            return HandleOutcome::Retry(format!("search index: {}", e));
        }

        if text.trim().is_empty() {
            debug!(document_id = %id, "No text extracted; nothing to summarize");
            return HandleOutcome::Processed;
        }

        let summary = match self.summarizer.summarize(&text).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(document_id = %id, error = %e, "Summarizer failed; publishing fallback");
                FALLBACK_SUMMARY.to_string()
            }
        };

        if let Err(e) = self.summaries.publish(&SummaryMessage::new(id, summary)).await {
            return HandleOutcome::Retry(format!("publishing summary: {}", e));
        }

        info!(document_id = %id, text_chars = text.len(), "Document processed");
        HandleOutcome::Processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SummarizeError;
    use bytes::Bytes;
    use document_broker::{BrokerTopology, BrokerTransport, InMemoryBroker};
    use document_repository::InMemoryDocumentStore;
    use document_search::InMemorySearchIndex;
    use document_shared::{storage_key, Document};
    use document_storage::ObjectStoreStorage;
    use uuid::Uuid;

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _: &str) -> Result<String, SummarizeError> {
            Err(SummarizeError::Unavailable("Mock failure".into()))
        }
    }

    struct Fixture {
        handler: UploadHandler,
        store: InMemoryDocumentStore,
        storage: Arc<ObjectStoreStorage>,
        index: InMemorySearchIndex,
        broker: InMemoryBroker,
        topology: BrokerTopology,
    }

    async fn fixture(summarizer: Arc<dyn Summarizer>) -> Fixture {
        let store = InMemoryDocumentStore::new();
        let storage = Arc::new(ObjectStoreStorage::in_memory());
        let index = InMemorySearchIndex::new();
        let broker = InMemoryBroker::new();
        let topology = BrokerTopology::default();
        broker.declare_topology(&topology).await.unwrap();

        let handler = UploadHandler::new(
            Arc::new(store.clone()),
            storage.clone(),
            Arc::new(index.clone()),
            summarizer,
            SummaryPublisher::new(Arc::new(broker.clone()), &topology),
        );
        Fixture {
            handler,
            store,
            storage,
            index,
            broker,
            topology,
        }
    }

    async fn stored(f: &Fixture, content: &'static str, content_type: &str) -> Document {
        let id = Uuid::new_v4();
        let document = Document::new(
            id,
            "a.txt",
            content_type,
            content.len() as i64,
            "alice",
            storage_key(id, "a.txt"),
        );
        f.storage
            .store(
                Bytes::from(content),
                content.len() as u64,
                content_type,
                &document.storage_key,
            )
            .await
            .unwrap();
        f.store.insert(&document).await.unwrap();
        document
    }

    fn delivery(payload: Vec<u8>) -> Delivery {
        Delivery {
            tag: 1,
            payload: Bytes::from(payload),
            routing_key: "document.uploaded".into(),
            delivery_count: 1,
        }
    }

    fn event_delivery(document: &Document) -> Delivery {
        delivery(serde_json::to_vec(&UploadEvent::from_document(document)).unwrap())
    }

    fn summaries(f: &Fixture) -> Vec<SummaryMessage> {
        f.broker
            .drain(&f.topology.summary_queue)
            .iter()
            .map(|payload| serde_json::from_slice(payload).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_text_document_is_indexed_and_summarized() {
        let f = fixture(Arc::new(crate::extract::ExtractiveSummarizer::default())).await;
        let document = stored(&f, "The invoice is due. Pay soon.", "text/plain").await;

        let outcome = f.handler.handle(&event_delivery(&document)).await;

        assert_eq!(outcome, HandleOutcome::Processed);
        let entry = f.index.get(document.id).await.unwrap();
        assert_eq!(entry.text, "The invoice is due. Pay soon.");
        assert_eq!(
            f.storage.load(&ocr_text_key(document.id)).await.unwrap(),
            Some(Bytes::from("The invoice is due. Pay soon."))
        );
        assert_eq!(
            summaries(&f),
            vec![SummaryMessage::new(
                document.id,
                "The invoice is due. Pay soon."
            )]
        );
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_dropped() {
        let f = fixture(Arc::new(crate::extract::ExtractiveSummarizer::default())).await;

        let outcome = f.handler.handle(&delivery(b"not json".to_vec())).await;
        assert!(matches!(outcome, HandleOutcome::Malformed(_)));

        let bad_id = br#"{"documentId":"nope","filename":"a","contentType":null,"size":1,"uploadedAt":"2024-01-01T00:00:00Z","uploadedBy":"x"}"#;
        let outcome = f.handler.handle(&delivery(bad_id.to_vec())).await;
        assert!(matches!(outcome, HandleOutcome::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unknown_document_is_acked() {
        let f = fixture(Arc::new(crate::extract::ExtractiveSummarizer::default())).await;
        let ghost = Document::new(Uuid::new_v4(), "a.txt", "text/plain", 1, "alice", "key");

        let outcome = f.handler.handle(&event_delivery(&ghost)).await;

        assert_eq!(outcome, HandleOutcome::Processed);
        assert!(f.index.is_empty().await);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_rejected() {
        let f = fixture(Arc::new(crate::extract::ExtractiveSummarizer::default())).await;
        let document = stored(&f, "garbage", "application/pdf").await;

        let outcome = f.handler.handle(&event_delivery(&document)).await;

        assert!(matches!(outcome, HandleOutcome::Reject(_)));
    }

    #[tokio::test]
    async fn test_empty_text_publishes_no_summary() {
        let f = fixture(Arc::new(crate::extract::ExtractiveSummarizer::default())).await;
        let document = stored(&f, "PNG", "image/png").await;

        let outcome = f.handler.handle(&event_delivery(&document)).await;

        assert_eq!(outcome, HandleOutcome::Processed);
        assert!(f.index.get(document.id).await.is_some());
        assert!(summaries(&f).is_empty());
    }

    #[tokio::test]
    async fn test_summarizer_failure_publishes_fallback() {
        let f = fixture(Arc::new(FailingSummarizer)).await;
        let document = stored(&f, "some text", "text/plain").await;

        let outcome = f.handler.handle(&event_delivery(&document)).await;

        assert_eq!(outcome, HandleOutcome::Processed);
        assert_eq!(
            summaries(&f),
            vec![SummaryMessage::new(document.id, FALLBACK_SUMMARY)]
        );
    }
}
