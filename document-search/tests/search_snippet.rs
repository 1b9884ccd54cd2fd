//! Query path against the in-memory index: indexed text is found and the
//! snippet comes back without markup.

use std::sync::Arc;

use document_search::{InMemorySearchIndex, SearchConfig, SearchIndexProvider, SearchService};
use document_shared::{Document, IndexedDocument};
use uuid::Uuid;

#[tokio::test]
async fn test_invoice_search_returns_clean_snippet() {
    let index = InMemorySearchIndex::new();
    let invoice = Document::new(
        Uuid::new_v4(),
        "march.txt",
        "text/plain",
        64,
        "alice",
        "key-1",
    );
    let other = Document::new(
        Uuid::new_v4(),
        "notes.txt",
        "text/plain",
        32,
        "alice",
        "key-2",
    );
    index
        .index_document(&IndexedDocument::from_document(
            &invoice,
            "Please pay the attached invoice before the end of March.",
        ))
        .await
        .unwrap();
    index
        .index_document(&IndexedDocument::from_document(&other, "Meeting notes"))
        .await
        .unwrap();

    let service = SearchService::new(Arc::new(index), SearchConfig::default());
    let results = service.search("invoice").await.unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.id, Some(invoice.id));
    assert_eq!(result.filename, "march.txt");
    assert!(result.snippet.contains("invoice"));
    assert!(!result.snippet.contains('<'));
    assert!(!result.snippet.contains('>'));
    assert!(result.score > 0.0);
}

#[tokio::test]
async fn test_summary_only_match_uses_summary() {
    let index = InMemorySearchIndex::new();
    let id = Uuid::new_v4();
    index
        .update_summary(id, "Quarterly revenue overview")
        .await
        .unwrap();

    let service = SearchService::new(Arc::new(index), SearchConfig::default());
    let results = service.search("revenue").await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, Some(id));
    assert_eq!(results[0].snippet, "Quarterly revenue overview");
}
