//! Tag names are unique regardless of case.

use std::sync::Arc;

use document_manager::{ErrorKind, ServiceError, TagRequest, TagService};
use document_repository::InMemoryDocumentStore;

#[tokio::test]
async fn test_tag_names_are_case_insensitive() {
    let store = InMemoryDocumentStore::new();
    let service = TagService::new(Arc::new(store.clone()), Arc::new(store));

    let urgent = service.create(TagRequest::new("Urgent")).await.unwrap();
    let duplicate = service.create(TagRequest::new("urgent")).await;

    match duplicate {
        Err(err @ ServiceError::AlreadyExists(_)) => {
            assert_eq!(err.kind(), ErrorKind::ClientError);
        }
        other => panic!("expected AlreadyExists, got {:?}", other),
    }

    let all = service.list_all().await.unwrap();
    assert_eq!(all, vec![urgent]);
}
