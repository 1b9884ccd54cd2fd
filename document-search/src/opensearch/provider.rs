//! OpenSearch provider implementation.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use document_shared::IndexedDocument;
use opensearch::{
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    DeleteParts, OpenSearch, SearchParts, UpdateParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::{get_index_settings, get_search_body};
use crate::types::{SearchHit, SearchQuery};

/// OpenSearch provider implementation.
///
/// Every call is bounded by the configured timeout.
///
/// # Example
///
/// ```ignore
/// let provider = OpenSearchProvider::new(&SearchConfig::from_env())?;
/// provider.ensure_index_exists().await?;
/// provider.index_document(&IndexedDocument::from_document(&doc, text)).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    index_name: String,
    timeout: Duration,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider for the configured URL and index.
    ///
    /// No request is sent; connectivity is checked by `ensure_index_exists`.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %config.url,
            index = %config.index_name,
            "Created OpenSearch provider"
        );

        Ok(Self {
            client,
            index_name: config.index_name.clone(),
            timeout: config.timeout,
        })
    }

    async fn bounded<F>(&self, request: F) -> Result<Response, SearchIndexError>
    where
        F: Future<Output = Result<Response, opensearch::Error>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(|e| SearchIndexError::connection(e.to_string())),
            Err(_) => Err(SearchIndexError::Timeout(self.timeout)),
        }
    }

    async fn upsert(&self, doc_id: &str, doc: Value) -> Result<(), SearchIndexError> {
        let response = self
            .bounded(
                self.client
                    .update(UpdateParts::IndexId(&self.index_name, doc_id))
                    .body(json!({
                        "doc": doc,
                        "doc_as_upsert": true
                    }))
                    .send(),
            )
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Update request failed");
            return Err(SearchIndexError::update(format!(
                "Update failed with status {}: {}",
                status, error_body
            )));
        }

        Ok(())
    }
}

/// Convert one element of `hits.hits` into a `SearchHit`.
fn parse_hit(hit: &Value) -> SearchHit {
    let source = hit.get("_source").and_then(|source| {
        serde_json::from_value::<IndexedDocument>(source.clone())
            .map_err(|e| warn!(error = %e, "Ignoring unreadable hit source"))
            .ok()
    });

    let highlights = hit
        .get("highlight")
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(field, fragments)| {
                    let fragments = fragments
                        .as_array()
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    (field.clone(), fragments)
                })
                .collect()
        })
        .unwrap_or_default();

    SearchHit {
        key: hit
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        score: hit.get("_score").and_then(Value::as_f64),
        source,
        highlights,
    }
}

/// Extract hits from a search response body.
pub(crate) fn parse_search_response(body: &Value) -> Result<Vec<SearchHit>, SearchIndexError> {
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchIndexError::parse("Response has no hits array"))?;
    Ok(hits.iter().map(parse_hit).collect())
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        let response = self
            .bounded(
                self.client
                    .indices()
                    .exists(IndicesExistsParts::Index(&[self.index_name.as_str()]))
                    .send(),
            )
            .await?;

        if response.status_code().is_success() {
            debug!(index = %self.index_name, "Index already exists");
            return Ok(());
        }

        let response = self
            .bounded(
                self.client
                    .indices()
                    .create(IndicesCreateParts::Index(&self.index_name))
                    .body(get_index_settings())
                    .send(),
            )
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Another instance may have created it between the two calls
            if error_body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            error!(status = %status, body = %error_body, "Index creation failed");
            return Err(SearchIndexError::index_creation(format!(
                "Index creation failed with status {}: {}",
                status, error_body
            )));
        }

        info!(index = %self.index_name, "Created search index");
        Ok(())
    }

    async fn index_document(&self, document: &IndexedDocument) -> Result<(), SearchIndexError> {
        let doc =
            serde_json::to_value(document).map_err(|e| SearchIndexError::index(e.to_string()))?;
        self.upsert(&document.document_id, doc)
            .await
            .map_err(|e| SearchIndexError::index(e.to_string()))?;

        debug!(document_id = %document.document_id, "Document indexed");
        Ok(())
    }

    async fn update_summary(
        &self,
        document_id: Uuid,
        summary: &str,
    ) -> Result<(), SearchIndexError> {
        let doc_id = document_id.to_string();
        self.upsert(
            &doc_id,
            json!({
                "documentId": doc_id,
                "summary": summary
            }),
        )
        .await?;

        debug!(document_id = %document_id, "Summary indexed");
        Ok(())
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<(), SearchIndexError> {
        let doc_id = document_id.to_string();

        let response = self
            .bounded(
                self.client
                    .delete(DeleteParts::IndexId(&self.index_name, &doc_id))
                    .send(),
            )
            .await
            .map_err(|e| SearchIndexError::delete(e.to_string()))?;

        let status = response.status_code();

        // 404 is acceptable - document may not exist
        if !status.is_success() && status.as_u16() != 404 {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Delete request failed");
            return Err(SearchIndexError::delete(format!(
                "Delete failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(document_id = %document_id, "Document removed from index");
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchIndexError> {
        let response = self
            .bounded(
                self.client
                    .search(SearchParts::Index(&[self.index_name.as_str()]))
                    .body(get_search_body(&query.text, query.limit))
                    .send(),
            )
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Search request failed");
            return Err(SearchIndexError::query(format!(
                "Search failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        parse_search_response(&body)
    }
}
