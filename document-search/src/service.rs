//! Search service: runs full-text queries and assembles results with snippets.

use std::sync::Arc;

use document_shared::SearchResult;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::errors::SearchError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{SearchHit, SearchQuery, FIELD_SUMMARY, FIELD_TEXT};

/// Longest snippet, in characters, before the ellipsis.
pub const SNIPPET_MAX_CHARS: usize = 200;

const ELLIPSIS: &str = "...";

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// Remove markup tags and surrounding whitespace.
fn strip_tags(value: &str) -> String {
    TAG_RE.replace_all(value, "").trim().to_string()
}

/// Strip, then cut to `SNIPPET_MAX_CHARS` characters with an ellipsis.
///
/// Returns `None` for values that are blank once stripped.
fn truncated(value: &str) -> Option<String> {
    let stripped = strip_tags(value);
    if stripped.is_empty() {
        return None;
    }
    if stripped.chars().count() <= SNIPPET_MAX_CHARS {
        return Some(stripped);
    }
    let cut: String = stripped.chars().take(SNIPPET_MAX_CHARS).collect();
    Some(format!("{}{}", cut, ELLIPSIS))
}

/// Pick the snippet for a hit.
///
/// Priority: text highlight, summary highlight, stored summary, stored text.
/// Every candidate is capped at `SNIPPET_MAX_CHARS`, highlights included:
/// the engine's fragment size is only a hint.
pub fn build_snippet(hit: &SearchHit) -> String {
    let highlighted = [FIELD_TEXT, FIELD_SUMMARY]
        .into_iter()
        .filter_map(|field| hit.first_highlight(field))
        .find_map(truncated);
    if let Some(fragment) = highlighted {
        return fragment;
    }

    let Some(source) = hit.source.as_ref() else {
        return String::new();
    };
    source
        .summary
        .as_deref()
        .and_then(truncated)
        .or_else(|| truncated(&source.text))
        .unwrap_or_default()
}

fn to_result(hit: &SearchHit) -> SearchResult {
    let id = Uuid::parse_str(&hit.key).ok();
    let (filename, content_type, uploaded_at) = match hit.source.as_ref() {
        Some(source) => (
            source.filename.clone(),
            source.content_type.clone(),
            Some(source.uploaded_at),
        ),
        None => (String::new(), String::new(), None),
    };

    SearchResult {
        id,
        filename,
        content_type,
        uploaded_at,
        snippet: build_snippet(hit),
        score: hit.score.unwrap_or(0.0),
    }
}

/// Read side of the pipeline: full-text queries over the document index.
pub struct SearchService {
    provider: Arc<dyn SearchIndexProvider>,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(provider: Arc<dyn SearchIndexProvider>, config: SearchConfig) -> Self {
        Self { provider, config }
    }

    /// Run a query with the configured result limit.
    ///
    /// A blank query returns no results without touching the backend.
    ///
    /// # Errors
    ///
    /// * `SearchError::SearchUnavailable` - If the backend fails or times out
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.search_with_limit(query, self.config.result_limit).await
    }

    /// Run a query returning at most `limit` results.
    pub async fn search_with_limit(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let text = query.trim();
        if text.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let hits = self
            .provider
            .search(&SearchQuery::new(text, limit))
            .await
            .map_err(|e| {
                error!(error = %e, "Search backend failed");
                SearchError::from(e)
            })?;

        let mut results: Vec<SearchResult> = hits.iter().take(limit).map(to_result).collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(query = %text, results = results.len(), "Search completed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SearchIndexError;
    use async_trait::async_trait;
    use document_shared::IndexedDocument;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Mock provider returning canned hits and recording queries.
    struct MockProvider {
        hits: Vec<SearchHit>,
        queries: Arc<Mutex<Vec<SearchQuery>>>,
        should_fail: bool,
    }

    impl MockProvider {
        fn new(hits: Vec<SearchHit>) -> Self {
            Self {
                hits,
                queries: Arc::new(Mutex::new(Vec::new())),
                should_fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                should_fail: true,
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockProvider {
        async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn index_document(&self, _: &IndexedDocument) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn update_summary(&self, _: Uuid, _: &str) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn delete_document(&self, _: Uuid) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchIndexError> {
            self.queries.lock().await.push(query.clone());
            if self.should_fail {
                return Err(SearchIndexError::query("Mock search failure"));
            }
            Ok(self.hits.clone())
        }
    }

    fn hit(key: &str, score: Option<f64>, source: Option<IndexedDocument>) -> SearchHit {
        SearchHit {
            key: key.to_string(),
            score,
            source,
            highlights: HashMap::new(),
        }
    }

    fn source(text: &str, summary: Option<&str>) -> IndexedDocument {
        IndexedDocument {
            filename: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            text: text.to_string(),
            summary: summary.map(str::to_string),
            ..IndexedDocument::default()
        }
    }

    fn service(provider: MockProvider) -> SearchService {
        SearchService::new(Arc::new(provider), SearchConfig::default())
    }

    #[tokio::test]
    async fn test_blank_query_skips_backend() {
        let provider = MockProvider::failing();
        let queries = provider.queries.clone();
        let service = service(provider);

        assert!(service.search("   ").await.unwrap().is_empty());
        assert!(queries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_default_limit_is_sent() {
        let provider = MockProvider::new(Vec::new());
        let queries = provider.queries.clone();
        let service = service(provider);

        service.search(" invoice ").await.unwrap();
        let queries = queries.lock().await;
        assert_eq!(queries[0], SearchQuery::new("invoice", 20));
    }

    #[tokio::test]
    async fn test_backend_error_is_unavailable() {
        let service = service(MockProvider::failing());
        assert!(matches!(
            service.search("invoice").await,
            Err(SearchError::SearchUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_results_sorted_and_ids_parsed() {
        let id = Uuid::new_v4();
        let service = service(MockProvider::new(vec![
            hit("not-a-uuid", None, None),
            hit(&id.to_string(), Some(3.0), Some(source("body", None))),
        ]));

        let results = service.search("body").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, Some(id));
        assert_eq!(results[0].score, 3.0);
        assert_eq!(results[0].filename, "a.txt");
        assert_eq!(results[1].id, None);
        assert_eq!(results[1].score, 0.0);
        assert_eq!(results[1].uploaded_at, None);
        assert_eq!(results[1].snippet, "");
    }

    #[test]
    fn test_snippet_prefers_text_highlight() {
        let mut h = hit("k", None, Some(source("body text", Some("sum"))));
        h.highlights
            .insert("text".to_string(), vec!["<em>body</em> text".to_string()]);
        h.highlights
            .insert("summary".to_string(), vec!["<em>sum</em>".to_string()]);
        assert_eq!(build_snippet(&h), "body text");
    }

    #[test]
    fn test_snippet_falls_back_to_summary_highlight() {
        let mut h = hit("k", None, Some(source("body", Some("short sum"))));
        h.highlights
            .insert("summary".to_string(), vec!["short <em>sum</em> ".to_string()]);
        assert_eq!(build_snippet(&h), "short sum");
    }

    #[test]
    fn test_snippet_caps_long_highlight() {
        let fragment = (0..80)
            .map(|i| format!("<em>invoice</em>{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let mut h = hit("k", None, Some(source("body", None)));
        h.highlights.insert("text".to_string(), vec![fragment]);

        let snippet = build_snippet(&h);
        assert!(snippet.starts_with("invoice0 invoice1"));
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS + 3);
        assert!(!snippet.contains('<'));
    }

    #[test]
    fn test_snippet_truncates_summary() {
        let summary = "é".repeat(250);
        let h = hit("k", None, Some(source("body", Some(&summary))));
        let snippet = build_snippet(&h);
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.chars().count(), 203);
    }

    #[test]
    fn test_snippet_skips_blank_summary_for_text() {
        let h = hit("k", None, Some(source("  plain <b>body</b> ", Some("   "))));
        assert_eq!(build_snippet(&h), "plain body");
    }

    #[test]
    fn test_snippet_short_text_has_no_ellipsis() {
        let text = "x".repeat(200);
        let h = hit("k", None, Some(source(&text, None)));
        assert_eq!(build_snippet(&h), text);
    }
}
