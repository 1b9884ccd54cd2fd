//! In-memory search index used for local runs and tests.
//!
//! Scoring counts query-term occurrences across text, filename, and summary.
//! Highlights mimic the OpenSearch ones: one fragment of at most
//! `FRAGMENT_SIZE` characters per field with matched words wrapped in `<em>`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use document_shared::IndexedDocument;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::FRAGMENT_SIZE;
use crate::types::{SearchHit, SearchQuery, FIELD_SUMMARY, FIELD_TEXT};

/// Words of context kept before the first match in a fragment.
const LEADING_CONTEXT_WORDS: usize = 3;

#[derive(Clone, Default)]
pub struct InMemorySearchIndex {
    entries: Arc<RwLock<HashMap<String, IndexedDocument>>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entry for a document, if any.
    pub async fn get(&self, document_id: Uuid) -> Option<IndexedDocument> {
        self.entries
            .read()
            .await
            .get(&document_id.to_string())
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn normalize(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn score(entry: &IndexedDocument, terms: &HashSet<String>) -> usize {
    let summary = entry.summary.as_deref().unwrap_or_default();
    [entry.text.as_str(), entry.filename.as_str(), summary]
        .into_iter()
        .flat_map(tokens)
        .filter(|token| terms.contains(token))
        .count()
}

/// Build one highlight fragment for `value`, or `None` when no term matches.
fn highlight(value: &str, terms: &HashSet<String>) -> Option<String> {
    let words: Vec<&str> = value.split_whitespace().collect();
    let first_match = words
        .iter()
        .position(|word| terms.contains(&normalize(word)))?;

    let mut fragment = Vec::new();
    let mut visible = 0usize;
    for word in &words[first_match.saturating_sub(LEADING_CONTEXT_WORDS)..] {
        let len = word.chars().count();
        let separator = usize::from(!fragment.is_empty());
        if visible + separator + len > FRAGMENT_SIZE && !fragment.is_empty() {
            break;
        }
        visible += separator + len;
        if terms.contains(&normalize(word)) {
            fragment.push(format!("<em>{}</em>", word));
        } else {
            fragment.push((*word).to_string());
        }
    }
    Some(fragment.join(" "))
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchIndex {
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }

    async fn index_document(&self, document: &IndexedDocument) -> Result<(), SearchIndexError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(document.document_id.clone())
            .or_insert_with(IndexedDocument::default);
        let summary = document.summary.clone().or_else(|| entry.summary.take());
        *entry = IndexedDocument {
            summary,
            ..document.clone()
        };
        Ok(())
    }

    async fn update_summary(
        &self,
        document_id: Uuid,
        summary: &str,
    ) -> Result<(), SearchIndexError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(document_id.to_string())
            .or_insert_with(|| IndexedDocument {
                document_id: document_id.to_string(),
                ..IndexedDocument::default()
            });
        entry.summary = Some(summary.to_string());
        Ok(())
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<(), SearchIndexError> {
        self.entries.write().await.remove(&document_id.to_string());
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchIndexError> {
        let terms: HashSet<String> = tokens(&query.text).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<(usize, &IndexedDocument)> = entries
            .values()
            .map(|entry| (score(entry, &terms), entry))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.document_id.cmp(&b.1.document_id))
        });

        Ok(scored
            .into_iter()
            .take(query.limit)
            .map(|(score, entry)| {
                let mut highlights = HashMap::new();
                if let Some(fragment) = highlight(&entry.text, &terms) {
                    highlights.insert(FIELD_TEXT.to_string(), vec![fragment]);
                }
                if let Some(fragment) = entry
                    .summary
                    .as_deref()
                    .and_then(|summary| highlight(summary, &terms))
                {
                    highlights.insert(FIELD_SUMMARY.to_string(), vec![fragment]);
                }
                SearchHit {
                    key: entry.document_id.clone(),
                    score: Some(score as f64),
                    source: Some(entry.clone()),
                    highlights,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: Uuid, filename: &str, text: &str) -> IndexedDocument {
        IndexedDocument {
            document_id: id.to_string(),
            filename: filename.to_string(),
            content_type: "text/plain".to_string(),
            text: text.to_string(),
            ..IndexedDocument::default()
        }
    }

    #[tokio::test]
    async fn test_search_ranks_by_term_count() {
        let index = InMemorySearchIndex::new();
        let once = Uuid::new_v4();
        let twice = Uuid::new_v4();
        index
            .index_document(&entry(once, "a.txt", "one invoice here"))
            .await
            .unwrap();
        index
            .index_document(&entry(twice, "invoice.txt", "another invoice"))
            .await
            .unwrap();
        index
            .index_document(&entry(Uuid::new_v4(), "b.txt", "nothing relevant"))
            .await
            .unwrap();

        let hits = index.search(&SearchQuery::new("Invoice", 20)).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key, twice.to_string());
        assert_eq!(hits[0].score, Some(2.0));
        assert_eq!(hits[1].key, once.to_string());
        assert_eq!(
            hits[1].first_highlight(FIELD_TEXT),
            Some("one <em>invoice</em> here")
        );
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let index = InMemorySearchIndex::new();
        for _ in 0..5 {
            index
                .index_document(&entry(Uuid::new_v4(), "x.txt", "report"))
                .await
                .unwrap();
        }
        let hits = index.search(&SearchQuery::new("report", 3)).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_summary_survives_reindex() {
        let index = InMemorySearchIndex::new();
        let id = Uuid::new_v4();

        // Summary may arrive before the text is indexed
        index.update_summary(id, "short summary").await.unwrap();
        index
            .index_document(&entry(id, "a.txt", "body"))
            .await
            .unwrap();

        let stored = index.get(id).await.unwrap();
        assert_eq!(stored.text, "body");
        assert_eq!(stored.summary.as_deref(), Some("short summary"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let index = InMemorySearchIndex::new();
        index.delete_document(Uuid::new_v4()).await.unwrap();
        assert!(index.is_empty().await);
    }

    #[test]
    fn test_highlight_is_bounded() {
        let text = format!("{} needle {}", "word ".repeat(100), "word ".repeat(100));
        let terms: HashSet<String> = ["needle".to_string()].into_iter().collect();
        let fragment = highlight(&text, &terms).unwrap();
        let visible = fragment.replace("<em>", "").replace("</em>", "");
        assert!(visible.chars().count() <= FRAGMENT_SIZE);
        assert!(fragment.starts_with("word word word <em>needle</em>"));
    }

    #[test]
    fn test_highlight_without_match() {
        let terms: HashSet<String> = ["needle".to_string()].into_iter().collect();
        assert_eq!(highlight("hay stack", &terms), None);
    }
}
