//! Configuration for the search backend and the query path.

use std::env;
use std::time::Duration;

const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";
const DEFAULT_INDEX_NAME: &str = "documents";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Result limit applied when a caller does not ask for one.
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Configuration for the search index and `SearchService`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// OpenSearch server URL (e.g., "http://localhost:9200")
    pub url: String,
    /// Name of the index holding one entry per document
    pub index_name: String,
    /// Upper bound for a single backend call
    pub timeout: Duration,
    /// Number of results returned by a query
    pub result_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OPENSEARCH_URL.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

impl SearchConfig {
    /// Create a SearchConfig from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL` (default: http://localhost:9200)
    /// - `SEARCH_INDEX_NAME` (default: documents)
    /// - `SEARCH_TIMEOUT_SECS` (default: 10)
    /// - `SEARCH_RESULT_LIMIT` (default: 20)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("OPENSEARCH_URL").unwrap_or(defaults.url),
            index_name: env::var("SEARCH_INDEX_NAME").unwrap_or(defaults.index_name),
            timeout: env::var("SEARCH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            result_limit: env::var("SEARCH_RESULT_LIMIT")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.result_limit),
        }
    }

    /// Override the result limit.
    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }
}
