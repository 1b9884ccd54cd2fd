//! OpenSearch index mappings and query bodies for the document index.

use serde_json::{json, Value};

use crate::types::{FIELD_FILENAME, FIELD_SUMMARY, FIELD_TEXT};

/// Characters per highlight fragment.
pub const FRAGMENT_SIZE: usize = 160;

/// Highlight fragments requested per field.
pub const NUMBER_OF_FRAGMENTS: usize = 1;

/// Get the index settings and mappings for the document index.
///
/// - `documentId` and `contentType` are keywords for exact lookups
/// - `filename` is analyzed text with a `raw` keyword subfield
/// - `text` and `summary` are analyzed text
pub fn get_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "documentId": {
                    "type": "keyword"
                },
                "filename": {
                    "type": "text",
                    "fields": {
                        "raw": {
                            "type": "keyword"
                        }
                    }
                },
                "contentType": {
                    "type": "keyword"
                },
                "uploadedAt": {
                    "type": "date"
                },
                "size": {
                    "type": "long"
                },
                "text": {
                    "type": "text"
                },
                "summary": {
                    "type": "text"
                }
            }
        }
    })
}

/// Build the request body for a full-text query.
pub fn get_search_body(text: &str, limit: usize) -> Value {
    json!({
        "size": limit,
        "query": {
            "multi_match": {
                "query": text,
                "fields": [FIELD_TEXT, FIELD_FILENAME, FIELD_SUMMARY]
            }
        },
        "highlight": {
            "fields": {
                FIELD_TEXT: {
                    "fragment_size": FRAGMENT_SIZE,
                    "number_of_fragments": NUMBER_OF_FRAGMENTS
                },
                FIELD_SUMMARY: {
                    "fragment_size": FRAGMENT_SIZE,
                    "number_of_fragments": NUMBER_OF_FRAGMENTS
                }
            }
        }
    })
}
