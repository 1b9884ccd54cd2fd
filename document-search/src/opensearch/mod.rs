//! OpenSearch implementation of the search index provider.

mod index_config;
mod provider;

pub use index_config::{get_index_settings, get_search_body, FRAGMENT_SIZE, NUMBER_OF_FRAGMENTS};
pub use provider::OpenSearchProvider;
