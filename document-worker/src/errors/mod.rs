//! Error types for the document worker.

use document_broker::BrokerError;
use document_repository::RepositoryError;
use document_search::SearchIndexError;
use document_storage::StorageError;
use thiserror::Error;

/// Errors that can occur during worker initialization or execution.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl WorkerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

/// Errors from turning stored content into text.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The content cannot be decoded; retrying will not help.
    #[error("Corrupt document: {0}")]
    Corrupt(String),

    /// The extraction task itself failed.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

impl ExtractionError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

/// Errors from a summarizer backend.
#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("Summarizer unavailable: {0}")]
    Unavailable(String),
}
