//! # Document Worker
//!
//! Background processing for the document pipeline. Consumes upload events,
//! extracts and summarizes text, indexes it into OpenSearch, and persists
//! summaries back onto the document record.
//!
//! ## Architecture
//!
//! 1. **Upload consumer**: loads the stored object, extracts text, indexes it
//!    and publishes a summary
//! 2. **Summary consumer**: saves the summary on the document and in the index
//! 3. **Orchestrator**: runs the consumers and handles shutdown
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`extract`]: Text extraction and summarization
//! - [`handlers`]: Message handlers for each queue
//! - [`orchestrator`]: Coordinates the consumers
//! - [`errors`]: Error types for the worker

pub mod config;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod orchestrator;

pub use config::{ConnectionMode, Dependencies, WorkerConfig};
pub use errors::{ExtractionError, SummarizeError, WorkerError};
pub use extract::{ExtractiveSummarizer, Summarizer, TextExtractor};
pub use handlers::{SummaryHandler, UploadHandler};
pub use orchestrator::Orchestrator;
