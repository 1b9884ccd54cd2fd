//! Message handlers for the two pipeline queues.
//!
//! - [`UploadHandler`]: upload events -> extracted text, index entry, summary message
//! - [`SummaryHandler`]: summary messages -> repository and index

mod summary;
mod upload;

pub use summary::SummaryHandler;
pub use upload::UploadHandler;
