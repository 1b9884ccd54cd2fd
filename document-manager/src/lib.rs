//! # Document Manager
//!
//! The serving-side services of the document pipeline.
//!
//! - **DocumentService**: upload, replace, metadata updates, delete, download,
//!   summaries, and re-driving a document through the pipeline
//! - **TagService**: tags and document/tag associations
//!
//! Both services hold their collaborators behind `Arc<dyn Trait>` and share no
//! mutable state, so one instance can serve any number of concurrent callers.

pub mod config;
pub mod document_service;
pub mod errors;
pub mod requests;
pub mod tag_service;

pub use config::{ServiceConfig, DEFAULT_MAX_UPLOAD_BYTES};
pub use document_service::DocumentService;
pub use errors::{ErrorKind, ServiceError};
pub use requests::{
    ReplaceRequest, TagRequest, UpdateMetadataRequest, UploadRequest, MAX_TAG_COLOR_CHARS,
    MAX_TAG_NAME_CHARS,
};
pub use tag_service::TagService;
