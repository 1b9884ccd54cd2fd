//! Interface definitions for the repositories.
//!
//! The traits allow the services to be wired against PostgreSQL in
//! production and against the in-memory store in tests.

mod document_repository;
mod tag_repository;

pub use document_repository::DocumentRepository;
pub use tag_repository::TagRepository;
