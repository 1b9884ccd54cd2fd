//! # Document Repository
//!
//! This crate provides the persistence boundary for documents and tags. It
//! includes the repository traits, a PostgreSQL implementation with embedded
//! migrations, and an in-memory implementation for tests and local runs.
//!
//! Both implementations enforce the same contract: optimistic concurrency on
//! document updates, case-insensitive tag name uniqueness, and set semantics
//! for document/tag associations.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod postgres;

pub use config::DatabaseConfig;
pub use errors::RepositoryError;
pub use interfaces::{DocumentRepository, TagRepository};
pub use memory::InMemoryDocumentStore;
pub use postgres::{run_migrations, PostgresDocumentRepository, PostgresTagRepository};
