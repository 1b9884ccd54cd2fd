//! Error types for the document repository.

mod repository_error;

pub use repository_error::RepositoryError;
