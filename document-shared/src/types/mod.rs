pub mod document;
pub mod indexed_document;
pub mod messages;
pub mod search_result;
