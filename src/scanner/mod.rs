//! Document discovery functionality

pub mod document_locator;

pub use document_locator::{locate_documents, DocumentRef};
