//! Error types for document operations
//!
//! Simple, flat error hierarchy. Selector syntax errors live in
//! `selector.rs` next to the parser.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    #[error("Document has no root node")]
    NoRoot,

    #[error("Invalid document description: {0}")]
    InvalidDescription(String),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}
