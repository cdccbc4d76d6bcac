//! Store error types

use thiserror::Error;

/// Errors returned by [`crate::Store`] operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown field '{field}' for collection '{collection}'")]
    UnknownField { collection: &'static str, field: String },

    #[error("Field '{0}' is assigned by the store and cannot be patched")]
    ImmutableField(String),

    #[error("Patch has no fields to set")]
    EmptyPatch,
}

pub type Result<T> = std::result::Result<T, StoreError>;
