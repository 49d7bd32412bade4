//! Store error type.

use thiserror::Error;

/// An error from the persistence layer.
///
/// A stored value that no longer parses (enum rename, hand-edited row)
/// surfaces as a column conversion failure inside [`StoreError::Database`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("no such {entity}: {id}")]
    NotFound { entity: &'static str, id: i64 },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

/// A specialized Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
