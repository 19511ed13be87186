use thiserror::Error;

use crate::{ItemId, Sequence};

/// Errors that can occur when interacting with the market store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The item's ledger moved on since the caller read it.
    #[error(
        "Concurrency conflict for item {item_id}: expected sequence {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        item_id: ItemId,
        expected: Sequence,
        actual: Sequence,
    },

    /// Another pickup already opened the same ordering cycle.
    #[error("Pickup cycle {cycle} already exists for item {item_id}")]
    PickupConflict { item_id: ItemId, cycle: i64 },

    /// The item targeted by a write does not exist.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// A transition was internally inconsistent and was not applied.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A stored value could not be decoded into a record.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true for errors caused by a competing write.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::PickupConflict { .. }
        )
    }
}

/// Result type for market store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
