//! Domain error types.

use market_store::StoreError;
use thiserror::Error;

use crate::market::MarketError;

/// Coarse classification of a failure, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input, invalid enum value, duplicate status,
    /// weight/scale mismatch.
    InvalidInput,
    /// Role or ownership check failed.
    Forbidden,
    /// Referenced entity is absent.
    NotFound,
    /// The operation lost a race or the ordering cycle is in the wrong phase.
    Conflict,
    /// The store failed; nothing was written.
    Persistence,
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A marketplace rule rejected the operation.
    #[error(transparent)]
    Market(#[from] MarketError),

    /// An error occurred in the market store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Market(err) => err.kind(),
            DomainError::Store(err) if err.is_conflict() => ErrorKind::Conflict,
            // The item vanished between the read and the commit.
            DomainError::Store(StoreError::ItemNotFound(_)) => ErrorKind::NotFound,
            DomainError::Store(_) => ErrorKind::Persistence,
        }
    }
}
