//! Marketplace catalog and transaction lifecycle.

mod catalog;
mod lifecycle;
mod pickup;
mod pricing;
mod service;
mod status;
mod thumbnail;

pub use catalog::{
    ItemPatch, ItemWithStatus, NewItem, SCALE_WEIGHT_THRESHOLD, scale_for_weight, validate_weight,
};
pub use lifecycle::LedgerEntry;
pub use pickup::{NewPickup, PickupDetail, PickupReceipt};
pub use pricing::{PickupQuote, quote};
pub use service::MarketService;
pub use status::{CurrentStatus, parse_requested_status, parse_status};
pub use thumbnail::{NoopThumbnailStore, ThumbnailStore};

use common::ItemId;
use market_store::{ParseEnumError, Scale, TransactionStatus};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::identity::Role;

/// Errors raised by marketplace rules.
#[derive(Debug, Error)]
pub enum MarketError {
    /// A required text field was blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The price is zero or negative.
    #[error("Invalid price: {cents} (must be greater than 0)")]
    InvalidPrice { cents: i64 },

    /// The weight is zero, negative or not a number.
    #[error("Invalid weight: {weight} (must be greater than 0)")]
    InvalidWeight { weight: f64 },

    /// The weight does not fit the item's scale.
    #[error("Weight {weight} is invalid for {scale} items: {rule}")]
    WeightOutOfRange {
        scale: Scale,
        weight: f64,
        rule: &'static str,
    },

    /// A status string is not one of the ledger statuses.
    #[error("Invalid status value: {0}")]
    InvalidStatus(#[from] ParseEnumError),

    /// An item update tried to set a status other than FINISHED.
    #[error("Status {status} cannot be set through an item update")]
    UnsupportedStatusUpdate { status: TransactionStatus },

    /// The same status was already recorded for this ordering cycle.
    #[error("Duplicate status {status} for the same item and transaction")]
    DuplicateStatus { status: TransactionStatus },

    /// The role may not post market items.
    #[error("Role {role} cannot create market items")]
    RoleCannotPost { role: Role },

    /// The role may not request a pickup.
    #[error("Role {role} cannot create pickup information")]
    RoleCannotOrder { role: Role },

    /// The caller does not own the item.
    #[error("Only the poster may modify this market item")]
    NotPoster,

    /// The caller's role scale differs from the item's scale.
    #[error("Role {role} cannot access {scale} scale items")]
    ScaleMismatch { role: Role, scale: Scale },

    /// The caller is neither the poster nor the current orderer.
    #[error("You do not have permission to access this transaction")]
    NotParticipant,

    /// The item does not exist, or is not in the open catalog.
    #[error("Market item not found: {0}")]
    ItemNotFound(ItemId),

    /// The item has no pickup information.
    #[error("Pickup information not found for item {0}")]
    PickupNotFound(ItemId),

    /// The item already has an ordering cycle in progress.
    #[error("Item {0} already has an open pickup")]
    CycleOpen(ItemId),

    /// The current ordering cycle already ended.
    #[error("Transaction already ended with {last}; cannot record {requested}")]
    CycleClosed {
        last: TransactionStatus,
        requested: TransactionStatus,
    },
}

impl MarketError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::MissingField(_)
            | MarketError::InvalidPrice { .. }
            | MarketError::InvalidWeight { .. }
            | MarketError::WeightOutOfRange { .. }
            | MarketError::InvalidStatus(_)
            | MarketError::UnsupportedStatusUpdate { .. }
            | MarketError::DuplicateStatus { .. } => ErrorKind::InvalidInput,
            MarketError::RoleCannotPost { .. }
            | MarketError::RoleCannotOrder { .. }
            | MarketError::NotPoster
            | MarketError::ScaleMismatch { .. }
            | MarketError::NotParticipant => ErrorKind::Forbidden,
            MarketError::ItemNotFound(_) | MarketError::PickupNotFound(_) => ErrorKind::NotFound,
            MarketError::CycleOpen(_) | MarketError::CycleClosed { .. } => ErrorKind::Conflict,
        }
    }
}
