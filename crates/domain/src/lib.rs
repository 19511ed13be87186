//! Domain layer for the recyco marketplace.
//!
//! This crate holds the rules of the market item transaction lifecycle:
//! - Item catalog with weight and scale validation
//! - Pickup coordination and pricing
//! - Transaction ledger reads
//! - Lifecycle engine applying status changes atomically through the store

pub mod error;
pub mod identity;
pub mod market;

pub use error::{DomainError, ErrorKind};
pub use identity::{Identity, Role};
pub use market::{
    CurrentStatus, ItemPatch, ItemWithStatus, LedgerEntry, MarketError, MarketService, NewItem,
    NewPickup, NoopThumbnailStore, PickupDetail, PickupQuote, PickupReceipt,
    SCALE_WEIGHT_THRESHOLD, ThumbnailStore, parse_requested_status, parse_status, quote,
    scale_for_weight, validate_weight,
};
