//! Shared types for the recyco marketplace crates.

mod types;

pub use types::{ActivityId, ItemId, PickupId, UserId};
