pub mod auth;
pub mod markets;
pub mod system;
pub mod transactions;

use common::ItemId;

use crate::error::ApiError;

fn parse_item_id(raw: &str) -> Result<ItemId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid item id: {e}")))
}
