//! Response envelope and payload types shared by the handlers.

use axum::Json;
use chrono::{DateTime, Utc};
use domain::{ItemWithStatus, LedgerEntry, PickupDetail, PickupReceipt};
use market_store::{MarketItem, PickupInformation, TransactionActivity};
use serde::Serialize;

/// Envelope wrapping every JSON response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// A successful response carrying data.
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    /// A successful response without data.
    pub fn done(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: None,
        })
    }

    /// A failed response.
    pub fn failed(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            message: message.into(),
            data: None,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub weight: f64,
    pub scale: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub posted_by: String,
    pub ordered_by: Option<String>,
    pub availability: String,
    /// Current transaction status, only on the poster's own listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MarketItem> for ItemResponse {
    fn from(item: MarketItem) -> Self {
        Self {
            id: item.id.to_string(),
            name: item.name,
            price_cents: item.price.cents(),
            weight: item.weight,
            scale: item.scale.to_string(),
            description: item.description,
            thumbnail: item.thumbnail,
            posted_by: item.posted_by.to_string(),
            ordered_by: item.ordered_by.map(|id| id.to_string()),
            availability: item.availability.to_string(),
            status: None,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

impl From<ItemWithStatus> for ItemResponse {
    fn from(entry: ItemWithStatus) -> Self {
        Self {
            status: Some(entry.status.to_string()),
            ..Self::from(entry.item)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PickupResponse {
    pub id: String,
    pub item_id: String,
    pub cycle: i64,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub description: String,
    pub pickup_address: String,
    pub pickup_description: String,
    pub service_price_cents: i64,
    pub delivery_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl From<PickupInformation> for PickupResponse {
    fn from(pickup: PickupInformation) -> Self {
        Self {
            id: pickup.id.to_string(),
            item_id: pickup.item_id.to_string(),
            cycle: pickup.cycle,
            recipient_name: pickup.recipient_name,
            recipient_phone: pickup.recipient_phone,
            description: pickup.description,
            pickup_address: pickup.pickup_address,
            pickup_description: pickup.pickup_description,
            service_price_cents: pickup.service_price.cents(),
            delivery_price_cents: pickup.delivery_price.cents(),
            created_at: pickup.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub id: String,
    pub item_id: String,
    pub status: String,
    pub pickup_id: Option<String>,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionActivity> for ActivityResponse {
    fn from(activity: TransactionActivity) -> Self {
        Self {
            id: activity.id.to_string(),
            item_id: activity.item_id.to_string(),
            status: activity.status.to_string(),
            pickup_id: activity.pickup_id.map(|id| id.to_string()),
            sequence: activity.sequence.as_i64(),
            created_at: activity.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PickupCreatedResponse {
    pub pickup: PickupResponse,
    pub activity: ActivityResponse,
}

impl From<PickupReceipt> for PickupCreatedResponse {
    fn from(receipt: PickupReceipt) -> Self {
        Self {
            pickup: receipt.pickup.into(),
            activity: receipt.activity.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PickupDetailResponse {
    pub pickup: PickupResponse,
    pub item: ItemResponse,
    pub history: Vec<ActivityResponse>,
}

impl From<PickupDetail> for PickupDetailResponse {
    fn from(detail: PickupDetail) -> Self {
        Self {
            pickup: detail.pickup.into(),
            item: detail.item.into(),
            history: detail.history.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub activity: ActivityResponse,
    pub item: ItemResponse,
}

impl From<LedgerEntry> for TransactionResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            activity: entry.activity.into(),
            item: entry.item.into(),
        }
    }
}
