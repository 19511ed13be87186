//! Pickup coordination: opening an ordering cycle on an item.

use chrono::Utc;
use common::{ItemId, PickupId, UserId};
use market_store::{
    ItemWrite, MarketItem, MarketStore, MarketStoreExt, PickupInformation, TransactionActivity,
    TransactionStatus, Transition,
};
use serde::Serialize;

use crate::error::DomainError;
use crate::identity::{Identity, Role};

use super::{MarketError, MarketService, parse_requested_status, quote};

/// A consumer's pickup request for an item.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPickup {
    pub item_id: ItemId,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub description: String,
    pub pickup_address: String,
    pub pickup_description: String,
    /// Status of the first activity. Blank or missing means `ON_PROCESS`.
    pub requested_status: Option<String>,
}

/// Result of a pickup request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupReceipt {
    pub pickup: PickupInformation,
    pub activity: TransactionActivity,
}

/// A pickup with its item and the status history of its cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupDetail {
    pub pickup: PickupInformation,
    pub item: MarketItem,
    /// Activities of this pickup's cycle, newest first.
    pub history: Vec<TransactionActivity>,
}

impl<S: MarketStore> MarketService<S> {
    /// Opens a new ordering cycle on an item from the open catalog.
    ///
    /// Stores the pickup, its first activity and, for `ON_PROCESS`, the
    /// withdrawal of the item in one commit.
    #[tracing::instrument(skip(self, request), fields(user_id = %identity.user_id, item_id = %request.item_id))]
    pub async fn create_pickup(
        &self,
        identity: &Identity,
        request: NewPickup,
    ) -> Result<PickupReceipt, DomainError> {
        if identity.role != Role::ConsumerLarge {
            return Err(MarketError::RoleCannotOrder {
                role: identity.role,
            }
            .into());
        }

        let status = parse_requested_status(request.requested_status.as_deref())?;
        let item_id = request.item_id;
        let item = self.open_item(item_id).await?;

        for (field, value) in [
            ("recipient_name", &request.recipient_name),
            ("recipient_phone", &request.recipient_phone),
            ("pickup_address", &request.pickup_address),
        ] {
            if value.trim().is_empty() {
                return Err(MarketError::MissingField(field).into());
            }
        }

        if self.open_pickup(item_id).await?.is_some() {
            return Err(MarketError::CycleOpen(item_id).into());
        }
        let cycle = self
            .store()
            .current_pickup(item_id)
            .await?
            .map_or(1, |previous| previous.cycle + 1);

        let prices = quote(item.weight);
        let now = Utc::now();
        let pickup = PickupInformation {
            id: PickupId::new(),
            item_id,
            cycle,
            recipient_name: request.recipient_name,
            recipient_phone: request.recipient_phone,
            description: request.description,
            pickup_address: request.pickup_address,
            pickup_description: request.pickup_description,
            service_price: prices.service_price,
            delivery_price: prices.delivery_price,
            created_at: now,
            updated_at: now,
        };

        let expected_sequence = self.store().current_sequence(item_id).await?;
        let activity =
            TransactionActivity::new(item_id, status, Some(pickup.id), expected_sequence.next());
        let item_write = match status {
            TransactionStatus::OnProcess => ItemWrite::Withdraw {
                ordered_by: identity.user_id,
            },
            _ => ItemWrite::Keep,
        };

        self.commit(Transition {
            item_id,
            expected_sequence,
            pickup: Some(pickup.clone()),
            activity: activity.clone(),
            item: item_write,
        })
        .await?;

        metrics::counter!("market_pickups_created_total").increment(1);
        tracing::info!(pickup_id = %pickup.id, cycle, %status, "pickup created");
        Ok(PickupReceipt { pickup, activity })
    }

    /// Loads the current pickup of an item for its poster or orderer.
    #[tracing::instrument(skip(self))]
    pub async fn get_pickup_by_item(
        &self,
        item_id: ItemId,
        caller: UserId,
    ) -> Result<PickupDetail, DomainError> {
        let item = self.existing_item(item_id).await?;
        if item.posted_by != caller && item.ordered_by != Some(caller) {
            return Err(MarketError::NotParticipant.into());
        }

        let pickup = self
            .store()
            .current_pickup(item_id)
            .await?
            .ok_or(MarketError::PickupNotFound(item_id))?;

        let mut history = self.store().activities_for_pickup(item_id, pickup.id).await?;
        history.reverse();

        Ok(PickupDetail {
            pickup,
            item,
            history,
        })
    }
}
