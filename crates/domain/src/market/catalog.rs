//! Item catalog operations.

use chrono::Utc;
use common::{ItemId, UserId};
use market_store::{
    Availability, ItemQuery, MarketItem, MarketStore, Money, Scale, TransactionStatus,
};
use serde::Serialize;

use crate::error::DomainError;
use crate::identity::{Identity, Role};

use super::{CurrentStatus, MarketError, MarketService};

/// Weight in kilograms separating SMALL items (at most this) from LARGE ones.
pub const SCALE_WEIGHT_THRESHOLD: f64 = 15.0;

/// Returns the scale a weight belongs to.
pub fn scale_for_weight(weight: f64) -> Scale {
    if weight <= SCALE_WEIGHT_THRESHOLD {
        Scale::Small
    } else {
        Scale::Large
    }
}

/// Checks that a weight is usable and fits the given scale.
pub fn validate_weight(scale: Scale, weight: f64) -> Result<(), MarketError> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(MarketError::InvalidWeight { weight });
    }
    if scale_for_weight(weight) != scale {
        let rule = match scale {
            Scale::Small => "weight must not exceed 15",
            Scale::Large => "weight must exceed 15",
        };
        return Err(MarketError::WeightOutOfRange {
            scale,
            weight,
            rule,
        });
    }
    Ok(())
}

fn require_text(field: &'static str, value: &str) -> Result<(), MarketError> {
    if value.trim().is_empty() {
        return Err(MarketError::MissingField(field));
    }
    Ok(())
}

fn require_price(price: Money) -> Result<(), MarketError> {
    if !price.is_positive() {
        return Err(MarketError::InvalidPrice {
            cents: price.cents(),
        });
    }
    Ok(())
}

/// Fields of a new market item.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub name: String,
    pub price: Money,
    pub weight: f64,
    pub description: String,
    pub thumbnail: Option<String>,
}

/// Partial update of a market item. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub weight: Option<f64>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    /// Only `FINISHED` is accepted; it closes the item's transaction.
    pub status: Option<TransactionStatus>,
}

impl ItemPatch {
    /// Applies the patch to an item, validating every changed field.
    fn apply(&self, item: &mut MarketItem) -> Result<(), MarketError> {
        if let Some(status) = self.status
            && status != TransactionStatus::Finished
        {
            return Err(MarketError::UnsupportedStatusUpdate { status });
        }
        if let Some(name) = &self.name {
            require_text("name", name)?;
            item.name = name.clone();
        }
        if let Some(price) = self.price {
            require_price(price)?;
            item.price = price;
        }
        if let Some(weight) = self.weight {
            // Checked against the item's own scale, which never changes.
            validate_weight(item.scale, weight)?;
            item.weight = weight;
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(thumbnail) = &self.thumbnail {
            item.thumbnail = Some(thumbnail.clone());
        }
        item.updated_at = Utc::now();
        Ok(())
    }
}

/// A market item with the status derived from its ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemWithStatus {
    #[serde(flatten)]
    pub item: MarketItem,
    pub status: CurrentStatus,
}

impl<S: MarketStore> MarketService<S> {
    /// Posts a new item. The scale comes from the poster's role.
    #[tracing::instrument(skip(self, new_item), fields(user_id = %identity.user_id, role = %identity.role))]
    pub async fn create_item(
        &self,
        identity: &Identity,
        new_item: NewItem,
    ) -> Result<MarketItem, DomainError> {
        let scale = identity
            .role
            .producer_scale()
            .ok_or(MarketError::RoleCannotPost {
                role: identity.role,
            })?;

        require_text("name", &new_item.name)?;
        require_price(new_item.price)?;
        validate_weight(scale, new_item.weight)?;

        let now = Utc::now();
        let item = MarketItem {
            id: ItemId::new(),
            name: new_item.name,
            price: new_item.price,
            weight: new_item.weight,
            scale,
            description: new_item.description,
            thumbnail: new_item.thumbnail,
            posted_by: identity.user_id,
            ordered_by: None,
            availability: Availability::Available,
            created_at: now,
            updated_at: now,
        };
        self.store().insert_item(item.clone()).await?;

        metrics::counter!("market_items_created_total").increment(1);
        tracing::info!(item_id = %item.id, %scale, "market item created");
        Ok(item)
    }

    /// Lists the open catalog as seen by a role.
    ///
    /// Sized roles only see items of their own scale.
    #[tracing::instrument(skip(self))]
    pub async fn list_items(&self, viewer: Role) -> Result<Vec<MarketItem>, DomainError> {
        let query = ItemQuery::open_catalog().scale(viewer.scale());
        Ok(self.store().list_items(query).await?)
    }

    /// Loads one item from the open catalog.
    #[tracing::instrument(skip(self))]
    pub async fn get_item(&self, id: ItemId, viewer: Role) -> Result<MarketItem, DomainError> {
        let item = self.open_item(id).await?;
        if let Some(scale) = viewer.scale()
            && scale != item.scale
        {
            return Err(MarketError::ScaleMismatch {
                role: viewer,
                scale: item.scale,
            }
            .into());
        }
        Ok(item)
    }

    /// Lists every item a user posted, withdrawn ones included, with the
    /// current status of each.
    #[tracing::instrument(skip(self))]
    pub async fn list_mine(&self, poster: UserId) -> Result<Vec<ItemWithStatus>, DomainError> {
        let items = self
            .store()
            .list_items(ItemQuery::new().posted_by(poster))
            .await?;

        let mut result = Vec::with_capacity(items.len());
        for item in items {
            let latest = self.store().latest_activity(item.id).await?;
            result.push(ItemWithStatus {
                status: CurrentStatus::from_latest(latest.as_ref()),
                item,
            });
        }
        Ok(result)
    }

    /// Updates an item the caller posted.
    ///
    /// A patch carrying `FINISHED` records the status and withdraws the item
    /// in the same commit as the field changes.
    #[tracing::instrument(skip(self, patch), fields(user_id = %identity.user_id))]
    pub async fn update_item(
        &self,
        id: ItemId,
        identity: &Identity,
        patch: ItemPatch,
    ) -> Result<ItemWithStatus, DomainError> {
        let current = self.open_item(id).await?;
        self.authorize_owner(identity, &current)?;

        let mut updated = current.clone();
        patch.apply(&mut updated)?;

        if patch.status.is_some() {
            self.finish_via_catalog_update(updated).await?;
        } else if !self.store().update_listing(&updated).await? {
            // Ordered or deleted since it was read.
            return Err(MarketError::ItemNotFound(id).into());
        }

        if let Some(old) = &current.thumbnail
            && patch.thumbnail.as_ref().is_some_and(|new| new != old)
        {
            self.discard_thumbnail(old).await;
        }

        let item = self.existing_item(id).await?;
        let latest = self.store().latest_activity(id).await?;
        Ok(ItemWithStatus {
            status: CurrentStatus::from_latest(latest.as_ref()),
            item,
        })
    }

    /// Deletes an item the caller posted, together with its ledger.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn delete_item(&self, id: ItemId, identity: &Identity) -> Result<(), DomainError> {
        let item = self.open_item(id).await?;
        self.authorize_owner(identity, &item)?;

        if !self.store().delete_item(id).await? {
            return Err(MarketError::ItemNotFound(id).into());
        }
        if let Some(thumbnail) = &item.thumbnail {
            self.discard_thumbnail(thumbnail).await;
        }

        tracing::info!(item_id = %id, "market item deleted");
        Ok(())
    }
}
