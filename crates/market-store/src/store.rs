use async_trait::async_trait;

use crate::{
    ItemId, ItemQuery, MarketItem, PickupId, PickupInformation, Result, Sequence, StoreError,
    TransactionActivity, TransactionStatus, UserId,
};

/// Change applied to the item row in the same commit as an activity append.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemWrite {
    /// Leave the item row untouched.
    Keep,
    /// Withdraw the item from the open catalog and record who ordered it.
    Withdraw { ordered_by: UserId },
    /// Return the item to the open catalog and clear its orderer.
    Restore,
    /// Overwrite the item row with this value.
    Replace(MarketItem),
}

/// One atomic lifecycle write.
///
/// A transition appends exactly one activity, optionally opens a new pickup
/// cycle, and applies one item write. Either all of it is stored or none.
#[derive(Debug, Clone)]
pub struct Transition {
    /// The item whose ledger is extended.
    pub item_id: ItemId,

    /// The latest sequence the caller observed for the item.
    /// The commit fails with `ConcurrencyConflict` if the ledger has moved.
    pub expected_sequence: Sequence,

    /// Pickup information opening a new cycle, if any.
    pub pickup: Option<PickupInformation>,

    /// The activity to append.
    pub activity: TransactionActivity,

    /// Item-row side effect.
    pub item: ItemWrite,
}

/// Core trait for market persistence.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Inserts a new item.
    async fn insert_item(&self, item: MarketItem) -> Result<()>;

    /// Loads an item regardless of its availability.
    async fn get_item(&self, id: ItemId) -> Result<Option<MarketItem>>;

    /// Lists items matching a query, oldest first.
    async fn list_items(&self, query: ItemQuery) -> Result<Vec<MarketItem>>;

    /// Saves the listing fields (name, price, weight, description,
    /// thumbnail) of an item that is still in the open catalog.
    ///
    /// Availability and orderer are owned by [`MarketStore::commit`] and are
    /// never written here. Returns false if the item is missing or withdrawn.
    async fn update_listing(&self, item: &MarketItem) -> Result<bool>;

    /// Deletes an item in the open catalog together with its pickups and
    /// activities.
    ///
    /// Returns false if the item is missing or withdrawn.
    async fn delete_item(&self, id: ItemId) -> Result<bool>;

    /// Returns the pickup of the item's most recent ordering cycle.
    async fn current_pickup(&self, item_id: ItemId) -> Result<Option<PickupInformation>>;

    /// Returns every activity for an item in sequence order (oldest first).
    async fn activities_for_item(&self, item_id: ItemId) -> Result<Vec<TransactionActivity>>;

    /// Returns the activity with the highest sequence for an item.
    async fn latest_activity(&self, item_id: ItemId) -> Result<Option<TransactionActivity>>;

    /// Returns the latest activity of every item that has one, joined with
    /// its item, newest first.
    async fn latest_activities(&self) -> Result<Vec<(TransactionActivity, MarketItem)>>;

    /// Applies a lifecycle transition atomically.
    async fn commit(&self, transition: Transition) -> Result<()>;
}

/// Extension trait providing convenience queries for market stores.
#[async_trait]
pub trait MarketStoreExt: MarketStore {
    /// Returns the activities produced by one pickup cycle, oldest first.
    async fn activities_for_pickup(
        &self,
        item_id: ItemId,
        pickup_id: PickupId,
    ) -> Result<Vec<TransactionActivity>> {
        let activities = self.activities_for_item(item_id).await?;
        Ok(activities
            .into_iter()
            .filter(|a| a.pickup_id == Some(pickup_id))
            .collect())
    }

    /// Checks whether the ledger already holds this (pickup, status) pair.
    async fn has_status(
        &self,
        item_id: ItemId,
        pickup_id: Option<PickupId>,
        status: TransactionStatus,
    ) -> Result<bool> {
        let activities = self.activities_for_item(item_id).await?;
        Ok(activities
            .iter()
            .any(|a| a.pickup_id == pickup_id && a.status == status))
    }

    /// Returns the latest sequence for an item, `Sequence::initial()` if none.
    async fn current_sequence(&self, item_id: ItemId) -> Result<Sequence> {
        Ok(self
            .latest_activity(item_id)
            .await?
            .map(|a| a.sequence)
            .unwrap_or_else(Sequence::initial))
    }
}

// Blanket implementation for all MarketStore implementations
impl<T: MarketStore + ?Sized> MarketStoreExt for T {}

/// Checks that a transition is internally consistent before it is applied.
pub fn validate_transition(transition: &Transition) -> Result<()> {
    let invalid = |message: &str| Err(StoreError::InvalidTransition(message.to_string()));

    if transition.activity.item_id != transition.item_id {
        return invalid("activity belongs to a different item");
    }
    if transition.activity.sequence != transition.expected_sequence.next() {
        return invalid("activity sequence must follow the expected sequence");
    }
    if let Some(pickup) = &transition.pickup {
        if pickup.item_id != transition.item_id {
            return invalid("pickup belongs to a different item");
        }
        if transition.activity.pickup_id != Some(pickup.id) {
            return invalid("activity must reference the pickup it opens");
        }
        if pickup.cycle < 1 {
            return invalid("pickup cycle must start at 1");
        }
    }
    if let ItemWrite::Replace(item) = &transition.item
        && item.id != transition.item_id
    {
        return invalid("replacement item has a different id");
    }
    Ok(())
}
