use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Availability, ItemId, ItemQuery, MarketItem, PickupInformation, Result, Sequence, StoreError,
    TransactionActivity,
    store::{ItemWrite, MarketStore, Transition, validate_transition},
};

#[derive(Default)]
struct Tables {
    items: HashMap<ItemId, MarketItem>,
    pickups: Vec<PickupInformation>,
    activities: Vec<TransactionActivity>,
}

impl Tables {
    fn latest_sequence(&self, item_id: ItemId) -> Sequence {
        self.activities
            .iter()
            .filter(|a| a.item_id == item_id)
            .map(|a| a.sequence)
            .max()
            .unwrap_or(Sequence::initial())
    }
}

/// In-memory market store for tests and local development.
///
/// All tables sit behind one lock so a commit is applied as a unit, the
/// same guarantee the PostgreSQL store gets from a database transaction.
#[derive(Clone, Default)]
pub struct InMemoryMarketStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryMarketStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of activities stored.
    pub async fn activity_count(&self) -> usize {
        self.tables.read().await.activities.len()
    }

    /// Returns the total number of pickups stored.
    pub async fn pickup_count(&self) -> usize {
        self.tables.read().await.pickups.len()
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    async fn insert_item(&self, item: MarketItem) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.items.insert(item.id, item);
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<MarketItem>> {
        Ok(self.tables.read().await.items.get(&id).cloned())
    }

    async fn list_items(&self, query: ItemQuery) -> Result<Vec<MarketItem>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables
            .items
            .values()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn update_listing(&self, item: &MarketItem) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.items.get_mut(&item.id).filter(|s| s.is_available()) else {
            return Ok(false);
        };
        stored.name = item.name.clone();
        stored.price = item.price;
        stored.weight = item.weight;
        stored.description = item.description.clone();
        stored.thumbnail = item.thumbnail.clone();
        stored.updated_at = item.updated_at;
        Ok(true)
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.items.get(&id).is_some_and(MarketItem::is_available) {
            return Ok(false);
        }
        tables.items.remove(&id);
        tables.pickups.retain(|p| p.item_id != id);
        tables.activities.retain(|a| a.item_id != id);
        Ok(true)
    }

    async fn current_pickup(&self, item_id: ItemId) -> Result<Option<PickupInformation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .pickups
            .iter()
            .filter(|p| p.item_id == item_id)
            .max_by_key(|p| p.cycle)
            .cloned())
    }

    async fn activities_for_item(&self, item_id: ItemId) -> Result<Vec<TransactionActivity>> {
        let tables = self.tables.read().await;
        let mut activities: Vec<_> = tables
            .activities
            .iter()
            .filter(|a| a.item_id == item_id)
            .cloned()
            .collect();
        activities.sort_by_key(|a| a.sequence);
        Ok(activities)
    }

    async fn latest_activity(&self, item_id: ItemId) -> Result<Option<TransactionActivity>> {
        let tables = self.tables.read().await;
        Ok(tables
            .activities
            .iter()
            .filter(|a| a.item_id == item_id)
            .max_by_key(|a| a.sequence)
            .cloned())
    }

    async fn latest_activities(&self) -> Result<Vec<(TransactionActivity, MarketItem)>> {
        let tables = self.tables.read().await;
        let mut latest: HashMap<ItemId, &TransactionActivity> = HashMap::new();
        for activity in &tables.activities {
            latest
                .entry(activity.item_id)
                .and_modify(|current| {
                    if activity.sequence > current.sequence {
                        *current = activity;
                    }
                })
                .or_insert(activity);
        }

        let mut rows: Vec<_> = latest
            .into_values()
            .filter_map(|activity| {
                tables
                    .items
                    .get(&activity.item_id)
                    .map(|item| (activity.clone(), item.clone()))
            })
            .collect();
        rows.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));
        Ok(rows)
    }

    async fn commit(&self, transition: Transition) -> Result<()> {
        validate_transition(&transition)?;

        let mut tables = self.tables.write().await;
        let item_id = transition.item_id;

        if !tables.items.contains_key(&item_id) {
            return Err(StoreError::ItemNotFound(item_id));
        }

        let actual = tables.latest_sequence(item_id);
        if actual != transition.expected_sequence {
            return Err(StoreError::ConcurrencyConflict {
                item_id,
                expected: transition.expected_sequence,
                actual,
            });
        }

        if let Some(pickup) = &transition.pickup
            && tables
                .pickups
                .iter()
                .any(|p| p.item_id == item_id && p.cycle == pickup.cycle)
        {
            return Err(StoreError::PickupConflict {
                item_id,
                cycle: pickup.cycle,
            });
        }

        // Every check has passed; nothing below can fail.
        if let Some(pickup) = transition.pickup {
            tables.pickups.push(pickup);
        }
        tables.activities.push(transition.activity);

        let now = Utc::now();
        match transition.item {
            ItemWrite::Keep => {}
            ItemWrite::Withdraw { ordered_by } => {
                if let Some(item) = tables.items.get_mut(&item_id) {
                    item.availability = Availability::Withdrawn;
                    item.ordered_by = Some(ordered_by);
                    item.updated_at = now;
                }
            }
            ItemWrite::Restore => {
                if let Some(item) = tables.items.get_mut(&item_id) {
                    item.availability = Availability::Available;
                    item.ordered_by = None;
                    item.updated_at = now;
                }
            }
            ItemWrite::Replace(item) => {
                tables.items.insert(item_id, item);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Money, PickupId, Scale, TransactionStatus, UserId};

    fn test_item() -> MarketItem {
        let now = Utc::now();
        MarketItem {
            id: ItemId::new(),
            name: "Scrap copper".to_string(),
            price: Money::from_cents(2_500_000),
            weight: 40.0,
            scale: Scale::Large,
            description: "Mixed wire".to_string(),
            thumbnail: None,
            posted_by: UserId::new(),
            ordered_by: None,
            availability: Availability::Available,
            created_at: now,
            updated_at: now,
        }
    }

    fn test_pickup(item_id: ItemId, cycle: i64) -> PickupInformation {
        let now = Utc::now();
        PickupInformation {
            id: PickupId::new(),
            item_id,
            cycle,
            recipient_name: "Sari".to_string(),
            recipient_phone: "081234".to_string(),
            description: String::new(),
            pickup_address: "Jl. Sudirman 5".to_string(),
            pickup_description: String::new(),
            service_price: Money::from_cents(100_000),
            delivery_price: Money::from_cents(6_000_000),
            created_at: now,
            updated_at: now,
        }
    }

    fn open_cycle(item_id: ItemId, orderer: UserId, cycle: i64, expected: Sequence) -> Transition {
        let pickup = test_pickup(item_id, cycle);
        Transition {
            item_id,
            expected_sequence: expected,
            activity: TransactionActivity::new(
                item_id,
                TransactionStatus::OnProcess,
                Some(pickup.id),
                expected.next(),
            ),
            pickup: Some(pickup),
            item: ItemWrite::Withdraw {
                ordered_by: orderer,
            },
        }
    }

    #[tokio::test]
    async fn insert_and_get_item() {
        let store = InMemoryMarketStore::new();
        let item = test_item();
        store.insert_item(item.clone()).await.unwrap();

        let loaded = store.get_item(item.id).await.unwrap();
        assert_eq!(loaded, Some(item));
        assert!(store.get_item(ItemId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_withdraws_item_and_appends_activity() {
        let store = InMemoryMarketStore::new();
        let item = test_item();
        let orderer = UserId::new();
        store.insert_item(item.clone()).await.unwrap();

        store
            .commit(open_cycle(item.id, orderer, 1, Sequence::initial()))
            .await
            .unwrap();

        let stored = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.availability, Availability::Withdrawn);
        assert_eq!(stored.ordered_by, Some(orderer));
        assert_eq!(store.activity_count().await, 1);
        assert_eq!(store.pickup_count().await, 1);

        let open = store.list_items(ItemQuery::open_catalog()).await.unwrap();
        assert!(open.is_empty());
        let all = store.list_items(ItemQuery::new()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn stale_sequence_is_rejected_without_writes() {
        let store = InMemoryMarketStore::new();
        let item = test_item();
        store.insert_item(item.clone()).await.unwrap();

        store
            .commit(open_cycle(item.id, UserId::new(), 1, Sequence::initial()))
            .await
            .unwrap();

        let result = store
            .commit(open_cycle(item.id, UserId::new(), 2, Sequence::initial()))
            .await;

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
        assert_eq!(store.activity_count().await, 1);
        assert_eq!(store.pickup_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_cycle_is_rejected() {
        let store = InMemoryMarketStore::new();
        let item = test_item();
        store.insert_item(item.clone()).await.unwrap();

        store
            .commit(open_cycle(item.id, UserId::new(), 1, Sequence::initial()))
            .await
            .unwrap();
        let result = store
            .commit(open_cycle(item.id, UserId::new(), 1, Sequence::first()))
            .await;

        assert!(matches!(result, Err(StoreError::PickupConflict { cycle: 1, .. })));
        assert_eq!(store.activity_count().await, 1);
    }

    #[tokio::test]
    async fn restore_clears_orderer() {
        let store = InMemoryMarketStore::new();
        let item = test_item();
        store.insert_item(item.clone()).await.unwrap();
        store
            .commit(open_cycle(item.id, UserId::new(), 1, Sequence::initial()))
            .await
            .unwrap();

        let pickup = store.current_pickup(item.id).await.unwrap().unwrap();
        store
            .commit(Transition {
                item_id: item.id,
                expected_sequence: Sequence::first(),
                pickup: None,
                activity: TransactionActivity::new(
                    item.id,
                    TransactionStatus::Cancelled,
                    Some(pickup.id),
                    Sequence::new(2),
                ),
                item: ItemWrite::Restore,
            })
            .await
            .unwrap();

        let stored = store.get_item(item.id).await.unwrap().unwrap();
        assert!(stored.is_available());
        assert!(stored.ordered_by.is_none());

        let latest = store.latest_activity(item.id).await.unwrap().unwrap();
        assert_eq!(latest.status, TransactionStatus::Cancelled);
    }

    #[tokio::test]
    async fn current_pickup_is_highest_cycle() {
        let store = InMemoryMarketStore::new();
        let item = test_item();
        store.insert_item(item.clone()).await.unwrap();

        store
            .commit(open_cycle(item.id, UserId::new(), 1, Sequence::initial()))
            .await
            .unwrap();
        store
            .commit(open_cycle(item.id, UserId::new(), 2, Sequence::first()))
            .await
            .unwrap();

        let current = store.current_pickup(item.id).await.unwrap().unwrap();
        assert_eq!(current.cycle, 2);
    }

    #[tokio::test]
    async fn latest_activities_one_row_per_item() {
        let store = InMemoryMarketStore::new();
        let first = test_item();
        let second = test_item();
        let untouched = test_item();
        for item in [&first, &second, &untouched] {
            store.insert_item(item.clone()).await.unwrap();
        }

        store
            .commit(open_cycle(first.id, UserId::new(), 1, Sequence::initial()))
            .await
            .unwrap();
        store
            .commit(open_cycle(first.id, UserId::new(), 2, Sequence::first()))
            .await
            .unwrap();
        store
            .commit(open_cycle(second.id, UserId::new(), 1, Sequence::initial()))
            .await
            .unwrap();

        let rows = store.latest_activities().await.unwrap();
        assert_eq!(rows.len(), 2);
        let first_row = rows.iter().find(|(_, item)| item.id == first.id).unwrap();
        assert_eq!(first_row.0.sequence, Sequence::new(2));
    }

    #[tokio::test]
    async fn delete_removes_history() {
        let store = InMemoryMarketStore::new();
        let item = test_item();
        store.insert_item(item.clone()).await.unwrap();
        store
            .commit(open_cycle(item.id, UserId::new(), 1, Sequence::initial()))
            .await
            .unwrap();

        // Withdrawn items stay put.
        assert!(!store.delete_item(item.id).await.unwrap());
        assert_eq!(store.activity_count().await, 1);

        let pickup = store.current_pickup(item.id).await.unwrap().unwrap();
        store
            .commit(Transition {
                item_id: item.id,
                expected_sequence: Sequence::first(),
                pickup: None,
                activity: TransactionActivity::new(
                    item.id,
                    TransactionStatus::Cancelled,
                    Some(pickup.id),
                    Sequence::new(2),
                ),
                item: ItemWrite::Restore,
            })
            .await
            .unwrap();

        assert!(store.delete_item(item.id).await.unwrap());
        assert!(!store.delete_item(item.id).await.unwrap());
        assert_eq!(store.activity_count().await, 0);
        assert_eq!(store.pickup_count().await, 0);
    }

    #[tokio::test]
    async fn update_listing_keeps_availability_and_orderer() {
        let store = InMemoryMarketStore::new();
        let item = test_item();
        store.insert_item(item.clone()).await.unwrap();

        let mut edited = item.clone();
        edited.name = "Bottle caps".to_string();
        edited.ordered_by = Some(UserId::new());
        edited.availability = Availability::Withdrawn;
        assert!(store.update_listing(&edited).await.unwrap());

        let stored = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Bottle caps");
        assert!(stored.is_available());
        assert!(stored.ordered_by.is_none());
    }

    #[tokio::test]
    async fn update_listing_skips_withdrawn_item() {
        let store = InMemoryMarketStore::new();
        let item = test_item();
        let orderer = UserId::new();
        store.insert_item(item.clone()).await.unwrap();

        // Copy read before the order lands.
        let mut stale = item.clone();
        store
            .commit(open_cycle(item.id, orderer, 1, Sequence::initial()))
            .await
            .unwrap();

        stale.name = "Renamed".to_string();
        assert!(!store.update_listing(&stale).await.unwrap());

        let stored = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.availability, Availability::Withdrawn);
        assert_eq!(stored.ordered_by, Some(orderer));
        assert_eq!(stored.name, item.name);
        assert!(!store.update_listing(&test_item()).await.unwrap());
    }

    #[tokio::test]
    async fn commit_on_missing_item_fails() {
        let store = InMemoryMarketStore::new();
        let item_id = ItemId::new();
        let result = store
            .commit(open_cycle(item_id, UserId::new(), 1, Sequence::initial()))
            .await;
        assert!(matches!(result, Err(StoreError::ItemNotFound(id)) if id == item_id));
    }
}
