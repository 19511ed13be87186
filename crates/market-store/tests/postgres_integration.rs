//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p market-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use market_store::{
    Availability, ItemId, ItemQuery, ItemWrite, MarketItem, MarketStore, MarketStoreExt, Money,
    PickupId, PickupInformation, PostgresMarketStore, Scale, Sequence, StoreError,
    TransactionActivity, TransactionStatus, Transition, UserId,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresMarketStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresMarketStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE market_item_activities, market_item_pickups, market_items")
        .execute(&pool)
        .await
        .unwrap();

    PostgresMarketStore::new(pool)
}

fn test_item(scale: Scale, weight: f64) -> MarketItem {
    // Postgres stores microseconds; truncate so round trips compare equal.
    let now = Utc::now()
        .date_naive()
        .and_hms_opt(8, 0, 0)
        .unwrap()
        .and_utc();
    MarketItem {
        id: ItemId::new(),
        name: "Used cooking oil".to_string(),
        price: Money::from_cents(1_200_000),
        weight,
        scale,
        description: "Jerry cans".to_string(),
        thumbnail: Some("/uploads/markets/oil.png".to_string()),
        posted_by: UserId::new(),
        ordered_by: None,
        availability: Availability::Available,
        created_at: now,
        updated_at: now,
    }
}

fn open_cycle(item_id: ItemId, cycle: i64, expected: Sequence, orderer: UserId) -> Transition {
    let pickup = PickupInformation {
        id: PickupId::new(),
        item_id,
        cycle,
        recipient_name: "Dewi".to_string(),
        recipient_phone: "0813".to_string(),
        description: String::new(),
        pickup_address: "Jl. Gatot Subroto 9".to_string(),
        pickup_description: "Gate B".to_string(),
        service_price: Money::from_cents(100_000),
        delivery_price: Money::from_cents(3_000_000),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
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
async fn insert_and_list_items() {
    let store = get_test_store().await;
    let small = test_item(Scale::Small, 10.0);
    let large = test_item(Scale::Large, 40.0);
    store.insert_item(small.clone()).await.unwrap();
    store.insert_item(large.clone()).await.unwrap();

    let loaded = store.get_item(small.id).await.unwrap().unwrap();
    assert_eq!(loaded, small);

    let larges = store
        .list_items(ItemQuery::open_catalog().scale(Some(Scale::Large)))
        .await
        .unwrap();
    assert_eq!(larges.len(), 1);
    assert_eq!(larges[0].id, large.id);
}

#[tokio::test]
async fn commit_is_atomic_and_withdraws_item() {
    let store = get_test_store().await;
    let item = test_item(Scale::Large, 60.0);
    let orderer = UserId::new();
    store.insert_item(item.clone()).await.unwrap();

    store
        .commit(open_cycle(item.id, 1, Sequence::initial(), orderer))
        .await
        .unwrap();

    let stored = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(stored.availability, Availability::Withdrawn);
    assert_eq!(stored.ordered_by, Some(orderer));

    let open = store.list_items(ItemQuery::open_catalog()).await.unwrap();
    assert!(open.is_empty());

    let pickup = store.current_pickup(item.id).await.unwrap().unwrap();
    let history = store
        .activities_for_pickup(item.id, pickup.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TransactionStatus::OnProcess);
}

#[tokio::test]
async fn stale_sequence_rolls_back_everything() {
    let store = get_test_store().await;
    let item = test_item(Scale::Large, 60.0);
    store.insert_item(item.clone()).await.unwrap();

    store
        .commit(open_cycle(item.id, 1, Sequence::initial(), UserId::new()))
        .await
        .unwrap();

    let result = store
        .commit(open_cycle(item.id, 2, Sequence::initial(), UserId::new()))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { .. })
    ));

    let current = store.current_pickup(item.id).await.unwrap().unwrap();
    assert_eq!(current.cycle, 1);
    assert_eq!(store.activities_for_item(item.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_cycle_maps_to_pickup_conflict() {
    let store = get_test_store().await;
    let item = test_item(Scale::Large, 20.0);
    store.insert_item(item.clone()).await.unwrap();

    store
        .commit(open_cycle(item.id, 1, Sequence::initial(), UserId::new()))
        .await
        .unwrap();
    let result = store
        .commit(open_cycle(item.id, 1, Sequence::first(), UserId::new()))
        .await;

    assert!(matches!(result, Err(StoreError::PickupConflict { .. })));
    assert_eq!(store.current_sequence(item.id).await.unwrap(), Sequence::first());
}

#[tokio::test]
async fn restore_and_latest_activities() {
    let store = get_test_store().await;
    let item = test_item(Scale::Large, 20.0);
    store.insert_item(item.clone()).await.unwrap();
    store
        .commit(open_cycle(item.id, 1, Sequence::initial(), UserId::new()))
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

    let rows = store.latest_activities().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0.status, TransactionStatus::Cancelled);
    assert_eq!(rows[0].1.id, item.id);
}

#[tokio::test]
async fn delete_cascades_to_history() {
    let store = get_test_store().await;
    let item = test_item(Scale::Large, 20.0);
    store.insert_item(item.clone()).await.unwrap();
    // A cycle opened with a non-withdrawing status leaves the item listed.
    let mut transition = open_cycle(item.id, 1, Sequence::initial(), UserId::new());
    transition.item = ItemWrite::Keep;
    store.commit(transition).await.unwrap();

    assert!(store.delete_item(item.id).await.unwrap());
    assert!(store.activities_for_item(item.id).await.unwrap().is_empty());
    assert!(store.current_pickup(item.id).await.unwrap().is_none());
    assert!(!store.delete_item(item.id).await.unwrap());
}

#[tokio::test]
async fn withdrawn_item_rejects_listing_update_and_delete() {
    let store = get_test_store().await;
    let item = test_item(Scale::Large, 20.0);
    let orderer = UserId::new();
    store.insert_item(item.clone()).await.unwrap();

    let mut stale = item.clone();
    store
        .commit(open_cycle(item.id, 1, Sequence::initial(), orderer))
        .await
        .unwrap();

    stale.name = "Renamed".to_string();
    assert!(!store.update_listing(&stale).await.unwrap());
    assert!(!store.delete_item(item.id).await.unwrap());

    let stored = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(stored.availability, Availability::Withdrawn);
    assert_eq!(stored.ordered_by, Some(orderer));
    assert_eq!(stored.name, item.name);
}

#[tokio::test]
async fn update_listing_leaves_order_columns_alone() {
    let store = get_test_store().await;
    let item = test_item(Scale::Small, 5.0);
    store.insert_item(item.clone()).await.unwrap();

    let mut edited = item.clone();
    edited.weight = 7.5;
    edited.availability = Availability::Withdrawn;
    edited.ordered_by = Some(UserId::new());
    assert!(store.update_listing(&edited).await.unwrap());

    let stored = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(stored.weight, 7.5);
    assert!(stored.is_available());
    assert!(stored.ordered_by.is_none());
}
