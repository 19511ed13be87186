use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    ActivityId, ItemId, ItemQuery, MarketItem, Money, PickupId, PickupInformation, Result,
    Sequence, StoreError, TransactionActivity, UserId,
    store::{ItemWrite, MarketStore, Transition, validate_transition},
};

const ITEM_COLUMNS: &str = "id, name, price_cents, weight, scale, description, thumbnail, \
     posted_by, ordered_by, availability, created_at, updated_at";

const PICKUP_COLUMNS: &str = "id, item_id, cycle, recipient_name, recipient_phone, description, \
     pickup_address, pickup_description, service_price_cents, delivery_price_cents, \
     created_at, updated_at";

const ACTIVITY_COLUMNS: &str = "id, item_id, status, pickup_id, sequence, created_at, updated_at";

/// PostgreSQL-backed market store implementation.
#[derive(Clone)]
pub struct PostgresMarketStore {
    pool: PgPool,
}

impl PostgresMarketStore {
    /// Creates a new PostgreSQL market store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn decode<T: std::str::FromStr>(value: String) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        value
            .parse()
            .map_err(|e: T::Err| StoreError::Decode(e.to_string()))
    }

    fn row_to_item(row: &PgRow) -> Result<MarketItem> {
        Ok(MarketItem {
            id: ItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            weight: row.try_get("weight")?,
            scale: Self::decode(row.try_get("scale")?)?,
            description: row.try_get("description")?,
            thumbnail: row.try_get("thumbnail")?,
            posted_by: UserId::from_uuid(row.try_get::<Uuid, _>("posted_by")?),
            ordered_by: row
                .try_get::<Option<Uuid>, _>("ordered_by")?
                .map(UserId::from_uuid),
            availability: Self::decode(row.try_get("availability")?)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_pickup(row: &PgRow) -> Result<PickupInformation> {
        Ok(PickupInformation {
            id: PickupId::from_uuid(row.try_get::<Uuid, _>("id")?),
            item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("item_id")?),
            cycle: row.try_get("cycle")?,
            recipient_name: row.try_get("recipient_name")?,
            recipient_phone: row.try_get("recipient_phone")?,
            description: row.try_get("description")?,
            pickup_address: row.try_get("pickup_address")?,
            pickup_description: row.try_get("pickup_description")?,
            service_price: Money::from_cents(row.try_get("service_price_cents")?),
            delivery_price: Money::from_cents(row.try_get("delivery_price_cents")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_activity(row: &PgRow) -> Result<TransactionActivity> {
        Ok(TransactionActivity {
            id: ActivityId::from_uuid(row.try_get::<Uuid, _>("id")?),
            item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("item_id")?),
            status: Self::decode(row.try_get("status")?)?,
            pickup_id: row
                .try_get::<Option<Uuid>, _>("pickup_id")?
                .map(PickupId::from_uuid),
            sequence: Sequence::new(row.try_get("sequence")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn replace_item(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        item: &MarketItem,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE market_items
            SET name = $2, price_cents = $3, weight = $4, description = $5, thumbnail = $6,
                ordered_by = $7, availability = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.price.cents())
        .bind(item.weight)
        .bind(&item.description)
        .bind(&item.thumbnail)
        .bind(item.ordered_by.map(|u| u.as_uuid()))
        .bind(item.availability.as_str())
        .bind(item.updated_at)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ItemNotFound(item.id));
        }
        Ok(())
    }

    /// Applies every statement of a transition inside an open transaction.
    async fn apply(tx: &mut sqlx::Transaction<'_, Postgres>, transition: Transition) -> Result<()> {
        let item_id = transition.item_id;

        // Row lock serializes concurrent transitions on the same item.
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM market_items WHERE id = $1 FOR UPDATE")
                .bind(item_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::ItemNotFound(item_id));
        }

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(sequence) FROM market_item_activities WHERE item_id = $1",
        )
        .bind(item_id.as_uuid())
        .fetch_one(&mut **tx)
        .await?;

        let actual = Sequence::new(current.unwrap_or(0));
        if actual != transition.expected_sequence {
            return Err(StoreError::ConcurrencyConflict {
                item_id,
                expected: transition.expected_sequence,
                actual,
            });
        }

        if let Some(pickup) = &transition.pickup {
            sqlx::query(
                r#"
                INSERT INTO market_item_pickups (id, item_id, cycle, recipient_name, recipient_phone,
                    description, pickup_address, pickup_description, service_price_cents,
                    delivery_price_cents, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(pickup.id.as_uuid())
            .bind(pickup.item_id.as_uuid())
            .bind(pickup.cycle)
            .bind(&pickup.recipient_name)
            .bind(&pickup.recipient_phone)
            .bind(&pickup.description)
            .bind(&pickup.pickup_address)
            .bind(&pickup.pickup_description)
            .bind(pickup.service_price.cents())
            .bind(pickup.delivery_price.cents())
            .bind(pickup.created_at)
            .bind(pickup.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_item_cycle")
                {
                    return StoreError::PickupConflict {
                        item_id,
                        cycle: pickup.cycle,
                    };
                }
                StoreError::Database(e)
            })?;
        }

        let activity = &transition.activity;
        sqlx::query(
            r#"
            INSERT INTO market_item_activities (id, item_id, status, pickup_id, sequence, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(activity.id.as_uuid())
        .bind(activity.item_id.as_uuid())
        .bind(activity.status.as_str())
        .bind(activity.pickup_id.map(|p| p.as_uuid()))
        .bind(activity.sequence.as_i64())
        .bind(activity.created_at)
        .bind(activity.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_item_sequence")
            {
                return StoreError::ConcurrencyConflict {
                    item_id,
                    expected: transition.expected_sequence,
                    actual: activity.sequence,
                };
            }
            StoreError::Database(e)
        })?;

        match &transition.item {
            ItemWrite::Keep => {}
            ItemWrite::Withdraw { ordered_by } => {
                sqlx::query(
                    "UPDATE market_items SET availability = 'WITHDRAWN', ordered_by = $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(item_id.as_uuid())
                .bind(ordered_by.as_uuid())
                .execute(&mut **tx)
                .await?;
            }
            ItemWrite::Restore => {
                sqlx::query(
                    "UPDATE market_items SET availability = 'AVAILABLE', ordered_by = NULL, updated_at = NOW() WHERE id = $1",
                )
                .bind(item_id.as_uuid())
                .execute(&mut **tx)
                .await?;
            }
            ItemWrite::Replace(item) => {
                Self::replace_item(tx, item).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MarketStore for PostgresMarketStore {
    async fn insert_item(&self, item: MarketItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO market_items (id, name, price_cents, weight, scale, description, thumbnail,
                posted_by, ordered_by, availability, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.price.cents())
        .bind(item.weight)
        .bind(item.scale.as_str())
        .bind(&item.description)
        .bind(&item.thumbnail)
        .bind(item.posted_by.as_uuid())
        .bind(item.ordered_by.map(|u| u.as_uuid()))
        .bind(item.availability.as_str())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<MarketItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM market_items WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn list_items(&self, query: ItemQuery) -> Result<Vec<MarketItem>> {
        let mut sql = format!("SELECT {ITEM_COLUMNS} FROM market_items WHERE 1=1");
        let mut param_count = 0;

        if query.scale.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND scale = ${param_count}"));
        }
        if query.posted_by.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND posted_by = ${param_count}"));
        }
        if query.availability.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND availability = ${param_count}"));
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(scale) = query.scale {
            sqlx_query = sqlx_query.bind(scale.as_str());
        }
        if let Some(posted_by) = query.posted_by {
            sqlx_query = sqlx_query.bind(posted_by.as_uuid());
        }
        if let Some(availability) = query.availability {
            sqlx_query = sqlx_query.bind(availability.as_str());
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn update_listing(&self, item: &MarketItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE market_items
            SET name = $2, price_cents = $3, weight = $4, description = $5, thumbnail = $6,
                updated_at = $7
            WHERE id = $1 AND availability = 'AVAILABLE'
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.price.cents())
        .bind(item.weight)
        .bind(&item.description)
        .bind(&item.thumbnail)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM market_items WHERE id = $1 AND availability = 'AVAILABLE'")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn current_pickup(&self, item_id: ItemId) -> Result<Option<PickupInformation>> {
        let row = sqlx::query(&format!(
            "SELECT {PICKUP_COLUMNS} FROM market_item_pickups WHERE item_id = $1 ORDER BY cycle DESC LIMIT 1"
        ))
        .bind(item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_pickup).transpose()
    }

    async fn activities_for_item(&self, item_id: ItemId) -> Result<Vec<TransactionActivity>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM market_item_activities WHERE item_id = $1 ORDER BY sequence ASC"
        ))
        .bind(item_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_activity).collect()
    }

    async fn latest_activity(&self, item_id: ItemId) -> Result<Option<TransactionActivity>> {
        let row = sqlx::query(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM market_item_activities WHERE item_id = $1 ORDER BY sequence DESC LIMIT 1"
        ))
        .bind(item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_activity).transpose()
    }

    async fn latest_activities(&self) -> Result<Vec<(TransactionActivity, MarketItem)>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id AS activity_id, a.status, a.pickup_id, a.sequence,
                   a.created_at AS activity_created_at, a.updated_at AS activity_updated_at,
                   i.id, i.name, i.price_cents, i.weight, i.scale, i.description, i.thumbnail,
                   i.posted_by, i.ordered_by, i.availability, i.created_at, i.updated_at
            FROM (
                SELECT DISTINCT ON (item_id) *
                FROM market_item_activities
                ORDER BY item_id, sequence DESC
            ) a
            JOIN market_items i ON i.id = a.item_id
            ORDER BY a.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let item = Self::row_to_item(row)?;
                let activity = TransactionActivity {
                    id: ActivityId::from_uuid(row.try_get::<Uuid, _>("activity_id")?),
                    item_id: item.id,
                    status: Self::decode(row.try_get("status")?)?,
                    pickup_id: row
                        .try_get::<Option<Uuid>, _>("pickup_id")?
                        .map(PickupId::from_uuid),
                    sequence: Sequence::new(row.try_get("sequence")?),
                    created_at: row.try_get("activity_created_at")?,
                    updated_at: row.try_get("activity_updated_at")?,
                };
                Ok((activity, item))
            })
            .collect()
    }

    async fn commit(&self, transition: Transition) -> Result<()> {
        validate_transition(&transition)?;

        let mut tx = self.pool.begin().await?;
        match Self::apply(&mut tx, transition).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
