//! Transaction lifecycle: status appends and ledger reads.

use common::{ItemId, UserId};
use market_store::{
    Availability, ItemWrite, MarketItem, MarketStore, MarketStoreExt, TransactionActivity,
    TransactionStatus, Transition,
};
use serde::Serialize;

use crate::error::DomainError;

use super::{CurrentStatus, MarketError, MarketService};

/// The latest activity of an item together with the item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub activity: TransactionActivity,
    pub item: MarketItem,
}

impl<S: MarketStore> MarketService<S> {
    /// Records a new status for the item's current ordering cycle.
    ///
    /// Only the poster may advance the cycle. A status already recorded for
    /// the cycle is rejected, and nothing may follow a terminal status.
    /// `CANCELLED` returns the item to the open catalog.
    #[tracing::instrument(skip(self))]
    pub async fn append_status(
        &self,
        item_id: ItemId,
        caller: UserId,
        status: TransactionStatus,
    ) -> Result<TransactionActivity, DomainError> {
        let item = self.existing_item(item_id).await?;
        if item.posted_by != caller {
            return Err(MarketError::NotPoster.into());
        }

        let pickup = self
            .store()
            .current_pickup(item_id)
            .await?
            .ok_or(MarketError::PickupNotFound(item_id))?;

        let cycle = self.store().activities_for_pickup(item_id, pickup.id).await?;
        if cycle.iter().any(|activity| activity.status == status) {
            return Err(MarketError::DuplicateStatus { status }.into());
        }
        if let Some(last) = cycle.last()
            && last.status.is_terminal()
        {
            return Err(MarketError::CycleClosed {
                last: last.status,
                requested: status,
            }
            .into());
        }

        let expected_sequence = self.store().current_sequence(item_id).await?;
        let activity =
            TransactionActivity::new(item_id, status, Some(pickup.id), expected_sequence.next());
        let item_write = match status {
            TransactionStatus::Cancelled => ItemWrite::Restore,
            _ => ItemWrite::Keep,
        };

        self.commit(Transition {
            item_id,
            expected_sequence,
            pickup: None,
            activity: activity.clone(),
            item: item_write,
        })
        .await?;

        tracing::info!(%item_id, %status, sequence = %activity.sequence, "status appended");
        Ok(activity)
    }

    /// Records `FINISHED` for an item closed through the catalog update path
    /// and stores the already patched item as withdrawn.
    ///
    /// The record joins the current pickup when its cycle is still open;
    /// otherwise it carries no pickup.
    pub(crate) async fn finish_via_catalog_update(
        &self,
        mut item: MarketItem,
    ) -> Result<TransactionActivity, DomainError> {
        let item_id = item.id;
        let status = TransactionStatus::Finished;
        let pickup_id = self.open_pickup(item_id).await?.map(|pickup| pickup.id);

        if self.store().has_status(item_id, pickup_id, status).await? {
            return Err(MarketError::DuplicateStatus { status }.into());
        }

        let expected_sequence = self.store().current_sequence(item_id).await?;
        let activity = TransactionActivity::new(item_id, status, pickup_id, expected_sequence.next());
        item.availability = Availability::Withdrawn;

        self.commit(Transition {
            item_id,
            expected_sequence,
            pickup: None,
            activity: activity.clone(),
            item: ItemWrite::Replace(item),
        })
        .await?;

        tracing::info!(%item_id, pickup_id = ?pickup_id, "item finished through catalog update");
        Ok(activity)
    }

    /// Returns the status of the item's latest activity across all cycles,
    /// or `READY` if it has none.
    #[tracing::instrument(skip(self))]
    pub async fn current_status(&self, item_id: ItemId) -> Result<CurrentStatus, DomainError> {
        self.existing_item(item_id).await?;
        let latest = self.store().latest_activity(item_id).await?;
        Ok(CurrentStatus::from_latest(latest.as_ref()))
    }

    /// Returns the latest activity of every item that has one, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn latest_transactions_across_catalog(
        &self,
    ) -> Result<Vec<LedgerEntry>, DomainError> {
        Ok(self
            .store()
            .latest_activities()
            .await?
            .into_iter()
            .map(|(activity, item)| LedgerEntry { activity, item })
            .collect())
    }

    /// Returns the latest transactions on items the user posted or ordered.
    #[tracing::instrument(skip(self))]
    pub async fn transactions_for(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, DomainError> {
        let entries = self.latest_transactions_across_catalog().await?;
        Ok(entries
            .into_iter()
            .filter(|entry| {
                entry.item.posted_by == user_id || entry.item.ordered_by == Some(user_id)
            })
            .collect())
    }
}
