//! Market service providing the catalog, pickup and lifecycle operations.

use std::sync::Arc;

use common::ItemId;
use market_store::{MarketItem, MarketStore, MarketStoreExt, PickupInformation, Transition};

use crate::error::DomainError;
use crate::identity::Identity;

use super::{MarketError, NoopThumbnailStore, ThumbnailStore};

/// Service for managing market items and their transactions.
///
/// Every lifecycle write goes through a single [`MarketStore::commit`], so
/// the item row, the pickup and the appended activity change together.
/// The operations themselves live in the catalog, pickup and lifecycle
/// modules.
pub struct MarketService<S: MarketStore> {
    store: S,
    thumbnails: Arc<dyn ThumbnailStore>,
}

impl<S: MarketStore> MarketService<S> {
    /// Creates a new market service that never touches thumbnail files.
    pub fn new(store: S) -> Self {
        Self::with_thumbnails(store, Arc::new(NoopThumbnailStore))
    }

    /// Creates a new market service with a thumbnail store.
    pub fn with_thumbnails(store: S, thumbnails: Arc<dyn ThumbnailStore>) -> Self {
        Self { store, thumbnails }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an item in any availability.
    pub(crate) async fn existing_item(&self, id: ItemId) -> Result<MarketItem, DomainError> {
        self.store
            .get_item(id)
            .await?
            .ok_or_else(|| MarketError::ItemNotFound(id).into())
    }

    /// Loads an item visible in the open catalog. Withdrawn items are
    /// reported as missing.
    pub(crate) async fn open_item(&self, id: ItemId) -> Result<MarketItem, DomainError> {
        match self.store.get_item(id).await? {
            Some(item) if item.is_available() => Ok(item),
            _ => Err(MarketError::ItemNotFound(id).into()),
        }
    }

    /// Returns the item's current pickup if its cycle has not ended yet.
    pub(crate) async fn open_pickup(
        &self,
        item_id: ItemId,
    ) -> Result<Option<PickupInformation>, DomainError> {
        let Some(pickup) = self.store.current_pickup(item_id).await? else {
            return Ok(None);
        };

        let cycle = self.store.activities_for_pickup(item_id, pickup.id).await?;
        match cycle.last() {
            Some(last) if last.status.is_terminal() => Ok(None),
            _ => Ok(Some(pickup)),
        }
    }

    /// Checks that the caller posted the item and manages its scale.
    pub(crate) fn authorize_owner(
        &self,
        identity: &Identity,
        item: &MarketItem,
    ) -> Result<(), MarketError> {
        if item.posted_by != identity.user_id {
            return Err(MarketError::NotPoster);
        }
        if identity.role.producer_scale() != Some(item.scale) {
            return Err(MarketError::ScaleMismatch {
                role: identity.role,
                scale: item.scale,
            });
        }
        Ok(())
    }

    /// Commits a transition, counting the ones that lost a race.
    pub(crate) async fn commit(&self, transition: Transition) -> Result<(), DomainError> {
        let item_id = transition.item_id;
        let status = transition.activity.status;

        if let Err(err) = self.store.commit(transition).await {
            if err.is_conflict() {
                metrics::counter!("market_commit_conflicts_total").increment(1);
                tracing::warn!(%item_id, %status, error = %err, "transition rejected");
            }
            return Err(err.into());
        }

        metrics::counter!("market_transitions_total", "status" => status.as_str()).increment(1);
        Ok(())
    }

    /// Removes a thumbnail file. Failures are logged, not returned.
    pub(crate) async fn discard_thumbnail(&self, reference: &str) {
        if let Err(err) = self.thumbnails.remove(reference).await {
            tracing::warn!(thumbnail = reference, error = %err, "failed to remove thumbnail");
        }
    }
}
