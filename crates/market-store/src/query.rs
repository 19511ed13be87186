use crate::{Availability, MarketItem, Scale, UserId};

/// Builder for filtering market item scans.
///
/// An empty query matches every item regardless of availability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    /// Filter by scale.
    pub scale: Option<Scale>,

    /// Filter by poster.
    pub posted_by: Option<UserId>,

    /// Filter by availability.
    pub availability: Option<Availability>,
}

impl ItemQuery {
    /// Creates a query with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query over items visible in the open catalog.
    pub fn open_catalog() -> Self {
        Self {
            availability: Some(Availability::Available),
            ..Default::default()
        }
    }

    /// Filters by scale when one is given.
    pub fn scale(mut self, scale: Option<Scale>) -> Self {
        self.scale = scale;
        self
    }

    /// Filters by poster.
    pub fn posted_by(mut self, user_id: UserId) -> Self {
        self.posted_by = Some(user_id);
        self
    }

    /// Returns true if the item satisfies every filter.
    pub fn matches(&self, item: &MarketItem) -> bool {
        if let Some(scale) = self.scale
            && item.scale != scale
        {
            return false;
        }
        if let Some(user_id) = self.posted_by
            && item.posted_by != user_id
        {
            return false;
        }
        if let Some(availability) = self.availability
            && item.availability != availability
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{ItemId, Money};

    fn item(scale: Scale, availability: Availability, posted_by: UserId) -> MarketItem {
        MarketItem {
            id: ItemId::new(),
            name: "Cardboard".to_string(),
            price: Money::from_cents(5_000),
            weight: 10.0,
            scale,
            description: String::new(),
            thumbnail: None,
            posted_by,
            ordered_by: None,
            availability,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        let query = ItemQuery::new();
        let user = UserId::new();
        assert!(query.matches(&item(Scale::Small, Availability::Withdrawn, user)));
        assert!(query.matches(&item(Scale::Large, Availability::Available, user)));
    }

    #[test]
    fn open_catalog_hides_withdrawn_items() {
        let query = ItemQuery::open_catalog();
        let user = UserId::new();
        assert!(query.matches(&item(Scale::Small, Availability::Available, user)));
        assert!(!query.matches(&item(Scale::Small, Availability::Withdrawn, user)));
    }

    #[test]
    fn combined_filters() {
        let poster = UserId::new();
        let query = ItemQuery::new()
            .scale(Some(Scale::Large))
            .posted_by(poster);

        assert!(query.matches(&item(Scale::Large, Availability::Withdrawn, poster)));
        assert!(!query.matches(&item(Scale::Small, Availability::Available, poster)));
        assert!(!query.matches(&item(Scale::Large, Availability::Available, UserId::new())));
    }
}
