use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActivityId, ItemId, PickupId, UserId};

/// Money amount in minor units, avoiding floating point drift.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units (cents).
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

/// Error returned when a stored or submitted enum string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Size classification of a market item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scale {
    Small,
    Large,
}

impl Scale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Small => "SMALL",
            Scale::Large => "LARGE",
        }
    }
}

impl std::fmt::Display for Scale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scale {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SMALL" => Ok(Scale::Small),
            "LARGE" => Ok(Scale::Large),
            other => Err(ParseEnumError {
                kind: "scale",
                value: other.to_string(),
            }),
        }
    }
}

/// Whether an item is visible in the open catalog.
///
/// An item is withdrawn while an order is running on it. Withdrawal is
/// reversible and never removes the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Availability {
    #[default]
    Available,
    Withdrawn,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "AVAILABLE",
            Availability::Withdrawn => "WITHDRAWN",
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(Availability::Available),
            "WITHDRAWN" => Ok(Availability::Withdrawn),
            other => Err(ParseEnumError {
                kind: "availability",
                value: other.to_string(),
            }),
        }
    }
}

/// Status carried by a transaction activity.
///
/// ```text
/// (READY) ──► ON_PROCESS ──► ON_DELIVER ──► FINISHED
///                 │              │
///                 └──────────────┴──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    OnProcess,
    OnDeliver,
    Finished,
    Cancelled,
}

impl TransactionStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TransactionStatus; 4] = [
        TransactionStatus::OnProcess,
        TransactionStatus::OnDeliver,
        TransactionStatus::Finished,
        TransactionStatus::Cancelled,
    ];

    /// Returns true if no further status may follow within the same cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Finished | TransactionStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::OnProcess => "ON_PROCESS",
            TransactionStatus::OnDeliver => "ON_DELIVER",
            TransactionStatus::Finished => "FINISHED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "status",
                value: s.to_string(),
            })
    }
}

/// Position of an activity in its item's ledger.
///
/// Sequences start at 1 for the first activity on an item and increase by
/// one per append, so "latest" never depends on clock resolution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(i64);

impl Sequence {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The sequence of an item with an empty ledger (0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// The sequence of the first activity (1).
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recyclable good offered on the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketItem {
    pub id: ItemId,
    pub name: String,
    pub price: Money,
    /// Weight in kilograms.
    pub weight: f64,
    pub scale: Scale,
    pub description: String,
    /// Reference returned by the thumbnail storage collaborator.
    pub thumbnail: Option<String>,
    pub posted_by: UserId,
    pub ordered_by: Option<UserId>,
    pub availability: Availability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MarketItem {
    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }
}

/// Pickup details recorded when a consumer orders an item.
///
/// Each pickup opens one ordering cycle; `cycle` counts the cycles of the
/// item starting at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupInformation {
    pub id: PickupId,
    pub item_id: ItemId,
    pub cycle: i64,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub description: String,
    pub pickup_address: String,
    pub pickup_description: String,
    pub service_price: Money,
    pub delivery_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable status record in an item's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionActivity {
    pub id: ActivityId,
    pub item_id: ItemId,
    pub status: TransactionStatus,
    /// The pickup that produced this record. `None` only for a FINISHED
    /// record written by an item update outside any open cycle.
    pub pickup_id: Option<PickupId>,
    pub sequence: Sequence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionActivity {
    /// Creates a new activity stamped with the current time.
    pub fn new(
        item_id: ItemId,
        status: TransactionStatus,
        pickup_id: Option<PickupId>,
        sequence: Sequence,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ActivityId::new(),
            item_id,
            status,
            pickup_id,
            sequence,
            created_at: now,
            updated_at: now,
        }
    }
}
