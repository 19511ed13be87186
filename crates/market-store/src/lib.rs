pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use common::{ActivityId, ItemId, PickupId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryMarketStore;
pub use postgres::PostgresMarketStore;
pub use query::ItemQuery;
pub use record::{
    Availability, MarketItem, Money, ParseEnumError, PickupInformation, Scale, Sequence,
    TransactionActivity, TransactionStatus,
};
pub use store::{ItemWrite, MarketStore, MarketStoreExt, Transition};
