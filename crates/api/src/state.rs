//! Shared application state.

use domain::MarketService;
use market_store::MarketStore;

use crate::auth::Authenticator;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketStore> {
    pub market: MarketService<S>,
    pub auth: Authenticator,
}
