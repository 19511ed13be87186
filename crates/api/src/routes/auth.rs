//! Session endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use market_store::MarketStore;

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /auth/logout
///
/// Revokes the presented token.
#[tracing::instrument(skip_all, fields(user_id = %auth.user_id()))]
pub async fn logout<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
) -> Json<ApiResponse<()>> {
    state.auth.revoke(&auth).await;
    tracing::info!("token revoked");
    ApiResponse::done("Logout successful")
}
