//! Pickup and transaction status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{DomainError, NewPickup, Role, parse_status};
use market_store::MarketStore;
use serde::Deserialize;

use super::parse_item_id;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::response::{
    ActivityResponse, ApiResponse, PickupCreatedResponse, PickupDetailResponse,
    TransactionResponse,
};
use crate::state::AppState;

const PARTICIPANTS: &[Role] = &[Role::ProducerLarge, Role::ConsumerLarge];

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePickupRequest {
    pub item_id: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    #[serde(default)]
    pub description: String,
    pub pickup_address: String,
    #[serde(default)]
    pub pickup_description: String,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Handlers --

/// GET /market_transactions
#[tracing::instrument(skip_all, fields(user_id = %auth.user_id()))]
pub async fn list<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>, ApiError> {
    auth.require_role(PARTICIPANTS)?;
    let entries = state.market.transactions_for(auth.user_id()).await?;
    Ok(ApiResponse::ok(
        "Market item transactions fetched successfully",
        entries.into_iter().map(Into::into).collect(),
    ))
}

/// POST /market_transactions
#[tracing::instrument(skip_all, fields(user_id = %auth.user_id()))]
pub async fn create<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
    JsonBody(req): JsonBody<CreatePickupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PickupCreatedResponse>>), ApiError> {
    auth.require_role(&[Role::ConsumerLarge])?;
    let item_id = parse_item_id(&req.item_id)?;

    let receipt = state
        .market
        .create_pickup(
            &auth.identity,
            NewPickup {
                item_id,
                recipient_name: req.recipient_name,
                recipient_phone: req.recipient_phone,
                description: req.description,
                pickup_address: req.pickup_address,
                pickup_description: req.pickup_description,
                requested_status: req.status,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(
            "Pickup information created successfully",
            receipt.into(),
        ),
    ))
}

/// GET /market_transactions/{item_id}
#[tracing::instrument(skip(state, auth))]
pub async fn get<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
    Path(item_id): Path<String>,
) -> Result<Json<ApiResponse<PickupDetailResponse>>, ApiError> {
    auth.require_role(PARTICIPANTS)?;
    let item_id = parse_item_id(&item_id)?;
    let detail = state
        .market
        .get_pickup_by_item(item_id, auth.user_id())
        .await?;
    Ok(ApiResponse::ok(
        "Pickup information fetched successfully",
        detail.into(),
    ))
}

/// PUT /market_transactions/{item_id}
#[tracing::instrument(skip(state, auth, req))]
pub async fn update_status<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
    Path(item_id): Path<String>,
    JsonBody(req): JsonBody<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<ActivityResponse>>, ApiError> {
    auth.require_role(&[Role::ProducerLarge])?;
    let item_id = parse_item_id(&item_id)?;
    let status = parse_status(req.status.trim()).map_err(DomainError::from)?;

    let activity = state
        .market
        .append_status(item_id, auth.user_id(), status)
        .await?;
    Ok(ApiResponse::ok(
        "Transaction status updated successfully",
        activity.into(),
    ))
}
