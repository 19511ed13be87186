//! Market item catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{ItemPatch, NewItem, Role, parse_status};
use market_store::{MarketStore, Money};
use serde::Deserialize;

use super::parse_item_id;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::response::{ApiResponse, ItemResponse};
use crate::state::AppState;

const POSTERS: &[Role] = &[Role::Admin, Role::ProducerSmall, Role::ProducerLarge];
const PRODUCERS: &[Role] = &[Role::ProducerSmall, Role::ProducerLarge];

// -- Request types --

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub price_cents: i64,
    pub weight: f64,
    #[serde(default)]
    pub description: String,
    pub thumbnail: Option<String>,
}

impl From<CreateItemRequest> for NewItem {
    fn from(req: CreateItemRequest) -> Self {
        NewItem {
            name: req.name,
            price: Money::from_cents(req.price_cents),
            weight: req.weight,
            description: req.description,
            thumbnail: req.thumbnail,
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub weight: Option<f64>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub status: Option<String>,
}

impl UpdateItemRequest {
    fn into_patch(self) -> Result<ItemPatch, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_status(raw).map_err(domain::DomainError::from)?),
        };
        Ok(ItemPatch {
            name: self.name,
            price: self.price_cents.map(Money::from_cents),
            weight: self.weight,
            description: self.description,
            thumbnail: self.thumbnail,
            status,
        })
    }
}

// -- Handlers --

/// POST /markets
#[tracing::instrument(skip_all, fields(user_id = %auth.user_id()))]
pub async fn create<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
    JsonBody(req): JsonBody<CreateItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ItemResponse>>), ApiError> {
    auth.require_role(POSTERS)?;
    let item = state.market.create_item(&auth.identity, req.into()).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Market item created successfully", item.into()),
    ))
}

/// GET /markets
#[tracing::instrument(skip_all, fields(role = %auth.identity.role))]
pub async fn list<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<ItemResponse>>>, ApiError> {
    let items = state.market.list_items(auth.identity.role).await?;
    Ok(ApiResponse::ok(
        "Market items fetched successfully",
        items.into_iter().map(Into::into).collect(),
    ))
}

/// GET /markets/{id}
#[tracing::instrument(skip(state, auth))]
pub async fn get<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ItemResponse>>, ApiError> {
    let item_id = parse_item_id(&id)?;
    let item = state.market.get_item(item_id, auth.identity.role).await?;
    Ok(ApiResponse::ok("Market item fetched successfully", item.into()))
}

/// GET /markets_self
#[tracing::instrument(skip_all, fields(user_id = %auth.user_id()))]
pub async fn mine<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<ItemResponse>>>, ApiError> {
    let items = state.market.list_mine(auth.user_id()).await?;
    Ok(ApiResponse::ok(
        "User market items fetched successfully",
        items.into_iter().map(Into::into).collect(),
    ))
}

/// PUT /markets/{id}
#[tracing::instrument(skip(state, auth, req))]
pub async fn update<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateItemRequest>,
) -> Result<Json<ApiResponse<ItemResponse>>, ApiError> {
    auth.require_role(PRODUCERS)?;
    let item_id = parse_item_id(&id)?;
    let patch = req.into_patch()?;

    let item = state
        .market
        .update_item(item_id, &auth.identity, patch)
        .await?;
    Ok(ApiResponse::ok("Market item updated successfully", item.into()))
}

/// DELETE /markets/{id}
#[tracing::instrument(skip(state, auth))]
pub async fn delete<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_role(PRODUCERS)?;
    let item_id = parse_item_id(&id)?;
    state.market.delete_item(item_id, &auth.identity).await?;
    Ok(ApiResponse::done("Market item deleted successfully"))
}
