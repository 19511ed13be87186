//! HTTP API server with observability for the recyco marketplace.
//!
//! Provides REST endpoints for the market item catalog and the pickup and
//! transaction lifecycle, with bearer token authentication, structured
//! logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod response;
pub mod routes;
pub mod state;
pub mod thumbnails;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::MarketService;
use market_store::MarketStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::{Authenticator, InMemoryRevocationList, JwtKeys};
use config::Config;
use state::AppState;
use thumbnails::LocalThumbnailStore;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/auth/logout", post(routes::auth::logout::<S>))
        .route(
            "/markets",
            post(routes::markets::create::<S>).get(routes::markets::list::<S>),
        )
        .route(
            "/markets/{id}",
            get(routes::markets::get::<S>)
                .put(routes::markets::update::<S>)
                .delete(routes::markets::delete::<S>),
        )
        .route("/markets_self", get(routes::markets::mine::<S>))
        .route(
            "/market_transactions",
            get(routes::transactions::list::<S>).post(routes::transactions::create::<S>),
        )
        .route(
            "/market_transactions/{item_id}",
            get(routes::transactions::get::<S>).put(routes::transactions::update_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state for a store, with an in-memory token
/// revocation list and thumbnails kept under the configured directory.
pub fn create_state<S: MarketStore + 'static>(store: S, config: &Config) -> Arc<AppState<S>> {
    let thumbnails = Arc::new(LocalThumbnailStore::new(&config.thumbnail_dir));
    let auth = Authenticator::new(
        JwtKeys::new(config.jwt_secret.as_bytes()),
        Arc::new(InMemoryRevocationList::new()),
    );

    Arc::new(AppState {
        market: MarketService::with_thumbnails(store, thumbnails),
        auth,
    })
}
