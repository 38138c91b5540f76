//! HTTP routes.

pub mod health;
pub mod webhooks;

use axum::Router;
use axum::middleware;

use crate::{AppState, metrics};

/// Build the router. Only the webhook of the configured platform is mounted.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(webhooks::router(state.platform.kind()))
        .route_layer(middleware::from_fn(metrics::track_requests))
        .with_state(state)
}
