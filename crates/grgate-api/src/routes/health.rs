//! Liveness and readiness probes.

use axum::Json;
use axum::Router;
use axum::routing::get;
use serde_json::{Value, json};

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/live", get(probe))
        .route("/ready", get(probe))
}

async fn probe() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
