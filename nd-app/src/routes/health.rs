use std::sync::Arc;

use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;

use crate::server::AppState;

pub fn router() -> Router {
    Router::new().route("/api/v1/health", get(get_health))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_health(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.store.stats();
    Json(serde_json::json!({
        "status": "ok",
        "model": state.cfg.general.model,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "queue": stats,
        "channels": {
            "telegram": state.cfg.telegram.enabled,
        },
        "checked_at": Utc::now(),
    }))
}
