use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::server::AppState;

pub fn router() -> Router {
    Router::new().route("/api/v1/translate", post(translate))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TranslateRequest {
    #[serde(default)]
    title: String,
    content: String,
    #[serde(default)]
    excerpt: String,
    /// Locale codes; missing values fall back to the configured pair.
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
}

#[tracing::instrument(level = "info", skip_all)]
async fn translate(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<TranslateRequest>,
) -> impl IntoResponse {
    if request.content.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": "content is required" })),
        )
            .into_response();
    }
    let from = request
        .from
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| state.cfg.publish.primary_language.clone());
    let to = request
        .to
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| state.cfg.publish.secondary_language.clone());

    match state
        .translator
        .translate(&request.title, &request.content, &request.excerpt, &from, &to)
        .await
    {
        Ok(translated) => Json(serde_json::json!({
            "title": translated.title,
            "content": translated.content,
            "excerpt": translated.excerpt,
            "from": from,
            "to": to,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "translation request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": format!("translation failed: {e}") })),
            )
                .into_response()
        }
    }
}
