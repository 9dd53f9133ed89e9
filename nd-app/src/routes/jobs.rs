use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::gateway::MIN_TEXT_SUBMISSION_CHARS;
use crate::jobs::{JobOrigin, Submission, SubmissionKind};
use crate::server::AppState;

pub fn router() -> Router {
    Router::new()
        .route("/api/v1/jobs", post(submit_job))
        .route("/api/v1/jobs/{job_id}", get(get_job))
        .route("/api/v1/queue/stats", get(get_queue_stats))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubmitJobRequest {
    content: String,
    #[serde(default)]
    title: Option<String>,
}

#[tracing::instrument(level = "info", skip_all)]
async fn submit_job(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SubmitJobRequest>,
) -> impl IntoResponse {
    let content = request.content.trim().to_string();
    if content.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": "content is required" })),
        )
            .into_response();
    }
    let kind = if content.starts_with("http://") || content.starts_with("https://") {
        SubmissionKind::Url
    } else {
        SubmissionKind::Text
    };
    if kind == SubmissionKind::Text && content.chars().count() < MIN_TEXT_SUBMISSION_CHARS {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": format!("content must be at least {MIN_TEXT_SUBMISSION_CHARS} characters"),
            })),
        )
            .into_response();
    }

    let submission = Submission {
        kind,
        content,
        user_title: request.title.filter(|t| !t.trim().is_empty()),
        context: None,
        extra_sources: Vec::new(),
    };
    let job_id = state.jobs.submit(JobOrigin::Api, submission);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "job_id": job_id, "status": "queued" })),
    )
        .into_response()
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_job(
    Extension(state): Extension<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&job_id) {
        Some(job) => Json(job).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "job not found or expired" })),
        )
            .into_response(),
    }
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_queue_stats(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "queue": state.store.stats(),
        "max_concurrency": state.cfg.queue.max_concurrency,
    }))
}
