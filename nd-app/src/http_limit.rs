//! API rate-limit middleware.
//!
//! Every response carries the budget headers; a rejected request gets a
//! 429 with `Retry-After`. Clients are keyed by the first
//! `x-forwarded-for` hop, so direct local calls share one bucket.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;

use crate::ratelimit::{ApiLimit, LimitDecision};
use crate::server::AppState;

const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

pub async fn enforce_api_budget(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let kind = classify_route(request.method(), request.uri().path());
    let client = client_key(request.headers());
    let decision = state.limiter.check_api(kind, &client);

    if !decision.allowed {
        tracing::warn!(
            client = %client,
            path = %request.uri().path(),
            "api budget exhausted"
        );
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "rate limit exceeded" })),
        )
            .into_response();
        apply_budget_headers(response.headers_mut(), &decision);
        if let Ok(value) = HeaderValue::from_str(&decision.resets_in.as_secs().to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        return response;
    }

    let mut response = next.run(request).await;
    apply_budget_headers(response.headers_mut(), &decision);
    response
}

/// Translation has its own hourly budget; other writes count against the
/// admin table and reads against the public one.
fn classify_route(method: &Method, path: &str) -> ApiLimit {
    if path.starts_with("/api/v1/translate") {
        ApiLimit::Translate
    } else if method == Method::GET || method == Method::HEAD {
        ApiLimit::Public
    } else {
        ApiLimit::Admin
    }
}

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn apply_budget_headers(headers: &mut HeaderMap, decision: &LimitDecision) {
    let reset_at = Utc::now()
        .timestamp()
        .saturating_add(decision.resets_in.as_secs() as i64);
    let pairs = [
        (HEADER_LIMIT, decision.limit.to_string()),
        (HEADER_REMAINING, decision.remaining.to_string()),
        (HEADER_RESET, reset_at.to_string()),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}
