pub mod health;
pub mod jobs;
pub mod translate;

use axum::Router;

pub fn router() -> Router {
    health::router()
        .merge(jobs::router())
        .merge(translate::router())
}
