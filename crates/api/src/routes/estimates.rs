//! Route definitions for predictions and estimate previews.

use axum::routing::post;
use axum::Router;

use crate::handlers::estimates;
use crate::state::AppState;

/// Routes mounted at `/predictions`.
pub fn predictions_router() -> Router<AppState> {
    Router::new().route("/", post(estimates::predict))
}

/// Routes mounted at `/estimates`.
///
/// ```text
/// POST   /preview         -> preview
/// ```
pub fn estimates_router() -> Router<AppState> {
    Router::new().route("/preview", post(estimates::preview))
}
