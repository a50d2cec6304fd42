//! Route definitions for the `/prices` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::prices;
use crate::state::AppState;

/// Routes mounted at `/prices`.
///
/// ```text
/// GET    /forecast        -> forecast
/// GET    /at?timestamp=   -> price_at
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/forecast", get(prices::forecast))
        .route("/at", get(prices::price_at))
}
