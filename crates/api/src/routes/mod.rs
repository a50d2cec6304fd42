pub mod estimates;
pub mod health;
pub mod jobs;
pub mod prices;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                       list, create (GET, POST)
/// /jobs/{id}                  get, delete (GET, DELETE)
/// /jobs/{id}/run              execute now (POST)
/// /jobs/{id}/accuracy         prediction accuracy (GET)
///
/// /predictions                predict and price (POST)
/// /estimates/preview          live estimate preview (POST)
///
/// /prices/forecast            cached forecast (GET)
/// /prices/at                  price at ?timestamp= (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Scheduled job lifecycle.
        .nest("/jobs", jobs::router())
        // Predictions and live estimates (nothing persisted).
        .nest("/predictions", estimates::predictions_router())
        .nest("/estimates", estimates::estimates_router())
        // Electricity prices.
        .nest("/prices", prices::router())
}
