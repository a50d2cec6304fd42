//! Price forecast and point-in-time price handlers.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use wattsched_core::pricing::{parse_timestamp, PricePoint};
use wattsched_core::types::Timestamp;
use wattsched_inference::fallback::price_or_fallback;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub points: Vec<PricePoint>,
    pub spot_price: Option<f64>,
    pub next_hour_price: Option<f64>,
    pub fetched_at: Option<Timestamp>,
    pub degraded: bool,
}

/// GET /api/v1/prices/forecast
///
/// The forecast as last fetched by the price refresh. An empty forecast
/// with `degraded: true` means the price source has not answered yet.
pub async fn forecast(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let snapshot = state.prices_now();
    Ok(Json(DataResponse {
        data: ForecastResponse {
            spot_price: snapshot.forecast.spot_price(),
            next_hour_price: snapshot.forecast.next_hour_price(),
            points: snapshot.forecast.points().to_vec(),
            fetched_at: snapshot.fetched_at,
            degraded: snapshot.degraded,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct PriceAtQuery {
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceOrigin {
    Forecast,
    PriceSource,
}

#[derive(Debug, Serialize)]
pub struct PriceAtResponse {
    pub timestamp: Timestamp,
    pub price: f64,
    pub origin: PriceOrigin,
}

/// GET /api/v1/prices/at?timestamp=
///
/// Resolved from the cached forecast when there is one, otherwise asked of
/// the price source directly, which itself falls back to the fixed price.
pub async fn price_at(
    State(state): State<AppState>,
    Query(query): Query<PriceAtQuery>,
) -> AppResult<impl IntoResponse> {
    let timestamp = parse_timestamp(&query.timestamp)?;
    let snapshot = state.prices_now();

    let (price, origin) = if snapshot.forecast.is_empty() {
        (
            price_or_fallback(state.prices.as_ref(), timestamp).await,
            PriceOrigin::PriceSource,
        )
    } else {
        (snapshot.price_at(timestamp), PriceOrigin::Forecast)
    };

    Ok(Json(DataResponse {
        data: PriceAtResponse {
            timestamp,
            price,
            origin,
        },
    }))
}
