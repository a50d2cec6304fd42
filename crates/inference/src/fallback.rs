//! Degrade-don't-fail wrappers around the upstream traits.
//!
//! Price and prediction failures are logged and replaced by deterministic
//! defaults; they never reach the caller. No retries are attempted.

use chrono::Utc;
use wattsched_core::prediction::PredictionResult;
use wattsched_core::pricing::{PriceSnapshot, FALLBACK_PRICE_PER_MWH};
use wattsched_core::types::Timestamp;

use crate::prediction::{PredictionRequest, PredictionService};
use crate::price::PriceSource;

/// The upstream price for `at`, or [`FALLBACK_PRICE_PER_MWH`].
pub async fn price_or_fallback(source: &dyn PriceSource, at: Timestamp) -> f64 {
    match source.price_at(at).await {
        Ok(price) if price.is_finite() => price,
        Ok(price) => {
            tracing::warn!(price, "Price source returned a non-finite price, using fallback");
            FALLBACK_PRICE_PER_MWH
        }
        Err(e) => {
            tracing::warn!(error = %e, "Price lookup failed, using fallback");
            FALLBACK_PRICE_PER_MWH
        }
    }
}

/// A fresh snapshot, or `previous` marked degraded if the fetch failed.
pub async fn refresh_snapshot(source: &dyn PriceSource, previous: PriceSnapshot) -> PriceSnapshot {
    match source.forecast().await {
        Ok(forecast) => {
            tracing::debug!(points = forecast.len(), "Price forecast refreshed");
            PriceSnapshot::fresh(forecast, Utc::now())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Price forecast refresh failed, keeping previous");
            previous.degrade()
        }
    }
}

/// The prediction, or `None` so estimators use their documented defaults.
pub async fn prediction_or_none(
    service: &dyn PredictionService,
    request: &PredictionRequest,
) -> Option<PredictionResult> {
    match service.predict(request).await {
        Ok(prediction) => Some(prediction),
        Err(e) => {
            tracing::warn!(
                model_name = %request.model_name,
                error = %e,
                "Prediction failed, falling back to default estimate inputs"
            );
            None
        }
    }
}
