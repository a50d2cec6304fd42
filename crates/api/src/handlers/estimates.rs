//! Prediction and live-preview estimate handlers.
//!
//! Nothing here persists. A job's estimate is frozen only when the caller
//! submits it to `POST /jobs`.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use wattsched_core::estimation::{cost_per_1k_tokens, preview_estimate, CostEstimate};
use wattsched_core::prediction::PredictionResult;
use wattsched_core::scheduling::validate_job_input;
use wattsched_core::types::Timestamp;
use wattsched_inference::fallback::prediction_or_none;
use wattsched_inference::PredictionRequest;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Predict
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PredictInput {
    pub model_name: String,
    #[serde(default)]
    pub input_text: String,
    /// Price the estimate for this time; defaults to now.
    pub scheduled_time: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    /// `None` when the prediction service was unavailable.
    pub prediction: Option<PredictionResult>,
    pub estimate: CostEstimate,
    /// The estimate was built from default inputs.
    pub degraded: bool,
    pub cost_per_1k_tokens: Option<f64>,
}

/// POST /api/v1/predictions
///
/// Ask the prediction service and price the result at the requested time.
/// If the service is down the preview defaults are used and `degraded` is
/// set; this endpoint never fails because of an upstream outage.
pub async fn predict(
    State(state): State<AppState>,
    Json(input): Json<PredictInput>,
) -> AppResult<impl IntoResponse> {
    validate_job_input(&input.model_name, &input.input_text)?;

    let request = PredictionRequest {
        model_name: input.model_name,
        input_text: input.input_text,
    };
    let prediction = prediction_or_none(state.predictions.as_ref(), &request).await;

    let at = input.scheduled_time.unwrap_or_else(Utc::now);
    let price = state.prices_now().price_at(at);
    let estimate = preview_estimate(prediction.as_ref(), price);

    let tokens = prediction
        .as_ref()
        .and_then(|p| Some(p.input_tokens()? + p.output_tokens().unwrap_or(0)));
    let cost_per_1k_tokens = tokens.and_then(|t| cost_per_1k_tokens(estimate.cost_cents, t));

    tracing::debug!(
        model_name = %request.model_name,
        degraded = prediction.is_none(),
        cost_cents = estimate.cost_cents,
        "Prediction priced",
    );

    Ok(Json(DataResponse {
        data: PredictResponse {
            degraded: prediction.is_none(),
            prediction,
            estimate,
            cost_per_1k_tokens,
        },
    }))
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PreviewInput {
    /// Defaults to now.
    pub scheduled_time: Option<Timestamp>,
    /// A prediction obtained earlier; defaults apply when absent.
    pub prediction: Option<PredictionResult>,
}

/// POST /api/v1/estimates/preview
///
/// Recompute the live estimate for a (possibly changed) scheduled time
/// without calling the prediction service again.
pub async fn preview(
    State(state): State<AppState>,
    Json(input): Json<PreviewInput>,
) -> AppResult<impl IntoResponse> {
    let at = input.scheduled_time.unwrap_or_else(Utc::now);
    let price = state.prices_now().price_at(at);
    let estimate = preview_estimate(input.prediction.as_ref(), price);
    Ok(Json(DataResponse { data: estimate }))
}
