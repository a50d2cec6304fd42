//! Cost, runtime and energy estimation for a single inference run.
//!
//! The formula chain is kept exactly as published so estimates can be
//! compared bit-for-bit across clients:
//!
//! ```text
//! energy_wh  = runtime_s * power_w / 3600
//! energy_mwh = energy_wh / 1_000_000
//! cost_eur   = energy_mwh * price_per_mwh
//! cost_cents = cost_eur * 100
//! ```

use serde::{Deserialize, Serialize};

use crate::prediction::PredictionResult;

// ---------------------------------------------------------------------------
// Conversion constants
// ---------------------------------------------------------------------------

/// Seconds per hour (3600.0).
pub const SECS_PER_HOUR: f64 = 3600.0;
/// Watt-hours per megawatt-hour.
pub const WH_PER_MWH: f64 = 1_000_000.0;
/// Cents per euro.
pub const CENTS_PER_EUR: f64 = 100.0;

// ---------------------------------------------------------------------------
// Default inputs
// ---------------------------------------------------------------------------

/// Runtime and average power draw feeding an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimePower {
    pub runtime_s: f64,
    pub power_w: f64,
}

/// Inputs used for job-creation estimates when no prediction exists yet.
pub const SCHEDULING_DEFAULT: RuntimePower = RuntimePower {
    runtime_s: 2.5,
    power_w: 30.0,
};

/// Inputs used for the live preview shown before any job exists.
/// Not the same as [`SCHEDULING_DEFAULT`].
pub const PREVIEW_DEFAULT: RuntimePower = RuntimePower {
    runtime_s: 1.2,
    power_w: 25.0,
};

impl RuntimePower {
    /// Take runtime and power from a prediction, filling whichever is
    /// missing from `default`.
    pub fn from_prediction(prediction: Option<&PredictionResult>, default: RuntimePower) -> Self {
        let Some(prediction) = prediction else {
            return default;
        };
        Self {
            runtime_s: prediction
                .predicted_runtime()
                .unwrap_or(default.runtime_s),
            power_w: prediction.predicted_power().unwrap_or(default.power_w),
        }
    }
}

// ---------------------------------------------------------------------------
// CostEstimate
// ---------------------------------------------------------------------------

/// A monetary and energy estimate for one run at one price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub cost_cents: f64,
    pub runtime_s: f64,
    pub energy_wh: f64,
    pub price_per_mwh: f64,
}

/// Energy in watt-hours for a run of `runtime_s` seconds at `power_w` watts.
pub fn energy_wh(runtime_s: f64, power_w: f64) -> f64 {
    runtime_s * power_w / SECS_PER_HOUR
}

/// Cost in cents of `energy_wh` watt-hours at `price_per_mwh` EUR/MWh.
pub fn cost_cents_for_energy(energy_wh: f64, price_per_mwh: f64) -> f64 {
    let energy_mwh = energy_wh / WH_PER_MWH;
    let cost_eur = energy_mwh * price_per_mwh;
    cost_eur * CENTS_PER_EUR
}

/// Pure estimate from runtime, power and price.
pub fn estimate(runtime_s: f64, power_w: f64, price_per_mwh: f64) -> CostEstimate {
    let energy_wh = energy_wh(runtime_s, power_w);
    CostEstimate {
        cost_cents: cost_cents_for_energy(energy_wh, price_per_mwh),
        runtime_s,
        energy_wh,
        price_per_mwh,
    }
}

/// Live estimate shown while the operator is still editing the job.
///
/// Recomputed freely whenever the model, input or time changes; nothing is
/// stored.
pub fn preview_estimate(prediction: Option<&PredictionResult>, price_per_mwh: f64) -> CostEstimate {
    let inputs = RuntimePower::from_prediction(prediction, PREVIEW_DEFAULT);
    estimate(inputs.runtime_s, inputs.power_w, price_per_mwh)
}

/// Estimate frozen onto a job at creation time.
pub fn scheduling_estimate(
    prediction: Option<&PredictionResult>,
    price_per_mwh: f64,
) -> CostEstimate {
    let inputs = RuntimePower::from_prediction(prediction, SCHEDULING_DEFAULT);
    estimate(inputs.runtime_s, inputs.power_w, price_per_mwh)
}

/// Cost per thousand tokens, or `None` when no tokens were counted.
pub fn cost_per_1k_tokens(cost_cents: f64, tokens: u64) -> Option<f64> {
    (tokens > 0).then(|| cost_cents / tokens as f64 * 1000.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
