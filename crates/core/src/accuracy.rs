//! Prediction accuracy scoring (0-100) for runtime, power and cost.
//!
//! Each metric owns an ordered list of named [`Strategy`] values. The first
//! strategy that yields a score wins; if none does, the metric's fixed
//! default is reported. When the only real signal is the generic runtime
//! error, power and cost apply small fixed offsets to it so the three
//! scores stay distinct.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::estimation::{cost_cents_for_energy, energy_wh};
use crate::prediction::PredictionResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

pub const DEFAULT_RUNTIME_ACCURACY: f64 = 85.0;
pub const DEFAULT_POWER_ACCURACY: f64 = 88.0;
pub const DEFAULT_COST_ACCURACY: f64 = 94.0;

/// Offset applied to the generic-error score for power.
pub const POWER_ERROR_OFFSET: f64 = -2.0;
/// Offset applied to the generic-error score for cost.
pub const COST_ERROR_OFFSET: f64 = 3.0;

/// Re-derived actual cost is rounded to this many decimals (cents).
const COST_ROUNDING_DECIMALS: i32 = 3;

/// Source label reported when every strategy came up empty.
pub const DEFAULT_SOURCE: &str = "default";

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Runtime,
    Power,
    Cost,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Runtime, Metric::Power, Metric::Cost];

    pub fn default_score(self) -> f64 {
        match self {
            Metric::Runtime => DEFAULT_RUNTIME_ACCURACY,
            Metric::Power => DEFAULT_POWER_ACCURACY,
            Metric::Cost => DEFAULT_COST_ACCURACY,
        }
    }

    /// Strategies in evaluation order.
    pub fn strategies(self) -> &'static [Strategy] {
        match self {
            Metric::Runtime => RUNTIME_STRATEGIES,
            Metric::Power => POWER_STRATEGIES,
            Metric::Cost => COST_STRATEGIES,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Runtime => "runtime",
            Metric::Power => "power",
            Metric::Cost => "cost",
        })
    }
}

// ---------------------------------------------------------------------------
// Context & strategies
// ---------------------------------------------------------------------------

/// Facts known outside the prediction itself.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccuracyContext {
    /// Price frozen on the job's estimate when it was scheduled.
    pub scheduling_price_per_mwh: Option<f64>,
}

/// A named extraction step that may produce a score.
pub struct Strategy {
    pub name: &'static str,
    eval: fn(&PredictionResult, &AccuracyContext) -> Option<f64>,
}

impl Strategy {
    pub fn evaluate(&self, prediction: &PredictionResult, ctx: &AccuracyContext) -> Option<f64> {
        (self.eval)(prediction, ctx)
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name).finish()
    }
}

const RUNTIME_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "direct_fields",
        eval: runtime_from_fields,
    },
    Strategy {
        name: "diagnostic_text",
        eval: runtime_from_text,
    },
    Strategy {
        name: "generic_error",
        eval: runtime_from_generic_error,
    },
];

const POWER_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "direct_fields",
        eval: power_from_fields,
    },
    Strategy {
        name: "diagnostic_text",
        eval: power_from_text,
    },
    Strategy {
        name: "generic_error",
        eval: power_from_generic_error,
    },
];

const COST_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "rederived_cost",
        eval: cost_from_rederived_actual,
    },
    Strategy {
        name: "generic_error",
        eval: cost_from_generic_error,
    },
];

// ---------------------------------------------------------------------------
// Shared scoring
// ---------------------------------------------------------------------------

/// Clamp into `[0, 100]`; NaN never produces a score.
fn clamp_score(value: f64) -> Option<f64> {
    (!value.is_nan()).then(|| value.clamp(MIN_SCORE, MAX_SCORE))
}

/// `clamp(100 - |p - a| / a * 100)`, or `None` when `a` is zero or a value
/// is not finite.
pub fn relative_accuracy(predicted: f64, actual: f64) -> Option<f64> {
    if !predicted.is_finite() || !actual.is_finite() || actual == 0.0 {
        return None;
    }
    let relative_error_pct = (predicted - actual).abs() / actual * 100.0;
    clamp_score(MAX_SCORE - relative_error_pct)
}

fn from_generic_error(prediction: &PredictionResult, offset: f64) -> Option<f64> {
    clamp_score(MAX_SCORE - prediction.error_pct()? + offset)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

fn runtime_from_fields(p: &PredictionResult, _: &AccuracyContext) -> Option<f64> {
    relative_accuracy(p.predicted_runtime_s?, p.actual_runtime_s?)
}

fn runtime_from_text(p: &PredictionResult, _: &AccuracyContext) -> Option<f64> {
    relative_accuracy(p.predicted_runtime()?, p.actual_runtime()?)
}

fn runtime_from_generic_error(p: &PredictionResult, _: &AccuracyContext) -> Option<f64> {
    from_generic_error(p, 0.0)
}

// ---------------------------------------------------------------------------
// Power
// ---------------------------------------------------------------------------

fn actual_power(p: &PredictionResult) -> Option<f64> {
    p.actual_power_w.filter(|w| *w > 0.0)
}

fn power_from_fields(p: &PredictionResult, _: &AccuracyContext) -> Option<f64> {
    relative_accuracy(p.predicted_power_w?, actual_power(p)?)
}

fn power_from_text(p: &PredictionResult, _: &AccuracyContext) -> Option<f64> {
    relative_accuracy(p.diagnostics().avg_power_w?, actual_power(p)?)
}

fn power_from_generic_error(p: &PredictionResult, _: &AccuracyContext) -> Option<f64> {
    from_generic_error(p, POWER_ERROR_OFFSET)
}

// ---------------------------------------------------------------------------
// Cost
// ---------------------------------------------------------------------------

/// Actual energy: the measured value when present, otherwise actual
/// runtime times the best known power draw.
fn actual_energy_wh(p: &PredictionResult) -> Option<f64> {
    p.actual_energy_wh.or_else(|| {
        let power = actual_power(p).or_else(|| p.predicted_power())?;
        Some(energy_wh(p.actual_runtime()?, power))
    })
}

fn cost_from_rederived_actual(p: &PredictionResult, ctx: &AccuracyContext) -> Option<f64> {
    let predicted = p.predicted_cost_cents()?;
    let price = ctx
        .scheduling_price_per_mwh
        .or(p.price_per_mwh)
        .or_else(|| p.diagnostics().auction_price_per_mwh)?;
    let actual = round_to(
        cost_cents_for_energy(actual_energy_wh(p)?, price),
        COST_ROUNDING_DECIMALS,
    );
    relative_accuracy(predicted, actual)
}

fn cost_from_generic_error(p: &PredictionResult, _: &AccuracyContext) -> Option<f64> {
    from_generic_error(p, COST_ERROR_OFFSET)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// One metric's score and the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccuracyScore {
    pub metric: Metric,
    pub value: f64,
    pub source: &'static str,
}

/// Evaluate one metric, recording which strategy answered.
pub fn evaluate(
    metric: Metric,
    prediction: &PredictionResult,
    ctx: &AccuracyContext,
) -> AccuracyScore {
    metric
        .strategies()
        .iter()
        .find_map(|s| {
            s.evaluate(prediction, ctx).map(|value| AccuracyScore {
                metric,
                value,
                source: s.name,
            })
        })
        .unwrap_or(AccuracyScore {
            metric,
            value: metric.default_score(),
            source: DEFAULT_SOURCE,
        })
}

/// Accuracy in `[0, 100]` using only what the prediction itself carries.
pub fn accuracy(metric: Metric, prediction: &PredictionResult) -> f64 {
    evaluate(metric, prediction, &AccuracyContext::default()).value
}

/// Scores for all three metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub runtime: AccuracyScore,
    pub power: AccuracyScore,
    pub cost: AccuracyScore,
}

impl AccuracyReport {
    pub fn evaluate(prediction: &PredictionResult, ctx: &AccuracyContext) -> Self {
        Self {
            runtime: evaluate(Metric::Runtime, prediction, ctx),
            power: evaluate(Metric::Power, prediction, ctx),
            cost: evaluate(Metric::Cost, prediction, ctx),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
