//! Prediction service response model and diagnostic text extraction.
//!
//! The prediction service answers with structured fields, but older
//! deployments only fill some of them and leave the rest in a free-form
//! diagnostic transcript. [`Diagnostics`] recovers values from that text;
//! it is only ever a fallback for absent structured fields.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::pricing::PriceForecast;

// ---------------------------------------------------------------------------
// Wire model
// ---------------------------------------------------------------------------

/// Hardware profile reported by the prediction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareInfo {
    pub device: Option<String>,
    pub cpu_frequency: Option<f64>,
    pub num_cores: Option<u32>,
    pub memory_bytes: Option<u64>,
    pub gpu_available: Option<bool>,
    pub machine: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
}

/// Model features reported by the prediction service.
///
/// Unknown keys (parameter counts, layer breakdowns, ...) are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelInfo {
    pub input_token_length: Option<u64>,
    pub output_token_length: Option<u64>,
    pub predicted_cost_per_1k_tokens: Option<f64>,
    #[serde(flatten)]
    pub features: serde_json::Map<String, serde_json::Value>,
}

/// Response of one prediction call. Immutable once received.
///
/// Every numeric field is optional: a missing value is resolved through
/// the diagnostic text, never replaced by a guess here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionResult {
    #[serde(rename = "predictedRuntime")]
    pub predicted_runtime_s: Option<f64>,
    #[serde(rename = "actualRuntime")]
    pub actual_runtime_s: Option<f64>,
    #[serde(rename = "predictedPower")]
    pub predicted_power_w: Option<f64>,
    #[serde(rename = "actualPower")]
    pub actual_power_w: Option<f64>,
    #[serde(rename = "energyUsed")]
    pub energy_used_wh: Option<f64>,
    #[serde(rename = "actualEnergyUsed")]
    pub actual_energy_wh: Option<f64>,
    #[serde(rename = "costCents")]
    pub cost_cents: Option<f64>,
    /// Price the service itself used, in EUR/MWh.
    #[serde(rename = "auctionPrice")]
    pub price_per_mwh: Option<f64>,
    #[serde(rename = "hardware")]
    pub hardware_info: Option<HardwareInfo>,
    #[serde(rename = "model")]
    pub model_info: Option<ModelInfo>,
    #[serde(rename = "priceFuture")]
    pub price_forecast: PriceForecast,
    #[serde(rename = "priceHistory")]
    pub price_history: PriceForecast,
    #[serde(rename = "raw")]
    pub raw_diagnostic_text: Option<String>,
    /// Runtime prediction error in percent, as measured by the service.
    #[serde(rename = "error")]
    pub measured_error_pct: Option<f64>,
}

impl PredictionResult {
    /// Parse the diagnostic text, or return empty diagnostics if there is none.
    pub fn diagnostics(&self) -> Diagnostics {
        self.raw_diagnostic_text
            .as_deref()
            .map(Diagnostics::parse)
            .unwrap_or_default()
    }

    pub fn predicted_runtime(&self) -> Option<f64> {
        self.predicted_runtime_s
            .or_else(|| self.diagnostics().predicted_runtime_s)
    }

    pub fn actual_runtime(&self) -> Option<f64> {
        self.actual_runtime_s
            .or_else(|| self.diagnostics().actual_runtime_s)
    }

    pub fn predicted_power(&self) -> Option<f64> {
        self.predicted_power_w
            .or_else(|| self.diagnostics().avg_power_w)
    }

    pub fn predicted_cost_cents(&self) -> Option<f64> {
        self.cost_cents
            .or_else(|| self.diagnostics().predicted_cost_cents)
    }

    /// The generic runtime error percentage, from the field or the text.
    pub fn error_pct(&self) -> Option<f64> {
        self.measured_error_pct
            .or_else(|| self.diagnostics().prediction_error_pct)
    }

    pub fn input_tokens(&self) -> Option<u64> {
        self.model_info
            .as_ref()
            .and_then(|m| m.input_token_length)
            .or_else(|| self.diagnostics().input_token_length)
    }

    pub fn output_tokens(&self) -> Option<u64> {
        self.model_info
            .as_ref()
            .and_then(|m| m.output_token_length)
            .or_else(|| self.diagnostics().output_token_length)
    }
}

// ---------------------------------------------------------------------------
// Diagnostic text markers
// ---------------------------------------------------------------------------

/// Unsigned or signed decimal, optionally in exponent notation.
const FLOAT: &str = r"([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)";

pub const PREDICTED_RUNTIME_MARKER: &str = r"\[ML Model\] Predicted runtime \(seconds\): ";
pub const ACTUAL_RUNTIME_MARKER: &str = r"Actual measured runtime \(seconds\): ";
pub const AVG_POWER_MARKER: &str = r"avg_power = ";
pub const PREDICTED_COST_MARKER: &str = r"Predicted cost of inference: ";
pub const PREDICTION_ERROR_MARKER: &str = r"Prediction error: ";
pub const ENERGY_USED_MARKER: &str = r"Estimated energy used: ";
pub const AUCTION_PRICE_MARKER: &str = r"Auction price used: ";

fn float_after(marker: &str, suffix: &str) -> Regex {
    Regex::new(&format!("{marker}{FLOAT}{suffix}")).expect("valid regex")
}

static PREDICTED_RUNTIME_RE: LazyLock<Regex> =
    LazyLock::new(|| float_after(PREDICTED_RUNTIME_MARKER, ""));
static ACTUAL_RUNTIME_RE: LazyLock<Regex> =
    LazyLock::new(|| float_after(ACTUAL_RUNTIME_MARKER, ""));
static AVG_POWER_RE: LazyLock<Regex> = LazyLock::new(|| float_after(AVG_POWER_MARKER, ""));
static PREDICTED_COST_RE: LazyLock<Regex> =
    LazyLock::new(|| float_after(PREDICTED_COST_MARKER, " cents"));
static PREDICTION_ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| float_after(PREDICTION_ERROR_MARKER, "%"));
static ENERGY_USED_RE: LazyLock<Regex> =
    LazyLock::new(|| float_after(ENERGY_USED_MARKER, " Wh"));
static AUCTION_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| float_after(AUCTION_PRICE_MARKER, ""));
static INPUT_TOKENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Input token length: ([0-9]+)").expect("valid regex"));
static OUTPUT_TOKENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Output token length: ([0-9]+)").expect("valid regex"));

fn capture<T: std::str::FromStr>(re: &Regex, text: &str) -> Option<T> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Values recovered from a diagnostic transcript. Absent markers stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub predicted_runtime_s: Option<f64>,
    pub actual_runtime_s: Option<f64>,
    pub avg_power_w: Option<f64>,
    pub predicted_cost_cents: Option<f64>,
    pub prediction_error_pct: Option<f64>,
    pub energy_used_wh: Option<f64>,
    pub auction_price_per_mwh: Option<f64>,
    pub input_token_length: Option<u64>,
    pub output_token_length: Option<u64>,
}

impl Diagnostics {
    /// Extract every known marker; the first occurrence of each wins.
    pub fn parse(text: &str) -> Self {
        Self {
            predicted_runtime_s: capture(&PREDICTED_RUNTIME_RE, text),
            actual_runtime_s: capture(&ACTUAL_RUNTIME_RE, text),
            avg_power_w: capture(&AVG_POWER_RE, text),
            predicted_cost_cents: capture(&PREDICTED_COST_RE, text),
            prediction_error_pct: capture(&PREDICTION_ERROR_RE, text),
            energy_used_wh: capture(&ENERGY_USED_RE, text),
            auction_price_per_mwh: capture(&AUCTION_PRICE_RE, text),
            input_token_length: capture(&INPUT_TOKENS_RE, text),
            output_token_length: capture(&OUTPUT_TOKENS_RE, text),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
