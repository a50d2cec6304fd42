//! Electricity price forecast types and the price resolver.
//!
//! A forecast is an ascending series of `(timestamp, EUR/MWh)` points. The
//! resolver treats it as a repeating daily pattern: it matches on
//! hour-of-day (UTC) only, so any timestamp always resolves to a price.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Price used when the forecast is empty or the price source is unreachable.
pub const FALLBACK_PRICE_PER_MWH: f64 = 85.2;

// ---------------------------------------------------------------------------
// PricePoint
// ---------------------------------------------------------------------------

/// One forecast (or historical) price sample.
///
/// Wire names follow the price source: `datetime` and `price_eur_per_mwh`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(rename = "datetime", with = "lenient_datetime")]
    pub timestamp: Timestamp,
    #[serde(rename = "price_eur_per_mwh")]
    pub price_per_mwh: f64,
}

impl PricePoint {
    pub fn new(timestamp: Timestamp, price_per_mwh: f64) -> Self {
        Self {
            timestamp,
            price_per_mwh,
        }
    }
}

// ---------------------------------------------------------------------------
// PriceForecast
// ---------------------------------------------------------------------------

/// Price points ordered ascending by timestamp. May be empty.
///
/// Construction always sorts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceForecast {
    points: Vec<PricePoint>,
}

impl PriceForecast {
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The earliest forecast price, shown as the "current" price.
    pub fn spot_price(&self) -> Option<f64> {
        self.points.first().map(|p| p.price_per_mwh)
    }

    /// The second forecast price, shown as the "next hour" price.
    pub fn next_hour_price(&self) -> Option<f64> {
        self.points.get(1).map(|p| p.price_per_mwh)
    }
}

impl From<Vec<PricePoint>> for PriceForecast {
    fn from(points: Vec<PricePoint>) -> Self {
        Self::new(points)
    }
}

impl From<PriceForecast> for Vec<PricePoint> {
    fn from(forecast: PriceForecast) -> Self {
        forecast.points
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolve the price for an arbitrary point in time.
///
/// 1. The first point whose UTC hour-of-day equals the hour of `at`.
/// 2. Otherwise the first point of the forecast.
/// 3. Otherwise [`FALLBACK_PRICE_PER_MWH`].
///
/// Only the hour is compared; the date is ignored.
pub fn resolve_price(forecast: &PriceForecast, at: Timestamp) -> f64 {
    let hour = at.hour();
    forecast
        .points
        .iter()
        .find(|p| p.timestamp.hour() == hour)
        .or_else(|| forecast.points.first())
        .map(|p| p.price_per_mwh)
        .unwrap_or(FALLBACK_PRICE_PER_MWH)
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The latest forecast known to the server, as kept by the price refresh.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceSnapshot {
    pub forecast: PriceForecast,
    /// When the forecast was last fetched successfully. `None` until the
    /// first successful fetch.
    pub fetched_at: Option<Timestamp>,
    /// `true` when the last fetch failed and the snapshot is stale or empty.
    pub degraded: bool,
}

impl PriceSnapshot {
    pub fn fresh(forecast: PriceForecast, fetched_at: Timestamp) -> Self {
        Self {
            forecast,
            fetched_at: Some(fetched_at),
            degraded: false,
        }
    }

    /// Keep the previous forecast but flag it as degraded.
    pub fn degrade(mut self) -> Self {
        self.degraded = true;
        self
    }

    pub fn price_at(&self, at: Timestamp) -> f64 {
        resolve_price(&self.forecast, at)
    }
}

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

/// Parse an RFC 3339 timestamp, or a naive ISO 8601 one interpreted as UTC.
///
/// The price source writes naive local timestamps (`2024-05-01T13:30:00`).
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, CoreError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| CoreError::Validation(format!("Invalid timestamp '{raw}': {e}")))
}

mod lenient_datetime {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::Timestamp;

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
