//! Integration tests for predictions and live estimate previews.

mod common;

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use common::{body_json, build_test_app, build_test_app_with, post_json, TestUpstreams};
use serde_json::json;
use wattsched_core::prediction::PredictionResult;
use wattsched_core::pricing::{PriceForecast, PricePoint, PriceSnapshot};

fn approx(value: &serde_json::Value, expected: f64) -> bool {
    (value.as_f64().unwrap() - expected).abs() < 1e-9
}

#[tokio::test]
async fn predict_prices_the_prediction() {
    let app = build_test_app();
    let response = post_json(
        app,
        "/api/v1/predictions",
        json!({ "model_name": "gpt2", "input_text": "hello" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = &body_json(response).await["data"];
    assert_eq!(data["degraded"], false);
    assert_eq!(data["prediction"]["predictedRuntime"], 12.0);
    assert_eq!(data["estimate"]["runtime_s"], 12.0);
    // No forecast yet: fixed fallback price.
    assert_eq!(data["estimate"]["price_per_mwh"], 85.2);
    // 12 s at 40 W = 0.1333 Wh.
    assert!(approx(&data["estimate"]["energy_wh"], 12.0 * 40.0 / 3600.0));
    assert!(data["cost_per_1k_tokens"].is_null());
}

#[tokio::test]
async fn predict_degrades_when_service_is_down() {
    let app = build_test_app_with(TestUpstreams {
        prediction: None,
        ..Default::default()
    });
    let response = post_json(app, "/api/v1/predictions", json!({ "model_name": "gpt2" })).await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = &body_json(response).await["data"];
    assert_eq!(data["degraded"], true);
    assert!(data["prediction"].is_null());
    assert_eq!(data["estimate"]["runtime_s"], 1.2);
    assert!(approx(&data["estimate"]["energy_wh"], 1.2 * 25.0 / 3600.0));
}

#[tokio::test]
async fn predict_uses_forecast_hour_of_scheduled_time() {
    let day = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let forecast = PriceForecast::new(vec![
        PricePoint::new(day + chrono::Duration::hours(2), 40.0),
        PricePoint::new(day + chrono::Duration::hours(14), 120.0),
    ]);
    let app = build_test_app_with(TestUpstreams {
        snapshot: PriceSnapshot::fresh(forecast, day),
        ..Default::default()
    });

    let response = post_json(
        app,
        "/api/v1/predictions",
        json!({
            "model_name": "gpt2",
            "scheduled_time": "2025-06-03T14:30:00Z"
        }),
    )
    .await;

    let data = &body_json(response).await["data"];
    assert_eq!(data["estimate"]["price_per_mwh"], 120.0);
}

#[tokio::test]
async fn predict_reports_cost_per_1k_tokens_when_counted() {
    let prediction = PredictionResult {
        predicted_runtime_s: Some(12.0),
        predicted_power_w: Some(40.0),
        raw_diagnostic_text: Some("Input token length: 300\nOutput token length: 200\n".into()),
        ..Default::default()
    };
    let app = build_test_app_with(TestUpstreams {
        prediction: Some(prediction),
        ..Default::default()
    });

    let response = post_json(app, "/api/v1/predictions", json!({ "model_name": "gpt2" })).await;
    let data = &body_json(response).await["data"];

    let cost = data["estimate"]["cost_cents"].as_f64().unwrap();
    assert!(approx(&data["cost_per_1k_tokens"], cost / 500.0 * 1000.0));
}

#[tokio::test]
async fn predict_rejects_blank_model() {
    let app = build_test_app();
    let response = post_json(app, "/api/v1/predictions", json!({ "model_name": "" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn preview_without_prediction_uses_preview_defaults() {
    let app = build_test_app();
    let response = post_json(app, "/api/v1/estimates/preview", json!({})).await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = &body_json(response).await["data"];
    assert_eq!(data["runtime_s"], 1.2);
    assert_eq!(data["price_per_mwh"], 85.2);
}

#[tokio::test]
async fn preview_reuses_supplied_prediction() {
    let app = build_test_app();
    let response = post_json(
        app,
        "/api/v1/estimates/preview",
        json!({
            "scheduled_time": "2030-01-01T08:00:00Z",
            "prediction": { "predictedRuntime": 60.0, "predictedPower": 100.0 }
        }),
    )
    .await;

    let data = &body_json(response).await["data"];
    assert_eq!(data["runtime_s"], 60.0);
    // 60 s at 100 W = 1.6667 Wh at 85.2 EUR/MWh.
    let expected_cents = 60.0 * 100.0 / 3600.0 / 1_000_000.0 * 85.2 * 100.0;
    assert!(approx(&data["cost_cents"], expected_cents));
}
