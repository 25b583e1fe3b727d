//! Query API over a monitor driven by mocked candles


use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use mock_market::*;
use momentum_monitor::{api, ManualClock, Monitor, RecipientDirectory};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

async fn app_after_one_cycle() -> (Router, Arc<Monitor>, Arc<RecordingNotifier>) {
    let source = Arc::new(MockCandleSource::new());
    source.set("BTCUSDT", &long_terrain_path(), start());
    source.set("ETHUSDT", &rising_path(100), start());

    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = Arc::new(Monitor::new(
        &settings(&["BTCUSDT", "ETHUSDT"]),
        source,
        notifier.clone(),
        RecipientDirectory::new(&["1".to_string()], None, None),
        Arc::new(ManualClock::new(start())),
    ));
    monitor.run_cycle().await;

    (api::router(monitor.clone()), monitor, notifier)
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_symbols_endpoint() {
    let (app, _, _) = app_after_one_cycle().await;
    let (status, body) = call(app, get("/api/symbols")).await;

    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["symbol"], "BTCUSDT");
    assert_eq!(rows[0]["interval"], "1h");
    assert_eq!(rows[0]["current_regime_text"], "LONG TERRAIN");
    assert_eq!(rows[0]["last_dispatched_signal"], "LONG");
    assert_eq!(rows[1]["current_regime_text"], "INDECISION");
}

#[tokio::test]
async fn test_history_and_mood_endpoints() {
    let (app, _, _) = app_after_one_cycle().await;

    let (status, history) = call(app.clone(), get("/api/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["signal"], "LONG");
    assert_eq!(history[0]["dispatch_receipts"][0]["recipient_id"], "1");

    let (status, mood) = call(app, get("/api/mood")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mood["angle"], 0.0);
    assert_eq!(mood["color"], "#9ca3af");
    assert_eq!(mood["dominant_label"], "🟢 LONG TERRAIN");
    assert_eq!(mood["terrain_note"], "1 in LONG terrain: BTC");
}

#[tokio::test]
async fn test_report_endpoint() {
    let (app, _, notifier) = app_after_one_cycle().await;

    let (status, body) = call(app.clone(), post_json("/api/report/ethusdt/1h", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "ETHUSDT");
    assert!(body["text"].as_str().unwrap().contains("RSI(22): 100.00"));
    assert!(notifier.sent().last().unwrap().text.starts_with("📊 ETHUSDT"));

    let (status, _) = call(app.clone(), post_json("/api/report/ETHUSDT/4h", Value::Null)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(app, post_json("/api/report/ETHUSDT/7h", Value::Null)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_annotation_endpoint() {
    let (app, monitor, notifier) = app_after_one_cycle().await;
    let id = monitor.state().read().await.history().iter().next().unwrap().id;

    let uri = format!("/api/history/{}/annotation", id);
    let (status, body) = call(app.clone(), post_json(&uri, serde_json::json!({ "text": "taken" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["annotation"], "taken");
    assert_eq!(notifier.edits().len(), 1);

    let (status, _) = call(app.clone(), post_json(&uri, serde_json::json!({ "text": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = format!("/api/history/{}/annotation", uuid::Uuid::new_v4());
    let (status, _) = call(app, post_json(&missing, serde_json::json!({ "text": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _, _) = app_after_one_cycle().await;
    let (status, body) = call(app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pairs"], 2);
    assert_eq!(body["source"]["source"], "mock");
}
