use std::sync::Arc;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use fareline_api::{app, AppState};
use fareline_core::{CarrierCode, ManualClock};
use fareline_store::{Config, FixtureCarrierSource, FixtureSet};
use serde_json::{json, Value};
use tower::ServiceExt;

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");
const FIXTURES: &str = include_str!("../../fixtures/flights.json");

fn router(failing: &[&str]) -> Router {
    let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
    let fixtures: FixtureSet = serde_json::from_str(FIXTURES).unwrap();
    let source = FixtureCarrierSource::new(fixtures)
        .with_failing_carriers(failing.iter().map(|c| CarrierCode::new(c)));
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 1, 0, 0).unwrap()));
    app(AppState::build(&config, Arc::new(source), clock).unwrap())
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn search_body() -> Value {
    json!({ "origin": "sgn", "destination": "han", "date": "2026-11-02", "adults": 1 })
}

#[tokio::test]
async fn test_search_returns_cheapest_first_despite_failed_carrier() {
    let response = router(&["QH"])
        .oneshot(post("/v1/flights/search", search_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot = body_json(response).await;
    assert_eq!(snapshot["outcome"]["state"], "available");
    assert_eq!(snapshot["request"]["origin"], "SGN");
    assert_eq!(snapshot["sequence"], 5);

    let numbers: Vec<&str> = snapshot["flights"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["flight_number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers.len(), 6);
    assert_eq!(numbers[0], "VJ121");
    assert!(!numbers.contains(&"QH201"));
    assert!(!numbers.contains(&"VN1373"));

    let qh = snapshot["carriers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["carrier"] == "QH")
        .unwrap();
    assert_eq!(qh["status"], "error");
}

#[tokio::test]
async fn test_search_with_every_carrier_down_reports_failure() {
    let response = router(&["VN", "VJ", "QH", "BL", "VU"])
        .oneshot(post("/v1/flights/search", search_body()))
        .await
        .unwrap();
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["outcome"]["state"], "failed");
    assert!(snapshot["flights"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_search_is_bad_request() {
    let body = json!({ "origin": "SGN", "destination": "SGN", "date": "2026-11-02", "adults": 1 });
    let response = router(&[]).oneshot(post("/v1/flights/search", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].as_str().unwrap().contains("both SGN"));
}

#[tokio::test]
async fn test_stream_emits_snapshot_per_carrier_then_complete() {
    let response = router(&["BL"])
        .oneshot(post("/v1/flights/search/stream", search_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let text = body_text(response).await;
    assert_eq!(text.matches("event: snapshot").count(), 6);
    assert_eq!(text.matches("event: complete").count(), 1);
    assert!(text.contains(r#""state":"available""#));
}

#[tokio::test]
async fn test_cheapest_fare_lookup() {
    let response = router(&[])
        .oneshot(get("/v1/fares/cheapest?origin=SGN&destination=HAN&date=2026-11-02&adults=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let price = body_json(response).await;
    assert_eq!(price["state"], "available");
    assert_eq!(price["currency"], "VND");

    let response = router(&[])
        .oneshot(get("/v1/fares/cheapest?origin=SGN&destination=HAN&date=2026-10-01"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["state"], "past");
}

#[tokio::test]
async fn test_trend_strip_around_selected_day() {
    let response = router(&[])
        .oneshot(get("/v1/fares/trend?origin=SGN&destination=HAN&date=2026-10-19"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let trend = body_json(response).await;
    assert_eq!(trend["window_start"], "2026-10-16");

    let cells = trend["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 7);
    assert_eq!(cells[0]["price"]["state"], "past");
    assert_eq!(cells[1]["price"]["state"], "past");
    assert_eq!(cells[3]["date"], "2026-10-19");
    assert_eq!(cells[3]["selected"], true);
    assert!(cells[2..].iter().all(|c| c["price"]["state"] == "available"));
}

#[tokio::test]
async fn test_metrics_and_health() {
    let app = router(&[]);
    app.clone().oneshot(post("/v1/flights/search", search_body())).await.unwrap();

    let health = body_json(app.clone().oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["carriers"], json!(["VN", "VJ", "QH", "BL", "VU"]));

    let metrics = body_text(app.oneshot(get("/metrics")).await.unwrap()).await;
    assert!(metrics.contains(r#"fareline_search_sessions_total{outcome="available"} 1"#));
    assert!(metrics.contains(r#"fareline_carrier_responses_total{carrier="VU",status="success"} 1"#));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = router(&[]).oneshot(get("/v1/bookings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_past_trend_skips_live_search() {
    let app = router(&[]);
    let response = app
        .clone()
        .oneshot(get("/v1/fares/trend?origin=SGN&destination=HAN&date=2026-10-10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let trend = body_json(response).await;
    assert_eq!(trend["selected"], "2026-10-10");
    let cells = trend["cells"].as_array().unwrap();
    assert!(cells.iter().all(|c| c["price"]["state"] == "past"));

    let metrics = body_text(app.oneshot(get("/metrics")).await.unwrap()).await;
    assert!(!metrics.contains("fareline_search_sessions_total"));
    assert!(!metrics.contains("fareline_carrier_responses_total"));
}
