//! API integration tests
//!
//! Drives the full router in-process with `tower::ServiceExt::oneshot`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use exsim::api::{build_router, ApiConfig, AppState};
use exsim::broker::{MemoryStore, SharedOutputBroker};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn app() -> Router {
    let broker = SharedOutputBroker::open(Arc::new(MemoryStore::new())).unwrap();
    build_router(Arc::new(AppState::new(broker)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test-data")
        .join("market-report.xls")
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIG TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_config_default() {
    let config = ApiConfig::default();
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 8080);
    assert_eq!(config.store_path, PathBuf::from("shared_outputs.json"));
}

// ═══════════════════════════════════════════════════════════════════════════
// INFO ENDPOINTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_root_lists_endpoints() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "ExSim API Server");
    let paths: Vec<&str> = body["data"]["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"/api/v1/export"));
    assert!(paths.contains(&"/api/v1/market/map"));
}

#[tokio::test]
async fn test_health_and_version() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(&app, Method::GET, "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_graph_endpoint() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/graph", None).await;

    assert_eq!(status, StatusCode::OK);
    let order = body["data"]["order"].as_array().unwrap();
    assert_eq!(order.len(), 7);
    assert_eq!(body["data"]["dependencies"]["CMO"], json!([]));
    assert_eq!(body["data"]["dependencies"]["Production"], json!(["CMO"]));
}

// ═══════════════════════════════════════════════════════════════════════════
// BROKER ENDPOINTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_export_then_import() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/export",
        Some(json!({
            "dashboard": "CMO",
            "outputs": {"pricing": {"Center": 95}, "campaign_notes": "spring"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["dashboard"], "CMO");
    assert_eq!(body["data"]["keys"], 2);
    let missing = body["data"]["schema"]["missing"].as_array().unwrap();
    assert!(missing.contains(&json!("marketing_spend")));
    assert_eq!(body["data"]["schema"]["unexpected"], json!(["campaign_notes"]));

    let (status, body) = send(&app, Method::GET, "/api/v1/import/CMO", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outputs"]["pricing"]["Center"], 95);
    assert!(body["data"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_import_without_data_is_404() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/import/CFO", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("CFO"));
}

#[tokio::test]
async fn test_unknown_dashboard_is_400() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/v1/import/HR", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/export",
        Some(json!({"dashboard": "HR", "outputs": {"x": 1}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The rejected export left the store untouched
    let (_, body) = send(&app, Method::GET, "/api/v1/status", None).await;
    assert!(body["data"]
        .as_object()
        .unwrap()
        .values()
        .all(|line| line == "[--] No data"));
}

#[tokio::test]
async fn test_dependencies_endpoint() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/v1/export",
        Some(json!({"dashboard": "CMO", "outputs": {"pricing": {"West": 510}}})),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/v1/dependencies/CLO", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["declared"], json!(["Production", "CMO"]));
    assert_eq!(body["data"]["missing"], json!(["Production"]));
    assert_eq!(
        body["data"]["available"]["CMO"]["pricing"]["West"],
        json!(510)
    );
}

#[tokio::test]
async fn test_status_and_clear() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/v1/export",
        Some(json!({"dashboard": "ESG", "outputs": {"co2_emissions": 12.5}})),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_object().unwrap().len(), 7);
    assert!(body["data"]["ESG"].as_str().unwrap().starts_with("[OK] 1 keys @ "));

    let (status, body) = send(&app, Method::POST, "/api/v1/clear", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cleared"], true);

    let (status, _) = send(&app, Method::GET, "/api/v1/import/ESG", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
// MARKET MAPPING
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_map_market_writes_workbook_and_publishes() {
    let app = app();
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("Demand_Planner_Filled.xlsx");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/market/map",
        Some(json!({
            "source_path": fixture().to_string_lossy(),
            "output_path": output.to_string_lossy(),
            "publish": true
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["rows"], 40);
    assert_eq!(body["data"]["published"], true);
    assert_eq!(body["data"]["sections"]["market_share_region"], 20);
    assert_eq!(body["data"]["sections"]["awareness"], 40);
    assert!(output.exists());

    let (_, body) = send(&app, Method::GET, "/api/v1/import/CMO", None).await;
    assert_eq!(body["data"]["outputs"]["pricing"]["Center"], json!(520.0));
}

#[tokio::test]
async fn test_map_market_missing_report_is_404() {
    let app = app();
    let dir = TempDir::new().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/market/map",
        Some(json!({
            "source_path": dir.path().join("missing.xls").to_string_lossy(),
            "output_path": dir.path().join("out.xlsx").to_string_lossy()
        })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_map_market_unknown_company_is_400() {
    let app = app();
    let dir = TempDir::new().unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/market/map",
        Some(json!({
            "source_path": fixture().to_string_lossy(),
            "output_path": dir.path().join("out.xlsx").to_string_lossy(),
            "company": "B9"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
