//! API request handlers
//!
//! Handlers for all REST API endpoints.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::broker::{cascade_order, SchemaReport, SharedOutputBroker};
use crate::cascade::MarketDataGenerator;
use crate::error::ExsimError;
use crate::excel::MarketDataExporter;
use crate::market::{load_market_report, map_market_data, MappingOptions, SectionKind};
use crate::types::{Company, Dashboard, Outputs};

use super::server::AppState;

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

fn failure<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiResponse<T>>) {
    (status, Json(ApiResponse::err(message)))
}

fn error_status(e: &ExsimError) -> StatusCode {
    match e {
        ExsimError::NotFound(_) => StatusCode::NOT_FOUND,
        ExsimError::Validation(_) | ExsimError::MissingContainer(_) | ExsimError::Xml(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn parse_dashboard<T: Serialize>(
    name: &str,
) -> Result<Dashboard, (StatusCode, Json<ApiResponse<T>>)> {
    name.parse::<Dashboard>()
        .map_err(|e| failure(StatusCode::BAD_REQUEST, e.to_string()))
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

fn endpoint(method: &str, path: &str, description: &str) -> EndpointInfo {
    EndpointInfo {
        path: path.to_string(),
        method: method.to_string(),
        description: description.to_string(),
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(RootResponse {
        name: "ExSim API Server".to_string(),
        version: state.version.clone(),
        description: "Shared outputs broker for the ExSim war room dashboards".to_string(),
        endpoints: vec![
            endpoint("GET", "/health", "Health check endpoint"),
            endpoint("GET", "/version", "Get server version"),
            endpoint("GET", "/api/v1/status", "Export status of every dashboard"),
            endpoint("GET", "/api/v1/graph", "Dependency graph and cascade order"),
            endpoint("POST", "/api/v1/export", "Publish a dashboard's outputs"),
            endpoint("GET", "/api/v1/import/:dashboard", "Read a dashboard's outputs"),
            endpoint(
                "GET",
                "/api/v1/dependencies/:dashboard",
                "Outputs of a dashboard's dependencies",
            ),
            endpoint("POST", "/api/v1/clear", "Remove every published output"),
            endpoint("POST", "/api/v1/market/map", "Map a market report to MARKET_DATA"),
        ],
    }))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_message: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        uptime_message: "Server is running".to_string(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: ["status", "graph", "export", "import", "dependencies", "clear", "market"]
            .iter()
            .map(|f| f.to_string())
            .collect(),
    }))
}

/// GET /api/v1/status - One status line per dashboard
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.broker.get_status()))
}

/// Graph response
#[derive(Serialize)]
pub struct GraphResponse {
    pub order: Vec<Dashboard>,
    pub dependencies: BTreeMap<Dashboard, Vec<Dashboard>>,
}

/// GET /api/v1/graph - Dependency graph
pub async fn graph() -> ApiResult<GraphResponse> {
    let order = cascade_order()
        .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let dependencies = Dashboard::ALL
        .into_iter()
        .map(|d| (d, d.dependencies().to_vec()))
        .collect();
    Ok(Json(ApiResponse::ok(GraphResponse {
        order,
        dependencies,
    })))
}

/// Export request
#[derive(Deserialize)]
pub struct ExportRequest {
    pub dashboard: String,
    pub outputs: Outputs,
}

/// Export response
#[derive(Serialize)]
pub struct ExportResponse {
    pub dashboard: Dashboard,
    pub keys: usize,
    pub schema: SchemaReport,
}

/// POST /api/v1/export - Publish outputs
pub async fn export(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExportRequest>,
) -> ApiResult<ExportResponse> {
    let dashboard = parse_dashboard(&req.dashboard)?;
    let keys = req.outputs.len();
    let schema = SharedOutputBroker::schema_report(dashboard, &req.outputs);

    if !state.broker.export_outputs(dashboard, req.outputs) {
        return Err(failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not write {} outputs", dashboard),
        ));
    }

    Ok(Json(ApiResponse::ok(ExportResponse {
        dashboard,
        keys,
        schema,
    })))
}

/// Import response
#[derive(Serialize)]
pub struct ImportResponse {
    pub dashboard: Dashboard,
    pub timestamp: Option<String>,
    pub outputs: Outputs,
}

/// GET /api/v1/import/:dashboard - Read outputs
pub async fn import(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<ImportResponse> {
    let dashboard = parse_dashboard(&name)?;

    match state.broker.import_data(dashboard) {
        Some(outputs) => Ok(Json(ApiResponse::ok(ImportResponse {
            dashboard,
            timestamp: state.broker.last_export(dashboard),
            outputs,
        }))),
        None => Err(failure(
            StatusCode::NOT_FOUND,
            format!("No data for {}", dashboard),
        )),
    }
}

/// Dependencies response
#[derive(Serialize)]
pub struct DependenciesResponse {
    pub dashboard: Dashboard,
    pub declared: Vec<Dashboard>,
    pub missing: Vec<Dashboard>,
    pub available: BTreeMap<Dashboard, Outputs>,
}

/// GET /api/v1/dependencies/:dashboard - Upstream outputs
pub async fn dependencies(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<DependenciesResponse> {
    let dashboard = parse_dashboard(&name)?;
    let available = state.broker.import_dependencies(dashboard);
    let declared = dashboard.dependencies().to_vec();
    let missing = declared
        .iter()
        .copied()
        .filter(|d| !available.contains_key(d))
        .collect();

    Ok(Json(ApiResponse::ok(DependenciesResponse {
        dashboard,
        declared,
        missing,
        available,
    })))
}

/// Clear response
#[derive(Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

/// POST /api/v1/clear - Reset the store
pub async fn clear(State(state): State<Arc<AppState>>) -> ApiResult<ClearResponse> {
    state
        .broker
        .clear()
        .map_err(|e| failure(error_status(&e), e.to_string()))?;
    Ok(Json(ApiResponse::ok(ClearResponse { cleared: true })))
}

fn default_period() -> u32 {
    MappingOptions::default().period
}

fn default_company() -> String {
    Company::A3.name().to_string()
}

/// Market mapping request
#[derive(Deserialize)]
pub struct MapMarketRequest {
    pub source_path: String,
    pub output_path: String,
    #[serde(default = "default_period")]
    pub period: u32,
    #[serde(default = "default_company")]
    pub company: String,
    /// Also publish CMO outputs to the shared store
    #[serde(default)]
    pub publish: bool,
}

/// Market mapping response
#[derive(Serialize)]
pub struct MapMarketResponse {
    pub rows: usize,
    pub output_path: String,
    pub sections: BTreeMap<SectionKind, usize>,
    pub published: bool,
}

/// POST /api/v1/market/map - Market report to MARKET_DATA workbook
pub async fn map_market(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MapMarketRequest>,
) -> ApiResult<MapMarketResponse> {
    let company = Company::parse(&req.company).ok_or_else(|| {
        failure(
            StatusCode::BAD_REQUEST,
            format!("Unknown company '{}'", req.company),
        )
    })?;

    let tables = load_market_report(PathBuf::from(&req.source_path))
        .map_err(|e| failure(error_status(&e), e.to_string()))?;

    let sections = SectionKind::ALL
        .into_iter()
        .map(|kind| (kind, tables.get(kind).len()))
        .collect();

    let options = MappingOptions {
        period: req.period,
        ..MappingOptions::default()
    };
    let rows = map_market_data(&tables, &options);
    let row_count = rows.len();
    MarketDataExporter::new(rows)
        .export(&PathBuf::from(&req.output_path))
        .map_err(|e| failure(error_status(&e), e.to_string()))?;

    let published = if req.publish {
        let outputs = MarketDataGenerator::new(tables)
            .with_company(company)
            .market_outputs();
        let ok = state.broker.export_outputs(Dashboard::Cmo, outputs);
        if !ok {
            warn!("Mapped {} but could not publish CMO outputs", req.source_path);
        }
        ok
    } else {
        false
    };

    Ok(Json(ApiResponse::ok(MapMarketResponse {
        rows: row_count,
        output_path: req.output_path,
        sections,
        published,
    })))
}
