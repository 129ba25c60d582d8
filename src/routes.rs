//! REST endpoints: list, onboard, offboard.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::backends::BackendMode;
use crate::employee::{OffboardRequest, OnboardRequest};
use crate::error::WorkflowError;
use crate::workflow::Orchestrator;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub mode: BackendMode,
}

/// Build the router with the employee routes and health check.
pub fn employee_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/employees", get(list_employees))
        .route("/onboard", post(onboard))
        .route("/offboard", post(offboard))
        .with_state(state)
}

/// [`employee_routes`] wrapped in request tracing and CORS for the web frontend.
pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    employee_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(allow_origin)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "hr-orchestrator",
        "mode": state.mode,
    }))
}

// ── Employees ───────────────────────────────────────────────────────────

async fn list_employees(State(state): State<AppState>) -> impl IntoResponse {
    match state.orchestrator.list_employees().await {
        Ok(employees) => (StatusCode::OK, Json(json!(employees))),
        Err(e) => {
            error!(error = %e, "Listing employees failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

/// Bodies are taken as untyped JSON and only then read into the request
/// type, so a missing field surfaces as a workflow error (500) rather than an
/// extractor rejection.
fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, WorkflowError> {
    serde_json::from_value(body).map_err(|e| WorkflowError::InvalidRequest(e.to_string()))
}

async fn onboard(State(state): State<AppState>, Json(body): Json<Value>) -> impl IntoResponse {
    let result = match parse_body::<OnboardRequest>(body) {
        Ok(request) => state.orchestrator.onboard(request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(report) => {
            info!(username = %report.username, "Onboarding request completed");
            (
                StatusCode::OK,
                Json(json!({
                    "message": format!("Onboarding complete for {}", report.username),
                    "steps": report.log(),
                    "username": report.username,
                    "runId": report.run_id,
                    "outcomes": report.outcomes,
                })),
            )
        }
        Err(e) => workflow_error_response(e, "steps"),
    }
}

async fn offboard(State(state): State<AppState>, Json(body): Json<Value>) -> impl IntoResponse {
    let result = match parse_body::<OffboardRequest>(body) {
        Ok(request) => state.orchestrator.offboard(request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(report) => {
            info!(username = %report.username, "Offboarding request completed");
            (
                StatusCode::OK,
                Json(json!({
                    "message": "Offboarding successful",
                    "logs": report.log(),
                    "username": report.username,
                    "runId": report.run_id,
                    "outcomes": report.outcomes,
                })),
            )
        }
        Err(e) => workflow_error_response(e, "logs"),
    }
}

/// `{error}` with status 500; an aborted run also carries its partial log
/// under `log_key`.
fn workflow_error_response(err: WorkflowError, log_key: &str) -> (StatusCode, Json<Value>) {
    error!(error = %err, "Workflow request failed");
    let mut body = json!({ "error": err.to_string() });
    if let WorkflowError::Aborted { report, .. } = &err {
        body[log_key] = json!(report.log());
        body["runId"] = json!(report.run_id);
        body["outcomes"] = json!(report.outcomes);
    }
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
}
