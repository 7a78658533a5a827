//! REST API handlers.
//!
//! Trigger handlers block until the sequence reaches a terminal status;
//! the run record is the response payload either way. Inspection handlers
//! read via `RunStateStore`.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use switchback_engine::{EngineError, EngineResult};
use switchback_state::{OrchestrationRun, RunKind, RunStatus};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// Trigger request body; the reason lands in the run record and the
/// notifications.
#[derive(serde::Deserialize, Default)]
pub struct TriggerRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

impl TriggerRequest {
    fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or("Manual trigger")
    }
}

/// Map a terminal run (or rejection) to its response.
fn run_response(result: EngineResult<OrchestrationRun>) -> Response {
    match result {
        Ok(run) => {
            let status = match run.status {
                RunStatus::Completed => StatusCode::OK,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(run)).into_response()
        }
        Err(EngineError::RunInProgress(holder)) => error_response(
            &format!("a run is already in progress: {holder}"),
            StatusCode::CONFLICT,
        )
        .into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Triggers ───────────────────────────────────────────────────────

/// POST /api/v1/failover
pub async fn trigger_failover(
    State(state): State<ApiState>,
    Json(req): Json<TriggerRequest>,
) -> impl IntoResponse {
    run_response(state.engine.run_failover(req.reason()).await)
}

/// POST /api/v1/failback
pub async fn trigger_failback(
    State(state): State<ApiState>,
    Json(req): Json<TriggerRequest>,
) -> impl IntoResponse {
    run_response(state.engine.run_failback(req.reason()).await)
}

/// POST /api/v1/health-check
pub async fn trigger_health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let sample = state.probe.sample().await;
    match state.evaluator.run_cycle(sample).await {
        Ok(snapshot) => ApiResponse::ok(snapshot).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Inspection ─────────────────────────────────────────────────────

/// GET /api/v1/health
pub async fn get_health(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.latest_health() {
        Ok(Some(snapshot)) => ApiResponse::ok(snapshot).into_response(),
        Ok(None) => {
            error_response("no health snapshot recorded", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/runs/{kind}/latest
pub async fn get_latest_run(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    let Some(kind) = RunKind::parse(&kind) else {
        return error_response(
            &format!("unknown run kind {kind:?}, expected failover or failback"),
            StatusCode::BAD_REQUEST,
        )
        .into_response();
    };
    match state.store.latest_run(kind) {
        Ok(Some(run)) => ApiResponse::ok(run).into_response(),
        Ok(None) => error_response(
            &format!("no {kind} run recorded"),
            StatusCode::NOT_FOUND,
        )
        .into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/active-region
pub async fn get_active_region(State(state): State<ApiState>) -> impl IntoResponse {
    match state.controller.get_active_region().await {
        Ok(region) => {
            ApiResponse::ok(serde_json::json!({ "active_region": region })).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}
