//! switchback-api — REST surface for the DR control plane.
//!
//! Triggering stays a deliberate action: the API only executes a sequence
//! when explicitly invoked, and health checks never auto-trigger anything.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/failover` | Run the failover sequence |
//! | POST | `/api/v1/failback` | Run the failback sequence |
//! | POST | `/api/v1/health-check` | Run one probe/evaluate cycle |
//! | GET | `/api/v1/health` | Latest health snapshot |
//! | GET | `/api/v1/runs/{kind}/latest` | Latest run of a kind |
//! | GET | `/api/v1/active-region` | Current active-region pointer |
//!
//! Trigger responses carry the full run record as the payload: 200 on
//! COMPLETED, 500 on FAILED, and 409 when a run is already in flight
//! (idempotent-by-rejection; nothing was mutated).

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use switchback_core::RegionController;
use switchback_engine::OrchestrationEngine;
use switchback_health::{HealthEvaluator, HealthProbe};
use switchback_state::RunStateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: RunStateStore,
    pub engine: Arc<OrchestrationEngine>,
    pub probe: Arc<HealthProbe>,
    pub evaluator: Arc<HealthEvaluator>,
    pub controller: Arc<dyn RegionController>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/failover", post(handlers::trigger_failover))
        .route("/failback", post(handlers::trigger_failback))
        .route("/health-check", post(handlers::trigger_health_check))
        .route("/health", get(handlers::get_health))
        .route("/runs/{kind}/latest", get(handlers::get_latest_run))
        .route("/active-region", get(handlers::get_active_region))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
