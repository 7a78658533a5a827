//! Domain types persisted by the run-state store.
//!
//! Runs and step records form the audit trail of the failover/failback
//! sequences; health snapshots record probe cycles. All timestamps are
//! RFC 3339 UTC. Statuses serialize in their original wire form
//! (`IN_PROGRESS`, `COMPLETED`, ...), which is what inspection tooling
//! reads back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of one orchestration run.
pub type RunId = String;

// ── Runs ──────────────────────────────────────────────────────────

/// Which orchestration sequence a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Failover,
    Failback,
}

impl RunKind {
    /// State key of this kind's latest-run pointer.
    pub fn state_key(self) -> &'static str {
        match self {
            Self::Failover => "failover_state",
            Self::Failback => "failback_state",
        }
    }

    /// Prefix for per-step latest-pointer keys.
    pub fn step_key_prefix(self) -> &'static str {
        match self {
            Self::Failover => "failover_step_",
            Self::Failback => "failback_step_",
        }
    }

    /// Parse the lowercase wire form used in API paths.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "failover" => Some(Self::Failover),
            "failback" => Some(Self::Failback),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failover => write!(f, "failover"),
            Self::Failback => write!(f, "failback"),
        }
    }
}

/// Run-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

/// Step-level status.
///
/// A step may log several records (Started, then InProgress during a
/// provider wait, then a terminal one). `Info` marks advisory records
/// that carry operator notes rather than an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Started,
    InProgress,
    Completed,
    Failed,
    Skipped,
    Info,
}

/// One append-only entry in a run's step history. Never mutated after
/// write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub run_id: RunId,
    pub step: String,
    pub status: StepStatus,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

/// One execution of the failover or failback sequence, fully audited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRun {
    pub run_id: RunId,
    pub kind: RunKind,
    pub status: RunStatus,
    /// Operator-supplied trigger reason.
    pub reason: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    /// Step records in execution order.
    pub steps: Vec<StepRecord>,
    /// The region serving traffic once this run reached its terminal
    /// status: the destination on COMPLETED, otherwise the pre-run region.
    pub resulting_active_region: String,
    pub error: Option<String>,
}

/// Latest-pointer entry written under `failover_state` / `failback_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStateEntry {
    pub state_key: String,
    pub run_id: RunId,
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    pub active_region: String,
    /// JSON summary of the run's step records.
    pub details: String,
}

/// Admission guard stored under `active_run` while a run is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRunGuard {
    pub run_id: RunId,
    pub kind: RunKind,
    pub started_at: DateTime<Utc>,
}

// ── Health ────────────────────────────────────────────────────────

/// Result of probing one region's application endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointHealth {
    pub healthy: bool,
    pub status_code: u16,
    /// Response body, truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EndpointHealth {
    /// An endpoint that could not be reached at all.
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            status_code: 0,
            body: None,
            error: Some(error.into()),
        }
    }
}

/// Result of probing one database instance's availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub healthy: bool,
    /// Raw provider status string, or "ERROR"/"NOT_FOUND".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of sampling replication lag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationHealth {
    pub healthy: bool,
    /// Lag in seconds; -1 when the sample itself failed.
    pub lag_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One immutable health-evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub primary_endpoint: EndpointHealth,
    /// Recorded but not gating: the standby is a warm standby and need
    /// not serve traffic.
    pub dr_endpoint: EndpointHealth,
    pub primary_db: DatabaseHealth,
    pub dr_db: DatabaseHealth,
    pub replication: ReplicationHealth,
    pub overall_healthy: bool,
}

/// Flattened latest-pointer entry written under `health_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatusEntry {
    pub state_key: String,
    pub timestamp: DateTime<Utc>,
    pub primary_endpoint_healthy: bool,
    pub dr_endpoint_healthy: bool,
    pub primary_db_healthy: bool,
    pub dr_db_healthy: bool,
    pub replication_lag_seconds: f64,
    pub overall_healthy: bool,
    /// Full snapshot JSON.
    pub details: String,
}

/// Entry written under `last_health_check` after every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastCheckEntry {
    pub state_key: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_kind_state_keys() {
        assert_eq!(RunKind::Failover.state_key(), "failover_state");
        assert_eq!(RunKind::Failback.state_key(), "failback_state");
        assert_eq!(RunKind::Failover.step_key_prefix(), "failover_step_");
    }

    #[test]
    fn run_kind_parse() {
        assert_eq!(RunKind::parse("failover"), Some(RunKind::Failover));
        assert_eq!(RunKind::parse("failback"), Some(RunKind::Failback));
        assert_eq!(RunKind::parse("sideways"), None);
    }

    #[test]
    fn statuses_serialize_in_wire_form() {
        assert_eq!(
            serde_json::to_string(&RunStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(
            serde_json::to_string(&StepStatus::Skipped).unwrap(),
            "\"SKIPPED\""
        );
    }

    #[test]
    fn unreachable_endpoint_shape() {
        let e = EndpointHealth::unreachable("connection refused");
        assert!(!e.healthy);
        assert_eq!(e.status_code, 0);
        assert_eq!(e.error.as_deref(), Some("connection refused"));
    }
}
