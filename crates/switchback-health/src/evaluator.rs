//! Health evaluation — reduce probe results to a verdict, persist, alert.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use switchback_core::DrConfig;
use switchback_notify::{AlertEvent, NotificationSink, Severity};
use switchback_state::{HealthSnapshot, RunStateStore, StateResult};

use crate::probe::ProbeSample;

/// Reduce one probe sample into an immutable snapshot.
///
/// Overall health gates on the primary endpoint, both databases, and
/// replication. The standby endpoint is recorded but does not gate: the
/// standby is warm and need not serve traffic.
pub fn evaluate(sample: ProbeSample, timestamp: DateTime<Utc>) -> HealthSnapshot {
    let overall_healthy = sample.primary_endpoint.healthy
        && sample.primary_db.healthy
        && sample.dr_db.healthy
        && sample.replication.healthy;
    HealthSnapshot {
        timestamp,
        primary_endpoint: sample.primary_endpoint,
        dr_endpoint: sample.dr_endpoint,
        primary_db: sample.primary_db,
        dr_db: sample.dr_db,
        replication: sample.replication,
        overall_healthy,
    }
}

/// Alert conditions raised by a snapshot.
///
/// The replication warning uses a higher threshold than the raw health
/// cutoff; it is an early warning, not a hard failure.
pub fn alerts_for(snapshot: &HealthSnapshot, config: &DrConfig) -> Vec<AlertEvent> {
    let mut alerts = Vec::new();

    if !snapshot.primary_endpoint.healthy {
        alerts.push(AlertEvent::new(
            Severity::Critical,
            "DR Alert: Primary Endpoint Unhealthy",
            format!(
                "Primary endpoint at {} is not responding.\n\n\
                 Status code: {}\nError: {}\n\n\
                 Consider initiating failover if the condition persists.",
                config.primary.entry_dns,
                snapshot.primary_endpoint.status_code,
                snapshot
                    .primary_endpoint
                    .error
                    .as_deref()
                    .unwrap_or("none"),
            ),
        ));
    }

    if !snapshot.primary_db.healthy {
        alerts.push(AlertEvent::new(
            Severity::Critical,
            "DR Alert: Primary Database Unhealthy",
            format!(
                "Primary database {} is not healthy.\n\nStatus: {}",
                config.primary.db_identifier, snapshot.primary_db.status,
            ),
        ));
    }

    if snapshot.replication.lag_seconds > config.health.lag_warning_secs {
        alerts.push(AlertEvent::new(
            Severity::Warning,
            "DR Warning: High Replication Lag",
            format!(
                "Replication lag is {} seconds.\n\n\
                 This exceeds the {}-second warning threshold.\n\
                 RPO may be at risk.",
                snapshot.replication.lag_seconds, config.health.lag_warning_secs,
            ),
        ));
    }

    alerts
}

/// Runs evaluation cycles: snapshot, persist, alert.
pub struct HealthEvaluator {
    store: RunStateStore,
    sink: Arc<dyn NotificationSink>,
    config: Arc<DrConfig>,
}

impl HealthEvaluator {
    pub fn new(store: RunStateStore, sink: Arc<dyn NotificationSink>, config: Arc<DrConfig>) -> Self {
        Self {
            store,
            sink,
            config,
        }
    }

    /// Evaluate one probe sample, persist the snapshot, and dispatch any
    /// alert conditions. Alerts never trigger orchestration.
    pub async fn run_cycle(&self, sample: ProbeSample) -> StateResult<HealthSnapshot> {
        let snapshot = evaluate(sample, Utc::now());
        self.store.record_health(&snapshot)?;

        for alert in alerts_for(&snapshot, &self.config) {
            alert.dispatch(self.sink.as_ref()).await;
        }

        info!(
            overall_healthy = snapshot.overall_healthy,
            replication_lag = snapshot.replication.lag_seconds,
            "health cycle completed"
        );
        Ok(snapshot)
    }
}
