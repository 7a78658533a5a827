//! Run lifecycle: admission, step recording, terminal notifications.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use switchback_core::{ControllerResult, DrConfig, RegionController};
use switchback_notify::NotificationSink;
use switchback_state::{
    OrchestrationRun, RunKind, RunStateStore, RunStatus, StateError, StateResult, StepRecord,
    StepStatus,
};

use crate::error::{EngineError, EngineResult, RunAbort};
use crate::{failback, failover};

/// Executes the failover and failback sequences.
pub struct OrchestrationEngine {
    pub(crate) controller: Arc<dyn RegionController>,
    pub(crate) store: RunStateStore,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) config: Arc<DrConfig>,
}

impl OrchestrationEngine {
    pub fn new(
        controller: Arc<dyn RegionController>,
        store: RunStateStore,
        sink: Arc<dyn NotificationSink>,
        config: Arc<DrConfig>,
    ) -> Self {
        Self {
            controller,
            store,
            sink,
            config,
        }
    }

    /// Move active status from primary to standby.
    ///
    /// Returns the terminal run record; a FAILED run is an `Ok` value.
    /// `Err` means the run was rejected (one already in flight) or the
    /// state store failed.
    pub async fn run_failover(&self, reason: &str) -> EngineResult<OrchestrationRun> {
        self.run(RunKind::Failover, reason).await
    }

    /// Return active status from standby to primary.
    pub async fn run_failback(&self, reason: &str) -> EngineResult<OrchestrationRun> {
        self.run(RunKind::Failback, reason).await
    }

    async fn run(&self, kind: RunKind, reason: &str) -> EngineResult<OrchestrationRun> {
        let run_id = uuid::Uuid::new_v4().to_string();

        // Admission: at most one run per region pair, of either kind.
        if let Err(e) = self.store.try_admit_run(&run_id, kind) {
            return match e {
                StateError::RunInProgress(holder) => {
                    warn!(kind = %kind, %holder, "run rejected, another is in flight");
                    Err(EngineError::RunInProgress(holder))
                }
                other => Err(other.into()),
            };
        }

        let result = self.execute_run(&run_id, kind, reason).await;

        // The guard is released on every terminal path, including state
        // store failures mid-run.
        if let Err(e) = self.store.release_run(&run_id) {
            error!(%run_id, error = %e, "failed to release run guard");
        }

        result.map_err(EngineError::from)
    }

    async fn execute_run(
        &self,
        run_id: &str,
        kind: RunKind,
        reason: &str,
    ) -> StateResult<OrchestrationRun> {
        let started_at = Utc::now();
        let (destination, origin) = match kind {
            RunKind::Failover => (&self.config.standby, &self.config.primary),
            RunKind::Failback => (&self.config.primary, &self.config.standby),
        };
        info!(%run_id, kind = %kind, reason, destination = %destination.region, "run initiated");

        self.sink
            .notify(
                &format!("DR {} Initiated", title(kind)),
                &format!(
                    "{} to {} region ({}) has been initiated.\n\n\
                     Start time: {}\nReason: {}",
                    title(kind),
                    role_name(kind),
                    destination.region,
                    started_at.to_rfc3339(),
                    reason,
                ),
            )
            .await;

        let mut run = OrchestrationRun {
            run_id: run_id.to_string(),
            kind,
            status: RunStatus::InProgress,
            reason: reason.to_string(),
            started_at,
            completed_at: None,
            duration_seconds: None,
            steps: Vec::new(),
            // Until the run completes, the origin keeps serving.
            resulting_active_region: origin.region.clone(),
            error: None,
        };
        self.store.record_run(&run)?;

        let mut log = StepLog {
            store: &self.store,
            kind,
            run_id: run_id.to_string(),
            steps: Vec::new(),
        };
        let outcome = match kind {
            RunKind::Failover => failover::execute(self, &mut log).await,
            RunKind::Failback => failback::execute(self, &mut log).await,
        };
        run.steps = log.steps;

        let completed_at = Utc::now();
        run.completed_at = Some(completed_at);
        run.duration_seconds =
            Some((completed_at - started_at).num_milliseconds() as f64 / 1000.0);

        match outcome {
            Ok(()) => {
                run.status = RunStatus::Completed;
                run.resulting_active_region = destination.region.clone();
                self.store.record_run(&run)?;
                info!(
                    %run_id,
                    kind = %kind,
                    duration_seconds = run.duration_seconds,
                    active_region = %run.resulting_active_region,
                    "run completed"
                );
                self.notify_success(&run).await;
                Ok(run)
            }
            Err(RunAbort::Step { step, source }) => {
                run.status = RunStatus::Failed;
                run.error = Some(format!("step {step} failed: {source}"));
                self.store.record_run(&run)?;
                error!(%run_id, kind = %kind, %step, error = %source, "run failed");
                self.notify_failure(&run).await;
                Ok(run)
            }
            Err(RunAbort::State(e)) => {
                // The audit trail itself is broken; surface it raw.
                error!(%run_id, kind = %kind, error = %e, "run aborted on state store failure");
                Err(e)
            }
        }
    }

    async fn notify_success(&self, run: &OrchestrationRun) {
        let action_item = match run.kind {
            RunKind::Failover => String::new(),
            RunKind::Failback => "\nACTION REQUIRED:\n\
                 Recreate the standby read replica from the primary database.\n"
                .to_string(),
        };
        self.sink
            .notify(
                &format!("DR {} Completed", title(run.kind)),
                &format!(
                    "{} to {} region ({}) completed.\n\n\
                     Duration: {:.1} seconds\n\
                     Active region: {}\n\
                     Application URL: https://{}\n{}\n\
                     Details:\n{}",
                    title(run.kind),
                    role_name(run.kind),
                    run.resulting_active_region,
                    run.duration_seconds.unwrap_or(0.0),
                    run.resulting_active_region,
                    self.config.dns.domain,
                    action_item,
                    steps_json(run),
                ),
            )
            .await;
    }

    async fn notify_failure(&self, run: &OrchestrationRun) {
        self.sink
            .notify(
                &format!("DR {} Failed", title(run.kind)),
                &format!(
                    "{} FAILED.\n\n\
                     Error: {}\n\n\
                     Partial results:\n{}\n\n\
                     MANUAL INTERVENTION REQUIRED!",
                    title(run.kind),
                    run.error.as_deref().unwrap_or("unknown"),
                    steps_json(run),
                ),
            )
            .await;
    }
}

fn title(kind: RunKind) -> &'static str {
    match kind {
        RunKind::Failover => "Failover",
        RunKind::Failback => "Failback",
    }
}

/// The destination's role name, as operators read it.
fn role_name(kind: RunKind) -> &'static str {
    match kind {
        RunKind::Failover => "standby",
        RunKind::Failback => "primary",
    }
}

fn steps_json(run: &OrchestrationRun) -> String {
    serde_json::to_string_pretty(&run.steps).unwrap_or_else(|_| "[]".to_string())
}

/// Records step outcomes both durably and in the run's in-memory history.
pub(crate) struct StepLog<'a> {
    store: &'a RunStateStore,
    kind: RunKind,
    run_id: String,
    pub(crate) steps: Vec<StepRecord>,
}

impl StepLog<'_> {
    pub(crate) fn push(
        &mut self,
        step: &str,
        status: StepStatus,
        detail: impl Into<String>,
    ) -> StateResult<()> {
        let record = StepRecord {
            run_id: self.run_id.clone(),
            step: step.to_string(),
            status,
            timestamp: Utc::now(),
            detail: detail.into(),
        };
        self.store.record_step(self.kind, &record)?;
        self.steps.push(record);
        Ok(())
    }
}

/// Unwrap a critical provider call: on failure, record the FAILED step
/// and abort the sequence.
pub(crate) fn critical<T>(
    log: &mut StepLog<'_>,
    step: &str,
    result: ControllerResult<T>,
) -> Result<T, RunAbort> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            log.push(step, StepStatus::Failed, e.to_string())?;
            Err(RunAbort::execution(step, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use switchback_core::{DrConfig, SimDatabase, SimFailure, SimRegion};
    use switchback_notify::CollectingSink;

    /// Drill config with wait budgets shrunk so failure paths don't sleep.
    fn fast_config() -> DrConfig {
        let mut config = DrConfig::drill_defaults();
        config.orchestration.stable_wait_attempts = 2;
        config.orchestration.stable_wait_interval_secs = 0;
        config.orchestration.promote_wait_attempts = 2;
        config.orchestration.promote_wait_interval_secs = 0;
        config
    }

    fn engine_with(sim: &SimRegion) -> (OrchestrationEngine, RunStateStore, Arc<CollectingSink>) {
        let store = RunStateStore::open_in_memory().unwrap();
        let sink = Arc::new(CollectingSink::new());
        let engine = OrchestrationEngine::new(
            Arc::new(sim.clone()),
            store.clone(),
            sink.clone(),
            Arc::new(fast_config()),
        );
        (engine, store, sink)
    }

    /// Region pair as it looks after a completed failover: standby is
    /// serving, its database is standalone, primary has recovered.
    fn post_failover_sim() -> SimRegion {
        SimRegion::new("us-west-2")
            .with_database("app-db-primary", SimDatabase::available("db-primary:5432"))
            .with_database("app-db-replica", SimDatabase::available("db-replica:5432"))
            .with_service("app-primary", "backend", 2)
            .with_service("app-primary", "frontend", 2)
            .with_service("app-dr", "backend", 2)
            .with_service("app-dr", "frontend", 2)
            .with_replication_lag(None)
    }

    /// Last status per step, in order of first appearance.
    fn terminal_outcomes(run: &OrchestrationRun) -> Vec<(String, StepStatus)> {
        let mut order: Vec<String> = Vec::new();
        let mut last: HashMap<String, StepStatus> = HashMap::new();
        for record in &run.steps {
            if !order.contains(&record.step) {
                order.push(record.step.clone());
            }
            last.insert(record.step.clone(), record.status);
        }
        order
            .into_iter()
            .map(|name| {
                let status = last[&name];
                (name, status)
            })
            .collect()
    }

    fn position(log: &[String], prefix: &str) -> usize {
        log.iter()
            .position(|m| m.starts_with(prefix))
            .unwrap_or_else(|| panic!("no mutation starting with {prefix:?} in {log:?}"))
    }

    // ── Failover ───────────────────────────────────────────────────

    #[tokio::test]
    async fn failover_completes_with_ordered_steps() {
        let sim = SimRegion::from_config(&fast_config());
        let (engine, store, sink) = engine_with(&sim);

        let run = engine.run_failover("primary endpoint down").await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.resulting_active_region, "us-west-2");
        assert_eq!(run.reason, "primary endpoint down");
        assert!(run.duration_seconds.is_some());
        assert!(run.error.is_none());

        // Step order is exactly scale, promote, dns, pointer.
        let outcomes = terminal_outcomes(&run);
        assert_eq!(
            outcomes,
            vec![
                ("scale_services".to_string(), StepStatus::Completed),
                ("promote_database".to_string(), StepStatus::Completed),
                ("update_dns".to_string(), StepStatus::Completed),
                ("update_active_region".to_string(), StepStatus::Completed),
            ]
        );

        // The pointer changed only after DNS, which changed only after
        // compute and promotion.
        let mutations = sim.mutation_log();
        assert!(position(&mutations, "scale_compute") < position(&mutations, "promote_database"));
        assert!(position(&mutations, "promote_database") < position(&mutations, "switch_dns"));
        assert!(position(&mutations, "switch_dns") < position(&mutations, "set_active_region"));

        assert_eq!(sim.active_region_value(), "us-west-2");
        assert_eq!(
            sim.current_dns_target().unwrap().dns_name,
            "alb-dr.example.internal"
        );
        assert_eq!(sim.desired_count("app-dr", "backend"), Some(2));

        // Audit trail is durable and matches the returned run.
        let persisted = store.latest_run(RunKind::Failover).unwrap().unwrap();
        assert_eq!(persisted, run);
        assert_eq!(store.steps_for_run(&run.run_id).unwrap(), run.steps);
        assert!(store.active_run().unwrap().is_none());

        assert_eq!(
            sink.subjects(),
            vec![
                "DR Failover Initiated".to_string(),
                "DR Failover Completed".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn failover_skips_promotion_for_standalone_database() {
        let sim = SimRegion::from_config(&fast_config())
            .with_database("app-db-replica", SimDatabase::available("db-replica:5432"));
        let (engine, _store, _sink) = engine_with(&sim);

        let run = engine.run_failover("drill").await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        let outcomes = terminal_outcomes(&run);
        assert!(outcomes.contains(&("promote_database".to_string(), StepStatus::Skipped)));
        // No promotion was issued against the provider.
        assert!(
            !sim.mutation_log()
                .iter()
                .any(|m| m.starts_with("promote_database"))
        );
    }

    #[tokio::test]
    async fn failover_aborts_when_scale_fails() {
        let sim = SimRegion::from_config(&fast_config()).fail_on(SimFailure::ScaleCompute);
        let (engine, store, sink) = engine_with(&sim);

        let run = engine.run_failover("drill").await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().unwrap().contains("scale_services"));

        // The sequence short-circuited before any mutation landed.
        assert!(sim.mutation_log().is_empty());
        assert!(sim.current_dns_target().is_none());
        assert_eq!(sim.active_region_value(), "us-east-1");
        assert_eq!(run.resulting_active_region, "us-east-1");

        let persisted = store.latest_run(RunKind::Failover).unwrap().unwrap();
        assert_eq!(persisted.status, RunStatus::Failed);

        let notifications = sink.notifications();
        assert_eq!(notifications[1].subject, "DR Failover Failed");
        assert!(notifications[1].body.contains("MANUAL INTERVENTION REQUIRED"));
    }

    #[tokio::test]
    async fn failover_aborts_when_stabilization_times_out() {
        let sim = SimRegion::from_config(&fast_config()).fail_on(SimFailure::WaitStable);
        let (engine, _store, _sink) = engine_with(&sim);

        let run = engine.run_failover("drill").await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        // Compute was touched, but nothing downstream of it.
        let mutations = sim.mutation_log();
        assert!(mutations.iter().all(|m| m.starts_with("scale_compute")));
        assert_eq!(sim.active_region_value(), "us-east-1");
    }

    #[tokio::test]
    async fn failover_pointer_failure_leaves_dns_moved() {
        let sim = SimRegion::from_config(&fast_config()).fail_on(SimFailure::SetActiveRegion);
        let (engine, _store, sink) = engine_with(&sim);

        let run = engine.run_failover("drill").await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        // DNS already moved and is deliberately not reverted.
        assert_eq!(
            sim.current_dns_target().unwrap().dns_name,
            "alb-dr.example.internal"
        );
        // The pointer still reports the pre-run region.
        assert_eq!(sim.active_region_value(), "us-east-1");
        assert_eq!(run.resulting_active_region, "us-east-1");

        // All four steps appear in the failure notification.
        let outcomes = terminal_outcomes(&run);
        let names: Vec<&str> = outcomes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "scale_services",
                "promote_database",
                "update_dns",
                "update_active_region"
            ]
        );
        let failure_body = &sink.notifications()[1].body;
        for name in names {
            assert!(failure_body.contains(name), "missing {name} in notification");
        }
    }

    // ── Failback ───────────────────────────────────────────────────

    #[tokio::test]
    async fn failback_completes_with_action_item() {
        let sim = post_failover_sim();
        let (engine, store, sink) = engine_with(&sim);

        let run = engine.run_failback("primary recovered").await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.resulting_active_region, "us-east-1");
        assert_eq!(sim.active_region_value(), "us-east-1");
        assert_eq!(
            sim.current_dns_target().unwrap().dns_name,
            "alb-primary.example.internal"
        );
        // Standby dropped to the warm floor.
        assert_eq!(sim.desired_count("app-dr", "backend"), Some(1));
        assert_eq!(sim.desired_count("app-dr", "frontend"), Some(1));

        let outcomes = terminal_outcomes(&run);
        assert_eq!(
            outcomes,
            vec![
                ("verify_primary".to_string(), StepStatus::Completed),
                ("update_dns".to_string(), StepStatus::Completed),
                ("update_active_region".to_string(), StepStatus::Completed),
                ("scale_dr_down".to_string(), StepStatus::Completed),
                ("recreate_replication".to_string(), StepStatus::Info),
            ]
        );

        let notifications = sink.notifications();
        assert_eq!(notifications[1].subject, "DR Failback Completed");
        assert!(notifications[1].body.contains("ACTION REQUIRED"));
        assert!(
            store
                .latest_run(RunKind::Failback)
                .unwrap()
                .unwrap()
                .status
                == RunStatus::Completed
        );
    }

    #[tokio::test]
    async fn failback_aborts_on_stopped_primary_database() {
        let sim = post_failover_sim().with_database(
            "app-db-primary",
            SimDatabase::available("db-primary:5432").with_status("stopped"),
        );
        let (engine, _store, _sink) = engine_with(&sim);

        let run = engine.run_failback("drill").await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().unwrap().contains("stopped"));
        // Zero mutating calls were issued.
        assert!(sim.mutation_log().is_empty());
        assert_eq!(sim.active_region_value(), "us-west-2");
        assert!(sim.current_dns_target().is_none());
    }

    #[tokio::test]
    async fn failback_aborts_when_primary_service_has_no_tasks() {
        let sim = post_failover_sim().with_service("app-primary", "backend", 0);
        let (engine, _store, _sink) = engine_with(&sim);

        let run = engine.run_failback("drill").await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().unwrap().contains("backend"));
        assert!(sim.mutation_log().is_empty());
    }

    #[tokio::test]
    async fn failback_scale_down_failure_does_not_fail_the_run() {
        let sim = post_failover_sim().fail_on(SimFailure::ScaleCompute);
        let (engine, _store, sink) = engine_with(&sim);

        let run = engine.run_failback("drill").await.unwrap();

        // The critical cutover completed; the cleanup failure is recorded.
        assert_eq!(run.status, RunStatus::Completed);
        let outcomes = terminal_outcomes(&run);
        assert!(outcomes.contains(&("scale_dr_down".to_string(), StepStatus::Failed)));
        assert_eq!(sim.active_region_value(), "us-east-1");
        assert_eq!(sink.notifications()[1].subject, "DR Failback Completed");
    }

    // ── Admission ──────────────────────────────────────────────────

    #[tokio::test]
    async fn second_run_is_rejected_without_mutating() {
        let sim = SimRegion::from_config(&fast_config());
        let (engine, store, _sink) = engine_with(&sim);

        store.try_admit_run("run-held", RunKind::Failback).unwrap();

        let err = engine.run_failover("drill").await;
        assert!(matches!(err, Err(EngineError::RunInProgress(_))));
        assert!(sim.mutation_log().is_empty());
        assert!(store.latest_run(RunKind::Failover).unwrap().is_none());
    }

    #[tokio::test]
    async fn guard_is_released_after_failed_runs() {
        let sim = SimRegion::from_config(&fast_config()).fail_on(SimFailure::SwitchDns);
        let (engine, store, _sink) = engine_with(&sim);

        let run = engine.run_failover("drill").await.unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(store.active_run().unwrap().is_none());

        // A subsequent run is admitted again.
        let second = engine.run_failover("drill again").await.unwrap();
        assert_eq!(second.status, RunStatus::Failed);
        assert_ne!(second.run_id, run.run_id);
    }

    #[tokio::test]
    async fn failover_then_failback_roundtrip() {
        let config = fast_config();
        let sim = SimRegion::from_config(&config);
        let (engine, store, _sink) = engine_with(&sim);

        let failover = engine.run_failover("drill").await.unwrap();
        assert_eq!(failover.status, RunStatus::Completed);
        assert_eq!(sim.active_region_value(), "us-west-2");

        let failback = engine.run_failback("drill complete").await.unwrap();
        assert_eq!(failback.status, RunStatus::Completed);
        assert_eq!(sim.active_region_value(), "us-east-1");
        assert_eq!(
            sim.current_dns_target().unwrap().dns_name,
            "alb-primary.example.internal"
        );

        // Both kinds report their own latest run.
        assert_eq!(
            store.latest_run(RunKind::Failover).unwrap().unwrap().run_id,
            failover.run_id
        );
        assert_eq!(
            store.latest_run(RunKind::Failback).unwrap().unwrap().run_id,
            failback.run_id
        );
    }
}
