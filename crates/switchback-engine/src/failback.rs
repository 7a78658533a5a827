//! The failback sequence: standby → primary.
//!
//! Failback never proceeds against an unready primary: the verification
//! step runs before any mutation. Once DNS and the pointer have moved,
//! the remaining steps are cleanup and advisory only.

use switchback_state::StepStatus;
use tracing::warn;

use crate::engine::{OrchestrationEngine, StepLog, critical};
use crate::error::RunAbort;

const VERIFY: &str = "verify_primary";
const DNS: &str = "update_dns";
const POINTER: &str = "update_active_region";
const SCALE_DOWN: &str = "scale_dr_down";
const REPLICATION: &str = "recreate_replication";

pub(crate) async fn execute(
    engine: &OrchestrationEngine,
    log: &mut StepLog<'_>,
) -> Result<(), RunAbort> {
    let config = &engine.config;
    let primary = &config.primary;
    let standby = &config.standby;
    let orch = &config.orchestration;

    // Step 1: verify the primary is ready. Aborting here means zero
    // mutations were issued.
    log.push(VERIFY, StepStatus::Started, "Checking primary region health")?;
    let db = critical(
        log,
        VERIFY,
        engine
            .controller
            .describe_database_status(&primary.region, &primary.db_identifier)
            .await,
    )?;
    if db.status != "available" {
        let reason = format!("Primary database not available: {}", db.status);
        log.push(VERIFY, StepStatus::Failed, reason.clone())?;
        return Err(RunAbort::precondition(VERIFY, reason));
    }
    for service in &primary.services {
        let running = critical(
            log,
            VERIFY,
            engine
                .controller
                .service_running_units(&primary.region, &primary.cluster, service)
                .await,
        )?;
        if running < 1 {
            let reason = format!("Service {service} has no running tasks");
            log.push(VERIFY, StepStatus::Failed, reason.clone())?;
            return Err(RunAbort::precondition(VERIFY, reason));
        }
    }
    log.push(VERIFY, StepStatus::Completed, "Primary region is healthy")?;

    // Step 2: repoint public DNS back at the primary entry point.
    log.push(
        DNS,
        StepStatus::Started,
        format!("Switching DNS to {}", primary.entry_dns),
    )?;
    critical(
        log,
        DNS,
        engine
            .controller
            .switch_dns(&config.dns.zone_id, &config.dns.domain, &primary.dns_target())
            .await,
    )?;
    log.push(
        DNS,
        StepStatus::Completed,
        format!("DNS updated to {}", primary.entry_dns),
    )?;

    // Step 3: flip the active-region pointer back. Same non-rollback
    // caveat as failover: DNS stays where it is if this fails.
    log.push(
        POINTER,
        StepStatus::Started,
        format!("Setting active region to {}", primary.region),
    )?;
    critical(
        log,
        POINTER,
        engine.controller.set_active_region(&primary.region).await,
    )?;
    log.push(
        POINTER,
        StepStatus::Completed,
        format!("Active region set to {}", primary.region),
    )?;

    // Step 4: scale the standby down to its warm floor. Best-effort: the
    // cutover already happened, so a failure is recorded without failing
    // the run.
    log.push(
        SCALE_DOWN,
        StepStatus::Started,
        format!("Scaling {} to {} tasks", standby.cluster, orch.standby_floor),
    )?;
    match engine
        .controller
        .scale_compute(
            &standby.region,
            &standby.cluster,
            &standby.services,
            orch.standby_floor,
        )
        .await
    {
        Ok(()) => {
            log.push(
                SCALE_DOWN,
                StepStatus::Completed,
                format!("Standby scaled to {}", orch.standby_floor),
            )?;
        }
        Err(e) => {
            warn!(error = %e, "standby scale-down failed after cutover");
            log.push(
                SCALE_DOWN,
                StepStatus::Failed,
                format!("{e} (run continues; reconcile standby capacity manually)"),
            )?;
        }
    }

    // Step 5: replication cannot be re-established automatically after a
    // promotion; surface it as an operator action item.
    log.push(
        REPLICATION,
        StepStatus::Info,
        "Replication must be re-established manually: create a new standby \
         read replica from the primary database",
    )?;

    Ok(())
}
