//! The failover sequence: primary → standby.
//!
//! Ordering is load-bearing. Compute must be serving before the database
//! promotion cuts replication; DNS must not move until both are ready;
//! the active-region pointer flips last, only after DNS succeeded.

use std::time::Duration;

use switchback_core::Promotion;
use switchback_state::StepStatus;

use crate::engine::{OrchestrationEngine, StepLog, critical};
use crate::error::RunAbort;

const SCALE: &str = "scale_services";
const PROMOTE: &str = "promote_database";
const DNS: &str = "update_dns";
const POINTER: &str = "update_active_region";

pub(crate) async fn execute(
    engine: &OrchestrationEngine,
    log: &mut StepLog<'_>,
) -> Result<(), RunAbort> {
    let config = &engine.config;
    let standby = &config.standby;
    let orch = &config.orchestration;

    // Step 1: scale standby compute to serving capacity and block until
    // stable. Traffic must not be pointed at unready compute.
    log.push(
        SCALE,
        StepStatus::Started,
        format!("Scaling {} to {} tasks", standby.cluster, orch.serving_count),
    )?;
    critical(
        log,
        SCALE,
        engine
            .controller
            .scale_compute(
                &standby.region,
                &standby.cluster,
                &standby.services,
                orch.serving_count,
            )
            .await,
    )?;
    log.push(
        SCALE,
        StepStatus::InProgress,
        "Waiting for services to stabilize",
    )?;
    critical(
        log,
        SCALE,
        engine
            .controller
            .wait_until_stable(
                &standby.region,
                &standby.cluster,
                &standby.services,
                orch.stable_wait_attempts,
                Duration::from_secs(orch.stable_wait_interval_secs),
            )
            .await,
    )?;
    log.push(
        SCALE,
        StepStatus::Completed,
        format!("Services scaled to {}", orch.serving_count),
    )?;

    // Step 2: promote the standby database if it is still a replica.
    log.push(
        PROMOTE,
        StepStatus::Started,
        format!("Promoting {}", standby.db_identifier),
    )?;
    let promotion = critical(
        log,
        PROMOTE,
        engine
            .controller
            .promote_database(&standby.region, &standby.db_identifier)
            .await,
    )?;
    match promotion {
        Promotion { promoted: true } => {
            log.push(
                PROMOTE,
                StepStatus::InProgress,
                "Waiting for promotion to complete",
            )?;
            critical(
                log,
                PROMOTE,
                engine
                    .controller
                    .wait_until_available(
                        &standby.region,
                        &standby.db_identifier,
                        orch.promote_wait_attempts,
                        Duration::from_secs(orch.promote_wait_interval_secs),
                    )
                    .await,
            )?;
            log.push(
                PROMOTE,
                StepStatus::Completed,
                "Database promoted successfully",
            )?;
        }
        Promotion { promoted: false } => {
            log.push(
                PROMOTE,
                StepStatus::Skipped,
                "Instance is already standalone",
            )?;
        }
    }

    // Step 3: repoint public DNS at the standby entry point. The alias is
    // health-evaluated, so clients only flow once the target is up.
    log.push(
        DNS,
        StepStatus::Started,
        format!("Switching DNS to {}", standby.entry_dns),
    )?;
    critical(
        log,
        DNS,
        engine
            .controller
            .switch_dns(&config.dns.zone_id, &config.dns.domain, &standby.dns_target())
            .await,
    )?;
    log.push(
        DNS,
        StepStatus::Completed,
        format!("DNS updated to {}", standby.entry_dns),
    )?;

    // Step 4: flip the active-region pointer. DNS has already moved; a
    // failure here is not rolled back automatically and leaves the pair
    // pointer-inconsistent until an operator reconciles it.
    log.push(
        POINTER,
        StepStatus::Started,
        format!("Setting active region to {}", standby.region),
    )?;
    critical(
        log,
        POINTER,
        engine.controller.set_active_region(&standby.region).await,
    )?;
    log.push(
        POINTER,
        StepStatus::Completed,
        format!("Active region set to {}", standby.region),
    )?;

    Ok(())
}
