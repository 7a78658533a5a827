//! Simulated provider backend.
//!
//! [`SimRegion`] implements [`RegionController`] entirely in memory:
//! scripted database statuses, instantly-converging service scaling, an
//! in-memory active-region pointer, and an ordered log of every mutating
//! call. The daemon's standalone mode runs against it for game-day drills;
//! engine and health tests drive failure paths through it via
//! [`SimFailure`] injection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DrConfig;
use crate::controller::{
    ControllerError, ControllerResult, DatabaseStatus, DnsTarget, Promotion, RegionController,
    ReplicationLag,
};
use crate::retry::wait_until;

/// Which provider call to fail, for drills and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFailure {
    ScaleCompute,
    WaitStable,
    PromoteDatabase,
    WaitAvailable,
    SwitchDns,
    SetActiveRegion,
}

/// Scripted state of one database instance.
#[derive(Debug, Clone)]
pub struct SimDatabase {
    pub status: String,
    pub endpoint: Option<String>,
    pub is_replica: bool,
}

impl SimDatabase {
    /// An available standalone instance.
    pub fn available(endpoint: &str) -> Self {
        Self {
            status: "available".to_string(),
            endpoint: Some(endpoint.to_string()),
            is_replica: false,
        }
    }

    /// An available read replica.
    pub fn replica(endpoint: &str) -> Self {
        Self {
            is_replica: true,
            ..Self::available(endpoint)
        }
    }

    /// Override the provider status string, e.g. "stopped".
    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ServiceState {
    desired: u32,
    running: u32,
}

#[derive(Debug, Default)]
struct SimState {
    active_region: String,
    databases: HashMap<String, SimDatabase>,
    /// Keyed by `{cluster}/{service}`.
    services: HashMap<String, ServiceState>,
    dns_target: Option<DnsTarget>,
    replication_lag: Option<f64>,
    failures: Vec<SimFailure>,
    /// Mutating calls, in issue order.
    mutations: Vec<String>,
}

/// In-memory `RegionController` with scripted behavior.
#[derive(Debug, Clone, Default)]
pub struct SimRegion {
    state: Arc<Mutex<SimState>>,
}

fn service_key(cluster: &str, service: &str) -> String {
    format!("{cluster}/{service}")
}

impl SimRegion {
    /// Create a sim with the given active-region pointer value.
    pub fn new(active_region: &str) -> Self {
        let sim = Self::default();
        sim.lock().active_region = active_region.to_string();
        sim
    }

    /// Seed a sim matching a configuration's steady state: primary serving,
    /// standby at the warm floor with an up-to-date replica.
    pub fn from_config(config: &DrConfig) -> Self {
        let mut sim = Self::new(&config.primary.region)
            .with_database(
                &config.primary.db_identifier,
                SimDatabase::available("db-primary.internal:5432"),
            )
            .with_database(
                &config.standby.db_identifier,
                SimDatabase::replica("db-replica.internal:5432"),
            )
            .with_replication_lag(Some(1.0));
        for svc in &config.primary.services {
            sim = sim.with_service(
                &config.primary.cluster,
                svc,
                config.orchestration.serving_count,
            );
        }
        for svc in &config.standby.services {
            sim = sim.with_service(
                &config.standby.cluster,
                svc,
                config.orchestration.standby_floor,
            );
        }
        sim
    }

    pub fn with_database(self, identifier: &str, db: SimDatabase) -> Self {
        self.lock().databases.insert(identifier.to_string(), db);
        self
    }

    pub fn with_service(self, cluster: &str, service: &str, running: u32) -> Self {
        self.lock().services.insert(
            service_key(cluster, service),
            ServiceState {
                desired: running,
                running,
            },
        );
        self
    }

    pub fn with_replication_lag(self, lag_seconds: Option<f64>) -> Self {
        self.lock().replication_lag = lag_seconds;
        self
    }

    pub fn fail_on(self, failure: SimFailure) -> Self {
        self.lock().failures.push(failure);
        self
    }

    // ── Inspection ─────────────────────────────────────────────────

    /// Mutating calls issued so far, in order.
    pub fn mutation_log(&self) -> Vec<String> {
        self.lock().mutations.clone()
    }

    /// Current active-region pointer value.
    pub fn active_region_value(&self) -> String {
        self.lock().active_region.clone()
    }

    /// Current alias target, if DNS has been switched.
    pub fn current_dns_target(&self) -> Option<DnsTarget> {
        self.lock().dns_target.clone()
    }

    /// Desired count for one service, if known.
    pub fn desired_count(&self, cluster: &str, service: &str) -> Option<u32> {
        self.lock()
            .services
            .get(&service_key(cluster, service))
            .map(|s| s.desired)
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().expect("sim state lock poisoned")
    }

    fn fail_if_scripted(&self, failure: SimFailure, what: &str) -> ControllerResult<()> {
        if self.lock().failures.contains(&failure) {
            return Err(ControllerError::Provider(format!(
                "simulated {what} failure"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RegionController for SimRegion {
    async fn scale_compute(
        &self,
        _region: &str,
        cluster: &str,
        services: &[String],
        desired_count: u32,
    ) -> ControllerResult<()> {
        self.fail_if_scripted(SimFailure::ScaleCompute, "scale_compute")?;
        let mut state = self.lock();
        for svc in services {
            let entry = state.services.entry(service_key(cluster, svc)).or_default();
            entry.desired = desired_count;
            // The sim converges instantly; the stabilization wait observes it.
            entry.running = desired_count;
        }
        for svc in services {
            state
                .mutations
                .push(format!("scale_compute {cluster}/{svc} -> {desired_count}"));
        }
        Ok(())
    }

    async fn wait_until_stable(
        &self,
        _region: &str,
        cluster: &str,
        services: &[String],
        attempts: u32,
        interval: Duration,
    ) -> ControllerResult<()> {
        self.fail_if_scripted(SimFailure::WaitStable, "wait_until_stable")?;
        wait_until("services stable", attempts, interval, || {
            let stable = {
                let state = self.lock();
                services.iter().all(|svc| {
                    state
                        .services
                        .get(&service_key(cluster, svc))
                        .is_some_and(|s| s.running == s.desired)
                })
            };
            async move { Ok(stable) }
        })
        .await
    }

    async fn promote_database(
        &self,
        _region: &str,
        db_identifier: &str,
    ) -> ControllerResult<Promotion> {
        self.fail_if_scripted(SimFailure::PromoteDatabase, "promote_database")?;
        let mut state = self.lock();
        let db = state
            .databases
            .get_mut(db_identifier)
            .ok_or_else(|| ControllerError::NotFound(format!("database {db_identifier}")))?;
        if !db.is_replica {
            return Ok(Promotion { promoted: false });
        }
        db.is_replica = false;
        db.status = "available".to_string();
        state
            .mutations
            .push(format!("promote_database {db_identifier}"));
        Ok(Promotion { promoted: true })
    }

    async fn wait_until_available(
        &self,
        _region: &str,
        db_identifier: &str,
        attempts: u32,
        interval: Duration,
    ) -> ControllerResult<()> {
        self.fail_if_scripted(SimFailure::WaitAvailable, "wait_until_available")?;
        let identifier = db_identifier.to_string();
        wait_until("database available", attempts, interval, || {
            let available = {
                let state = self.lock();
                state
                    .databases
                    .get(&identifier)
                    .is_some_and(|db| db.status == "available")
            };
            async move { Ok(available) }
        })
        .await
    }

    async fn switch_dns(
        &self,
        _zone_id: &str,
        domain: &str,
        target: &DnsTarget,
    ) -> ControllerResult<()> {
        self.fail_if_scripted(SimFailure::SwitchDns, "switch_dns")?;
        let mut state = self.lock();
        state.dns_target = Some(target.clone());
        state
            .mutations
            .push(format!("switch_dns {domain} -> {}", target.dns_name));
        Ok(())
    }

    async fn set_active_region(&self, region: &str) -> ControllerResult<()> {
        self.fail_if_scripted(SimFailure::SetActiveRegion, "set_active_region")?;
        let mut state = self.lock();
        state.active_region = region.to_string();
        state.mutations.push(format!("set_active_region {region}"));
        Ok(())
    }

    async fn get_active_region(&self) -> ControllerResult<String> {
        Ok(self.lock().active_region.clone())
    }

    async fn describe_database_status(
        &self,
        _region: &str,
        db_identifier: &str,
    ) -> ControllerResult<DatabaseStatus> {
        let state = self.lock();
        let db = state
            .databases
            .get(db_identifier)
            .ok_or_else(|| ControllerError::NotFound(format!("database {db_identifier}")))?;
        Ok(DatabaseStatus {
            status: db.status.clone(),
            endpoint: db.endpoint.clone(),
        })
    }

    async fn replication_lag_seconds(
        &self,
        _region: &str,
        _db_identifier: &str,
        _window: Duration,
    ) -> ControllerResult<ReplicationLag> {
        let lag = self.lock().replication_lag;
        Ok(ReplicationLag {
            lag_seconds: lag.unwrap_or(0.0),
            has_data: lag.is_some(),
        })
    }

    async fn service_running_units(
        &self,
        _region: &str,
        cluster: &str,
        service: &str,
    ) -> ControllerResult<u32> {
        let state = self.lock();
        state
            .services
            .get(&service_key(cluster, service))
            .map(|s| s.running)
            .ok_or_else(|| ControllerError::NotFound(format!("service {cluster}/{service}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scale_then_stable_wait_converges() {
        let sim = SimRegion::new("us-east-1").with_service("app-dr", "backend", 1);
        let services = vec!["backend".to_string()];

        sim.scale_compute("us-west-2", "app-dr", &services, 2)
            .await
            .unwrap();
        sim.wait_until_stable("us-west-2", "app-dr", &services, 3, Duration::from_millis(1))
            .await
            .unwrap();

        assert_eq!(sim.desired_count("app-dr", "backend"), Some(2));
        assert_eq!(
            sim.mutation_log(),
            vec!["scale_compute app-dr/backend -> 2"]
        );
    }

    #[tokio::test]
    async fn scripted_failure_surfaces_as_provider_error() {
        let sim = SimRegion::new("us-east-1").fail_on(SimFailure::SwitchDns);
        let target = DnsTarget {
            alias_zone_id: "Z".to_string(),
            dns_name: "alb.internal".to_string(),
        };
        let err = sim.switch_dns("ZPUB", "app.example.com", &target).await;
        assert!(matches!(err, Err(ControllerError::Provider(_))));
        assert!(sim.mutation_log().is_empty());
    }

    #[tokio::test]
    async fn promote_flips_replica_to_standalone() {
        let sim =
            SimRegion::new("us-east-1").with_database("db-r", SimDatabase::replica("r:5432"));

        let first = sim.promote_database("us-west-2", "db-r").await.unwrap();
        assert!(first.promoted);

        // Second promotion is a no-op on a standalone instance.
        let second = sim.promote_database("us-west-2", "db-r").await.unwrap();
        assert!(!second.promoted);
        assert_eq!(sim.mutation_log(), vec!["promote_database db-r"]);
    }

    #[tokio::test]
    async fn replication_lag_reports_missing_datapoints() {
        let sim = SimRegion::new("us-east-1");
        let lag = sim
            .replication_lag_seconds("us-west-2", "db-r", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!lag.has_data);

        let sim = sim.with_replication_lag(Some(42.0));
        let lag = sim
            .replication_lag_seconds("us-west-2", "db-r", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(lag.has_data);
        assert_eq!(lag.lag_seconds, 42.0);
    }

    #[tokio::test]
    async fn from_config_seeds_steady_state() {
        let config = DrConfig::drill_defaults();
        let sim = SimRegion::from_config(&config);

        assert_eq!(sim.active_region_value(), "us-east-1");
        assert_eq!(sim.desired_count("app-primary", "backend"), Some(2));
        assert_eq!(sim.desired_count("app-dr", "backend"), Some(1));

        let status = sim
            .describe_database_status("us-east-1", "app-db-primary")
            .await
            .unwrap();
        assert_eq!(status.status, "available");
    }

    #[tokio::test]
    async fn missing_database_is_not_found() {
        let sim = SimRegion::new("us-east-1");
        let err = sim.describe_database_status("us-east-1", "nope").await;
        assert!(matches!(err, Err(ControllerError::NotFound(_))));
    }
}
