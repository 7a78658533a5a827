//! Provider capability surface consumed by the orchestration engine.
//!
//! `RegionController` abstracts the region-scoped infrastructure primitives
//! (compute scaling, database promotion, DNS alias switching, the durable
//! active-region pointer). The engine and health probes only ever see this
//! trait; cloud adapters implement it, and [`crate::sim::SimRegion`]
//! provides the in-memory implementation used for drills and tests.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Result type alias for provider calls.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors surfaced by provider calls.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("provider call failed: {0}")]
    Provider(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{what} not ready after {attempts} attempts at {interval_secs}s intervals")]
    WaitTimeout {
        what: String,
        attempts: u32,
        interval_secs: u64,
    },
}

/// Where an alias DNS record should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsTarget {
    /// Hosted-zone ID of the alias target (the load balancer's zone).
    pub alias_zone_id: String,
    /// DNS name of the alias target.
    pub dns_name: String,
}

/// Outcome of a promotion request.
///
/// `promoted` is false when the instance was already standalone and no
/// promotion was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub promoted: bool,
}

/// Raw database status as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStatus {
    /// Provider status string, e.g. "available", "stopped".
    pub status: String,
    /// Endpoint address, when the provider reports one.
    pub endpoint: Option<String>,
}

/// Replication lag sample for a read replica.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicationLag {
    pub lag_seconds: f64,
    /// False when the provider had no datapoint in the sampled window.
    pub has_data: bool,
}

/// Region-scoped infrastructure primitives.
///
/// All waits are bounded: implementations must poll with the given attempt
/// budget and return [`ControllerError::WaitTimeout`] rather than hang.
#[async_trait]
pub trait RegionController: Send + Sync {
    /// Set the desired count for each service in a compute cluster.
    async fn scale_compute(
        &self,
        region: &str,
        cluster: &str,
        services: &[String],
        desired_count: u32,
    ) -> ControllerResult<()>;

    /// Block until every service reports stable at its desired count.
    async fn wait_until_stable(
        &self,
        region: &str,
        cluster: &str,
        services: &[String],
        attempts: u32,
        interval: Duration,
    ) -> ControllerResult<()>;

    /// Promote a read replica to a standalone instance.
    ///
    /// Returns `promoted: false` without side effects when the instance is
    /// already standalone.
    async fn promote_database(
        &self,
        region: &str,
        db_identifier: &str,
    ) -> ControllerResult<Promotion>;

    /// Block until the database instance reports available.
    async fn wait_until_available(
        &self,
        region: &str,
        db_identifier: &str,
        attempts: u32,
        interval: Duration,
    ) -> ControllerResult<()>;

    /// Upsert the public alias record for `domain` to the given target.
    ///
    /// The alias must be health-evaluated so traffic only flows once the
    /// target reports healthy.
    async fn switch_dns(
        &self,
        zone_id: &str,
        domain: &str,
        target: &DnsTarget,
    ) -> ControllerResult<()>;

    /// Write the durable active-region pointer.
    async fn set_active_region(&self, region: &str) -> ControllerResult<()>;

    /// Read the durable active-region pointer.
    async fn get_active_region(&self) -> ControllerResult<String>;

    /// Describe a database instance's availability state.
    async fn describe_database_status(
        &self,
        region: &str,
        db_identifier: &str,
    ) -> ControllerResult<DatabaseStatus>;

    /// Sample replication lag for a read replica over the given window.
    async fn replication_lag_seconds(
        &self,
        region: &str,
        db_identifier: &str,
        window: Duration,
    ) -> ControllerResult<ReplicationLag>;

    /// Number of running units for one service in a cluster.
    async fn service_running_units(
        &self,
        region: &str,
        cluster: &str,
        service: &str,
    ) -> ControllerResult<u32>;
}
