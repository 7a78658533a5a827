//! switchback.toml configuration.
//!
//! The whole process configuration is parsed once at startup into an
//! immutable [`DrConfig`] and shared by reference. No component reads the
//! environment; thresholds and wait budgets all live here.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::controller::DnsTarget;
use crate::region::RegionRole;

/// Top-level configuration for one primary/standby region pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrConfig {
    pub primary: RegionSettings,
    pub standby: RegionSettings,
    pub dns: DnsSettings,
    #[serde(default)]
    pub health: HealthSettings,
    #[serde(default)]
    pub orchestration: OrchestrationSettings,
    #[serde(default)]
    pub notify: NotifySettings,
}

/// Everything region-scoped the control plane needs to know about one side
/// of the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    /// Provider region name, e.g. "us-east-1".
    pub region: String,
    /// Compute cluster holding the application services.
    pub cluster: String,
    /// Services scaled as a unit (typically backend and frontend).
    pub services: Vec<String>,
    /// Database instance identifier.
    pub db_identifier: String,
    /// Entry-point DNS name (load balancer) for this region.
    pub entry_dns: String,
    /// Hosted-zone ID of the entry point, for alias records.
    pub alias_zone_id: String,
}

impl RegionSettings {
    /// URL of this region's application health endpoint.
    pub fn health_url(&self, path: &str) -> String {
        format!("http://{}{}", self.entry_dns, path)
    }

    /// Alias target pointing at this region's entry point.
    pub fn dns_target(&self) -> DnsTarget {
        DnsTarget {
            alias_zone_id: self.alias_zone_id.clone(),
            dns_name: self.entry_dns.clone(),
        }
    }
}

/// Public DNS record the orchestrator repoints between regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsSettings {
    /// Hosted-zone ID of the public zone.
    pub zone_id: String,
    /// Fully-qualified application domain.
    pub domain: String,
}

/// Health probing thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Path probed on each region's entry point.
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    /// Per-probe timeout for the endpoint check, in seconds.
    #[serde(default = "default_endpoint_timeout_secs")]
    pub endpoint_timeout_secs: u64,
    /// Replication lag at or above this is unhealthy.
    #[serde(default = "default_lag_unhealthy_secs")]
    pub lag_unhealthy_secs: f64,
    /// Replication lag above this fires the early-warning alert.
    #[serde(default = "default_lag_warning_secs")]
    pub lag_warning_secs: f64,
    /// Window over which the lag metric is sampled, in seconds.
    #[serde(default = "default_lag_window_secs")]
    pub lag_window_secs: u64,
}

fn default_endpoint_path() -> String {
    "/health".to_string()
}
fn default_endpoint_timeout_secs() -> u64 {
    5
}
fn default_lag_unhealthy_secs() -> f64 {
    60.0
}
fn default_lag_warning_secs() -> f64 {
    300.0
}
fn default_lag_window_secs() -> u64 {
    60
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            endpoint_path: default_endpoint_path(),
            endpoint_timeout_secs: default_endpoint_timeout_secs(),
            lag_unhealthy_secs: default_lag_unhealthy_secs(),
            lag_warning_secs: default_lag_warning_secs(),
            lag_window_secs: default_lag_window_secs(),
        }
    }
}

/// Step budgets for the failover/failback sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationSettings {
    /// Desired count per service when a region serves live traffic.
    #[serde(default = "default_serving_count")]
    pub serving_count: u32,
    /// Desired count per service for the warm-standby floor.
    #[serde(default = "default_standby_floor")]
    pub standby_floor: u32,
    /// Attempt budget for the service-stabilization wait.
    #[serde(default = "default_stable_wait_attempts")]
    pub stable_wait_attempts: u32,
    /// Interval between stabilization polls, in seconds.
    #[serde(default = "default_stable_wait_interval_secs")]
    pub stable_wait_interval_secs: u64,
    /// Attempt budget for the database-promotion wait.
    #[serde(default = "default_promote_wait_attempts")]
    pub promote_wait_attempts: u32,
    /// Interval between promotion polls, in seconds.
    #[serde(default = "default_promote_wait_interval_secs")]
    pub promote_wait_interval_secs: u64,
}

fn default_serving_count() -> u32 {
    2
}
fn default_standby_floor() -> u32 {
    1
}
fn default_stable_wait_attempts() -> u32 {
    40
}
fn default_stable_wait_interval_secs() -> u64 {
    15
}
fn default_promote_wait_attempts() -> u32 {
    40
}
fn default_promote_wait_interval_secs() -> u64 {
    30
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self {
            serving_count: default_serving_count(),
            standby_floor: default_standby_floor(),
            stable_wait_attempts: default_stable_wait_attempts(),
            stable_wait_interval_secs: default_stable_wait_interval_secs(),
            promote_wait_attempts: default_promote_wait_attempts(),
            promote_wait_interval_secs: default_promote_wait_interval_secs(),
        }
    }
}

/// Notification transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifySettings {
    /// Webhook URL notifications are POSTed to. None logs locally instead.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl DrConfig {
    /// Parse a switchback.toml file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DrConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Settings for the region currently playing `role`.
    pub fn region(&self, role: RegionRole) -> &RegionSettings {
        match role {
            RegionRole::Primary => &self.primary,
            RegionRole::Standby => &self.standby,
        }
    }

    /// Configuration for local drills against the simulated provider.
    pub fn drill_defaults() -> Self {
        Self {
            primary: RegionSettings {
                region: "us-east-1".to_string(),
                cluster: "app-primary".to_string(),
                services: vec!["backend".to_string(), "frontend".to_string()],
                db_identifier: "app-db-primary".to_string(),
                entry_dns: "alb-primary.example.internal".to_string(),
                alias_zone_id: "Z-PRIMARY".to_string(),
            },
            standby: RegionSettings {
                region: "us-west-2".to_string(),
                cluster: "app-dr".to_string(),
                services: vec!["backend".to_string(), "frontend".to_string()],
                db_identifier: "app-db-replica".to_string(),
                entry_dns: "alb-dr.example.internal".to_string(),
                alias_zone_id: "Z-STANDBY".to_string(),
            },
            dns: DnsSettings {
                zone_id: "Z-PUBLIC".to_string(),
                domain: "app.example.com".to_string(),
            },
            health: HealthSettings::default(),
            orchestration: OrchestrationSettings::default(),
            notify: NotifySettings::default(),
        }
    }
}
