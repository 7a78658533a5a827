//! switchback-health — health checking for the region pair.
//!
//! Probing is read-only and may run concurrently with an in-flight
//! orchestration run; snapshots are timestamped so consumers can detect
//! staleness. Every probe failure mode (network error, not-found,
//! provider error) is converted into a structured unhealthy result —
//! nothing here throws past its boundary.
//!
//! # Architecture
//!
//! ```text
//! HealthProbe
//!   ├── http_probe()            → EndpointHealth   (primary + standby)
//!   ├── RegionController reads  → DatabaseHealth   (primary + standby)
//!   └── RegionController reads  → ReplicationHealth
//! HealthEvaluator
//!   ├── evaluate()              → HealthSnapshot   (pure)
//!   ├── RunStateStore           ← snapshot + latest pointers
//!   └── NotificationSink        ← alert conditions
//! ```
//!
//! # Policy
//!
//! Overall health deliberately ignores the standby endpoint: the standby
//! is a warm standby and need not serve traffic. Replication lag under
//! 60 s is healthy; a missing datapoint is treated as healthy with an
//! explanatory note. A separate 300 s threshold fires the early-warning
//! alert without flipping overall health. Alerts never auto-trigger
//! failover — triggering stays a deliberate, separate action.

pub mod evaluator;
pub mod probe;

pub use evaluator::{HealthEvaluator, alerts_for, evaluate};
pub use probe::{HealthProbe, ProbeSample, http_probe};
