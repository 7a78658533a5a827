//! switchback-engine — the failover/failback orchestration engine.
//!
//! Executes the two fixed, strictly-ordered step sequences against a
//! [`RegionController`](switchback_core::RegionController), recording every
//! step outcome in the run-state store and notifying operators at run
//! start, completion, and failure.
//!
//! # Sequences
//!
//! ```text
//! FAILOVER:  scale_services → promote_database (or skip) → update_dns
//!            → update_active_region
//! FAILBACK:  verify_primary → update_dns → update_active_region
//!            → scale_dr_down (best-effort) → recreate_replication (note)
//! ```
//!
//! A critical step's failure short-circuits the rest of the sequence and
//! marks the run FAILED; there is no rollback engine. Once DNS has moved,
//! a later failure leaves DNS where it is and demands manual
//! reconciliation — the failure notification says so explicitly.
//!
//! Only one run (of either kind) may be in flight at a time: admission is
//! a conditional write against the run-state store, checked before the
//! first mutating step and released on every terminal path.

pub mod engine;
pub mod error;

mod failback;
mod failover;

pub use engine::OrchestrationEngine;
pub use error::{EngineError, EngineResult, RunAbort, StepError};
