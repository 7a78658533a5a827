//! switchback-state — embedded run-state store for the DR control plane.
//!
//! Backed by [redb](https://docs.rs/redb), this crate persists the audit
//! trail of orchestration runs (append-only step log plus run records),
//! health snapshots, and the latest-pointer entries consumers read
//! (`failover_state`, `failback_state`, `health_status`,
//! `last_health_check`). It also holds the run-admission guard: a
//! conditional write that admits at most one in-flight run per region pair.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! The step log uses sequence-numbered composite keys
//! (`{run_id}:{seq:04}`) so a prefix scan replays a run's history in
//! insertion order. There is no deletion API; retention is an external
//! concern.
//!
//! The `RunStateStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::RunStateStore;
pub use types::*;
