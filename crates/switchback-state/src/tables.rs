//! redb table definitions for the run-state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). The step log's `{run_id}:{seq:04}` keys keep insertion order
//! under lexicographic iteration.

use redb::TableDefinition;

/// Latest-pointer entries keyed by state key: `failover_state`,
/// `failback_state`, `failover_step_<name>`, `failback_step_<name>`,
/// `health_status`, `last_health_check`, and the `active_run` guard.
pub const STATE_ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("state_entries");

/// Append-only step records keyed by `{run_id}:{seq:04}`.
pub const STEP_LOG: TableDefinition<&str, &[u8]> = TableDefinition::new("step_log");

/// Full run records keyed by `{run_id}`.
pub const RUNS: TableDefinition<&str, &[u8]> = TableDefinition::new("runs");

/// Health snapshot append log keyed by RFC 3339 timestamp.
pub const HEALTH_LOG: TableDefinition<&str, &[u8]> = TableDefinition::new("health_log");
