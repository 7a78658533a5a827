//! RunStateStore — redb-backed persistence for runs, steps, and health.
//!
//! Writes fall into two shapes: append-only history (step log, health log)
//! and latest-pointer upserts (`failover_state`, `health_status`, ...).
//! Both happen inside single write transactions, so concurrent writers
//! cannot corrupt ordering; redb serializes write transactions. The
//! admission guard is a conditional write in the same transaction that
//! reads it, which gives compare-and-swap semantics for "start run".

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Key of the run-admission guard entry.
const ACTIVE_RUN_KEY: &str = "active_run";

/// Thread-safe run-state store backed by redb.
#[derive(Clone)]
pub struct RunStateStore {
    db: Arc<Database>,
}

impl RunStateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "run-state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing and drills).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory run-state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(STATE_ENTRIES).map_err(map_err!(Table))?;
        txn.open_table(STEP_LOG).map_err(map_err!(Table))?;
        txn.open_table(RUNS).map_err(map_err!(Table))?;
        txn.open_table(HEALTH_LOG).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Step log ───────────────────────────────────────────────────

    /// Append a step record and refresh the step's latest pointer.
    ///
    /// Replaying the same record appends again; history is retained and
    /// ordering keys never collide, so replay cannot corrupt a run's
    /// audit trail.
    pub fn record_step(&self, kind: RunKind, record: &StepRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let prefix = format!("{}:", record.run_id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut log = txn.open_table(STEP_LOG).map_err(map_err!(Table))?;
            let seq = {
                let mut count = 0usize;
                for entry in log.iter().map_err(map_err!(Read))? {
                    let (key, _) = entry.map_err(map_err!(Read))?;
                    if key.value().starts_with(&prefix) {
                        count += 1;
                    }
                }
                count
            };
            let key = format!("{}:{seq:04}", record.run_id);
            log.insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;

            let mut entries = txn.open_table(STATE_ENTRIES).map_err(map_err!(Table))?;
            let pointer_key = format!("{}{}", kind.step_key_prefix(), record.step);
            entries
                .insert(pointer_key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(run_id = %record.run_id, step = %record.step, status = ?record.status, "step recorded");
        Ok(())
    }

    /// All step records for a run, in insertion order.
    pub fn steps_for_run(&self, run_id: &str) -> StateResult<Vec<StepRecord>> {
        let prefix = format!("{run_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(STEP_LOG).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let record: StepRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Latest record for a named step of the given kind, if any.
    pub fn latest_step(&self, kind: RunKind, step: &str) -> StateResult<Option<StepRecord>> {
        let key = format!("{}{step}", kind.step_key_prefix());
        self.get_entry(&key)
    }

    // ── Runs ───────────────────────────────────────────────────────

    /// Upsert a run record and the kind's latest-run pointer.
    ///
    /// Callers write once with `IN_PROGRESS` before the first step and
    /// again with the terminal status afterwards.
    pub fn record_run(&self, run: &OrchestrationRun) -> StateResult<()> {
        let run_value = serde_json::to_vec(run).map_err(map_err!(Serialize))?;
        let entry = RunStateEntry {
            state_key: run.kind.state_key().to_string(),
            run_id: run.run_id.clone(),
            timestamp: Utc::now(),
            status: run.status,
            active_region: run.resulting_active_region.clone(),
            details: serde_json::to_string(&run.steps).map_err(map_err!(Serialize))?,
        };
        let entry_value = serde_json::to_vec(&entry).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut runs = txn.open_table(RUNS).map_err(map_err!(Table))?;
            runs.insert(run.run_id.as_str(), run_value.as_slice())
                .map_err(map_err!(Write))?;

            let mut entries = txn.open_table(STATE_ENTRIES).map_err(map_err!(Table))?;
            entries
                .insert(run.kind.state_key(), entry_value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(run_id = %run.run_id, kind = %run.kind, status = ?run.status, "run recorded");
        Ok(())
    }

    /// Get a run by ID.
    pub fn get_run(&self, run_id: &str) -> StateResult<Option<OrchestrationRun>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RUNS).map_err(map_err!(Table))?;
        match table.get(run_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let run: OrchestrationRun =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(run))
            }
            None => Ok(None),
        }
    }

    /// The most recently recorded run of the given kind.
    pub fn latest_run(&self, kind: RunKind) -> StateResult<Option<OrchestrationRun>> {
        let entry: Option<RunStateEntry> = self.get_entry(kind.state_key())?;
        match entry {
            Some(entry) => self.get_run(&entry.run_id),
            None => Ok(None),
        }
    }

    // ── Health ─────────────────────────────────────────────────────

    /// Append a health snapshot and refresh the `health_status` and
    /// `last_health_check` pointers.
    pub fn record_health(&self, snapshot: &HealthSnapshot) -> StateResult<()> {
        let snapshot_json = serde_json::to_string(snapshot).map_err(map_err!(Serialize))?;
        let status_entry = HealthStatusEntry {
            state_key: "health_status".to_string(),
            timestamp: snapshot.timestamp,
            primary_endpoint_healthy: snapshot.primary_endpoint.healthy,
            dr_endpoint_healthy: snapshot.dr_endpoint.healthy,
            primary_db_healthy: snapshot.primary_db.healthy,
            dr_db_healthy: snapshot.dr_db.healthy,
            replication_lag_seconds: snapshot.replication.lag_seconds,
            overall_healthy: snapshot.overall_healthy,
            details: snapshot_json,
        };
        let status_value = serde_json::to_vec(&status_entry).map_err(map_err!(Serialize))?;
        let check_entry = LastCheckEntry {
            state_key: "last_health_check".to_string(),
            timestamp: snapshot.timestamp,
        };
        let check_value = serde_json::to_vec(&check_entry).map_err(map_err!(Serialize))?;
        let log_value = serde_json::to_vec(snapshot).map_err(map_err!(Serialize))?;
        let log_key = snapshot
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut log = txn.open_table(HEALTH_LOG).map_err(map_err!(Table))?;
            log.insert(log_key.as_str(), log_value.as_slice())
                .map_err(map_err!(Write))?;

            let mut entries = txn.open_table(STATE_ENTRIES).map_err(map_err!(Table))?;
            entries
                .insert("health_status", status_value.as_slice())
                .map_err(map_err!(Write))?;
            entries
                .insert("last_health_check", check_value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// The latest health snapshot, if any cycle has run.
    pub fn latest_health(&self) -> StateResult<Option<HealthSnapshot>> {
        let entry: Option<HealthStatusEntry> = self.get_entry("health_status")?;
        match entry {
            Some(entry) => {
                let snapshot: HealthSnapshot =
                    serde_json::from_str(&entry.details).map_err(map_err!(Deserialize))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Timestamp entry of the last completed health cycle.
    pub fn last_health_check(&self) -> StateResult<Option<LastCheckEntry>> {
        self.get_entry("last_health_check")
    }

    /// The most recent snapshots from the append log, oldest first.
    pub fn recent_health(&self, limit: usize) -> StateResult<Vec<HealthSnapshot>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(HEALTH_LOG).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let snapshot: HealthSnapshot =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(snapshot);
        }
        if results.len() > limit {
            results.drain(..results.len() - limit);
        }
        Ok(results)
    }

    // ── Run admission ──────────────────────────────────────────────

    /// Conditionally admit a new run.
    ///
    /// Fails with [`StateError::RunInProgress`] if any run (of either
    /// kind) currently holds the guard. The read and the write share one
    /// write transaction, so two concurrent triggers cannot both be
    /// admitted.
    pub fn try_admit_run(&self, run_id: &str, kind: RunKind) -> StateResult<ActiveRunGuard> {
        let guard = ActiveRunGuard {
            run_id: run_id.to_string(),
            kind,
            started_at: Utc::now(),
        };
        let value = serde_json::to_vec(&guard).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut entries = txn.open_table(STATE_ENTRIES).map_err(map_err!(Table))?;
            let existing = {
                match entries.get(ACTIVE_RUN_KEY).map_err(map_err!(Read))? {
                    Some(raw) => Some(
                        serde_json::from_slice::<ActiveRunGuard>(raw.value())
                            .map_err(map_err!(Deserialize))?,
                    ),
                    None => None,
                }
            };
            if let Some(existing) = existing {
                return Err(StateError::RunInProgress(format!(
                    "{} run {}",
                    existing.kind, existing.run_id
                )));
            }
            entries
                .insert(ACTIVE_RUN_KEY, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%run_id, kind = %kind, "run admitted");
        Ok(guard)
    }

    /// Release the admission guard held by `run_id`. Returns true if the
    /// guard was held by that run.
    pub fn release_run(&self, run_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let released;
        {
            let mut entries = txn.open_table(STATE_ENTRIES).map_err(map_err!(Table))?;
            let holder = {
                match entries.get(ACTIVE_RUN_KEY).map_err(map_err!(Read))? {
                    Some(raw) => Some(
                        serde_json::from_slice::<ActiveRunGuard>(raw.value())
                            .map_err(map_err!(Deserialize))?,
                    ),
                    None => None,
                }
            };
            released = holder.is_some_and(|g| g.run_id == run_id);
            if released {
                entries.remove(ACTIVE_RUN_KEY).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%run_id, released, "run guard release");
        Ok(released)
    }

    /// The currently admitted run, if one is in flight.
    pub fn active_run(&self) -> StateResult<Option<ActiveRunGuard>> {
        self.get_entry(ACTIVE_RUN_KEY)
    }

    // ── Internal ───────────────────────────────────────────────────

    fn get_entry<T: serde::de::DeserializeOwned>(&self, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(STATE_ENTRIES).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}
