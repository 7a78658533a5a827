//! Engine error taxonomy.
//!
//! Step-level failures (`StepError`) never escape the engine as errors:
//! they terminate the sequence and surface as a FAILED run record. What
//! callers see as `Err` is strictly control-plane failure: admission
//! rejection or the state store itself breaking.

use thiserror::Error;

use switchback_core::ControllerError;
use switchback_state::StateError;

/// Result type alias for engine entry points.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by `run_failover` / `run_failback` themselves.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Another run holds the admission guard. Nothing was mutated.
    #[error("a run is already in progress: {0}")]
    RunInProgress(String),

    /// The run-state store failed; the audit trail cannot be trusted.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Why an individual step failed.
#[derive(Debug, Error)]
pub enum StepError {
    /// A precondition was not met; the sequence aborts before mutating.
    #[error("precondition not met: {0}")]
    Precondition(String),

    /// A mutating provider call failed or timed out.
    #[error(transparent)]
    Execution(#[from] ControllerError),
}

/// Why a sequence stopped early.
#[derive(Debug, Error)]
pub enum RunAbort {
    #[error("step {step} failed: {source}")]
    Step {
        step: String,
        #[source]
        source: StepError,
    },

    /// Recording the audit trail failed mid-sequence.
    #[error(transparent)]
    State(#[from] StateError),
}

impl RunAbort {
    pub(crate) fn execution(step: &str, source: ControllerError) -> Self {
        Self::Step {
            step: step.to_string(),
            source: StepError::Execution(source),
        }
    }

    pub(crate) fn precondition(step: &str, reason: impl Into<String>) -> Self {
        Self::Step {
            step: step.to_string(),
            source: StepError::Precondition(reason.into()),
        }
    }
}
