//! Bounded retry-with-interval primitive.
//!
//! Provider "waiters" (service stabilization, database promotion) are
//! modeled as polls with an explicit attempt/interval budget. Exceeding the
//! budget is a typed timeout, never an infinite hang.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::controller::{ControllerError, ControllerResult};

/// Poll `check` up to `attempts` times, `interval` apart, until it reports
/// the condition met.
///
/// Errors from `check` propagate immediately; exhausting the budget yields
/// [`ControllerError::WaitTimeout`].
pub async fn wait_until<F, Fut>(
    what: &str,
    attempts: u32,
    interval: Duration,
    mut check: F,
) -> ControllerResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControllerResult<bool>>,
{
    for attempt in 1..=attempts {
        if check().await? {
            debug!(what, attempt, "wait condition met");
            return Ok(());
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(ControllerError::WaitTimeout {
        what: what.to_string(),
        attempts,
        interval_secs: interval.as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_on_first_attempt() {
        let result = wait_until("ready", 3, Duration::from_millis(1), || async { Ok(true) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn passes_after_retries() {
        let mut remaining = 3u32;
        let result = wait_until("ready", 5, Duration::from_millis(1), || {
            remaining = remaining.saturating_sub(1);
            let ready = remaining == 0;
            async move { Ok(ready) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn times_out_after_budget() {
        let mut calls = 0u32;
        let result = wait_until("stuck", 4, Duration::from_millis(1), || {
            calls += 1;
            async { Ok(false) }
        })
        .await;
        assert_eq!(calls, 4);
        match result {
            Err(ControllerError::WaitTimeout { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected WaitTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn propagates_check_errors() {
        let result = wait_until("broken", 3, Duration::from_millis(1), || async {
            Err(ControllerError::Provider("boom".to_string()))
        })
        .await;
        assert!(matches!(result, Err(ControllerError::Provider(_))));
    }
}
