//! Bounded retries with linear backoff for remote-facing stages.
//!
//! [`retry`] is a pure control-flow wrapper: it holds no state between calls.
//! Attempts and waits are reported through the `log` facade.

use crate::core::cancel::CancellationToken;
use crate::core::error::{Result, SyncError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            backoff_unit: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Wait before retrying after the given failed attempt (1-indexed)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }
}

/// Run `op` under `policy`, sleeping on the cancellation token between attempts.
pub fn retry<T, F>(
    operation: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    retry_with_sleep(operation, policy, cancel, op, |wait| {
        cancel.wait_timeout(wait);
    })
}

/// Same as [`retry`] with an injectable sleep, so waits can be observed.
pub fn retry_with_sleep<T, F, S>(
    operation: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
    mut sleep: S,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
    S: FnMut(Duration),
{
    if !policy.enabled {
        log::debug!("{operation}: retries disabled, executing once");
        return op().map_err(|e| SyncError::operation(operation, e));
    }

    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            if let Err(cancelled) = cancel.check() {
                log::debug!("{operation}: cancelled, stopping retry attempts");
                return Err(SyncError::operation(operation, cancelled));
            }
        }

        log::debug!("{operation}: attempt {attempt}/{max_attempts}");
        match op() {
            Ok(value) => {
                log::debug!("{operation}: succeeded on attempt {attempt}");
                return Ok(value);
            }
            Err(e) if e.is_cancelled() => {
                return Err(SyncError::operation(operation, e));
            }
            Err(e) => {
                log::error!("{operation}: attempt {attempt}/{max_attempts} failed: {e}");
                if attempt < max_attempts {
                    let wait = policy.backoff_for(attempt);
                    log::info!("{operation}: waiting {wait:?} before next attempt");
                    sleep(wait);
                }
                last_error = Some(e);
            }
        }
    }

    let error = last_error.unwrap_or(SyncError::Cancelled);
    log::error!("{operation}: giving up after {max_attempts} attempts");
    Err(SyncError::operation(operation, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            enabled: true,
            max_attempts,
            backoff_unit: Duration::from_secs(2),
        }
    }

    fn failure() -> SyncError {
        SyncError::invalid_config("boom")
    }

    #[test]
    fn test_succeeds_first_try_without_sleeping() {
        let cancel = CancellationToken::new();
        let mut sleeps = Vec::new();
        let calls = Cell::new(0);

        let result = retry_with_sleep(
            "op",
            &policy(3),
            &cancel,
            || {
                calls.set(calls.get() + 1);
                Ok("done")
            },
            |d| sleeps.push(d),
        );

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 1);
        assert!(sleeps.is_empty());
    }

    #[test]
    fn test_always_failing_sleeps_linearly_between_attempts() {
        let cancel = CancellationToken::new();
        let mut sleeps = Vec::new();
        let calls = Cell::new(0);

        let result: Result<()> = retry_with_sleep(
            "fetch dashboards",
            &policy(4),
            &cancel,
            || {
                calls.set(calls.get() + 1);
                Err(failure())
            },
            |d| sleeps.push(d),
        );

        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("fetch dashboards failed:"));
        assert_eq!(calls.get(), 4);
        assert_eq!(
            sleeps,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(6)
            ]
        );
    }

    #[test]
    fn test_recovers_after_transient_failures() {
        let cancel = CancellationToken::new();
        let calls = Cell::new(0);

        let result = retry_with_sleep(
            "op",
            &policy(3),
            &cancel,
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(failure())
                } else {
                    Ok(calls.get())
                }
            },
            |_| {},
        );

        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_disabled_runs_exactly_once_and_wraps() {
        let cancel = CancellationToken::new();
        let calls = Cell::new(0);
        let disabled = RetryPolicy {
            enabled: false,
            ..policy(5)
        };

        let result: Result<()> = retry_with_sleep(
            "commit and push",
            &disabled,
            &cancel,
            || {
                calls.set(calls.get() + 1);
                Err(failure())
            },
            |_| panic!("must not sleep"),
        );

        assert_eq!(calls.get(), 1);
        assert!(result
            .unwrap_err()
            .to_string()
            .starts_with("commit and push failed:"));
    }

    #[test]
    fn test_cancellation_before_next_attempt() {
        let cancel = CancellationToken::new();
        let calls = Cell::new(0);

        let result: Result<()> = retry_with_sleep(
            "op",
            &policy(5),
            &cancel,
            || {
                calls.set(calls.get() + 1);
                Err(failure())
            },
            |_| cancel.cancel(),
        );

        assert_eq!(calls.get(), 1);
        assert!(result.unwrap_err().is_cancelled());
    }

    #[test]
    fn test_cancelled_operation_is_not_retried() {
        let cancel = CancellationToken::new();
        let calls = Cell::new(0);

        let result: Result<()> = retry_with_sleep(
            "op",
            &policy(5),
            &cancel,
            || {
                calls.set(calls.get() + 1);
                Err(SyncError::Cancelled)
            },
            |_| panic!("must not sleep"),
        );

        assert_eq!(calls.get(), 1);
        assert!(result.unwrap_err().is_cancelled());
    }
}
