//! Condition polling for eventually-consistent cluster state
//!
//! The check is re-run at a fixed cadence. A wait is satisfied only by the check
//! invocation that ends it; an earlier true observation followed by a false one
//! does not count. Errors from the check propagate immediately, so checks should
//! translate expected transient states (not found yet, still terminating) into
//! [`Probe::Pending`] themselves.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What one invocation of a check observed
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    /// Condition holds
    Ready(T),
    /// Condition does not hold yet; the string describes what was observed
    Pending(String),
}

impl<T> Probe<T> {
    pub fn pending(observed: impl Into<String>) -> Self {
        Probe::Pending(observed.into())
    }
}

/// A satisfied wait
#[derive(Debug, Clone)]
pub struct Satisfied<T> {
    pub value: T,
    pub polls: u32,
    pub elapsed: Duration,
}

/// Terminal state of a wait
#[derive(Debug, Clone)]
pub enum WaitOutcome<T> {
    Satisfied(Satisfied<T>),
    TimedOut {
        condition: String,
        last_observed: String,
        polls: u32,
        elapsed: Duration,
    },
}

impl<T> WaitOutcome<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied(_))
    }

    /// Turn an expired wait into [`HarnessError::ConditionTimeout`]
    pub fn into_result(self) -> HarnessResult<Satisfied<T>> {
        match self {
            WaitOutcome::Satisfied(satisfied) => Ok(satisfied),
            WaitOutcome::TimedOut {
                condition,
                last_observed,
                polls,
                elapsed,
            } => Err(HarnessError::ConditionTimeout {
                condition,
                last_observed,
                polls,
                elapsed,
            }),
        }
    }
}

/// Poll `check` every `interval` until it reports ready or `timeout` passes.
///
/// The first check runs immediately. The final sleep is clipped to the deadline so
/// the condition always gets one last look at expiry.
pub async fn wait_until<T, F, Fut>(
    condition: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> HarnessResult<WaitOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<Probe<T>>>,
{
    let interval = interval.max(MIN_INTERVAL);
    let start = Instant::now();
    let mut polls = 0u32;

    loop {
        polls += 1;
        let observed = match check().await? {
            Probe::Ready(value) => {
                let elapsed = start.elapsed();
                debug!("Condition met after {} poll(s), {:?}: {}", polls, elapsed, condition);
                return Ok(WaitOutcome::Satisfied(Satisfied { value, polls, elapsed }));
            }
            Probe::Pending(observed) => observed,
        };

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(WaitOutcome::TimedOut {
                condition: condition.to_string(),
                last_observed: observed,
                polls,
                elapsed,
            });
        }

        debug!("Waiting for {} (poll {}): {}", condition, polls, observed);
        tokio::time::sleep(interval.min(timeout - elapsed)).await;
    }
}

/// [`wait_until`] with an expired wait reported as an error
pub async fn wait_for<T, F, Fut>(
    condition: &str,
    timeout: Duration,
    interval: Duration,
    check: F,
) -> HarnessResult<Satisfied<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<Probe<T>>>,
{
    wait_until(condition, timeout, interval, check).await?.into_result()
}
