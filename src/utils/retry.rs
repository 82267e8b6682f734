//! Bounded polling shared by every probe.
//!
//! Two shapes exist: [`PollPolicy`] is deadline-bounded (`ceil(timeout / interval)` attempts
//! at most, never past the deadline) and [`AttemptBudget`] is attempt-bounded with no
//! wall-clock check, which is what value-change detection uses.

use crate::error::VerifyError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn max_attempts(&self) -> u64 {
        let interval_ms = self.interval.as_millis().max(1);
        let attempts = self.timeout.as_millis().div_ceil(interval_ms);
        u64::try_from(attempts).unwrap_or(u64::MAX).max(1)
    }
}

#[derive(Debug)]
pub enum Attempt<T> {
    Ready(T),
    /// Not there yet; the string is kept as the last observation for diagnostics.
    Pending(String),
    /// Terminal; stops polling immediately.
    Abort(VerifyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollExhausted {
    pub attempts: u64,
    pub waited: Duration,
    pub last_observation: String,
}

#[derive(Debug)]
pub enum PollFailure {
    Exhausted(PollExhausted),
    Aborted(VerifyError),
}

impl PollFailure {
    pub fn into_error<F>(self, on_timeout: F) -> VerifyError
    where
        F: FnOnce(PollExhausted) -> VerifyError,
    {
        match self {
            Self::Exhausted(exhausted) => on_timeout(exhausted),
            Self::Aborted(err) => err,
        }
    }
}

/// Attempts are cut at the time left and the sleep between them is clamped to it.
pub async fn poll_until<T, F, Fut>(
    policy: PollPolicy,
    mut attempt: F,
) -> std::result::Result<T, PollFailure>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let max_attempts = policy.max_attempts();
    let mut last_observation = String::from("no attempt completed");
    let mut attempts = 0u64;

    let exhausted = |attempts: u64, last_observation: String| {
        Err(PollFailure::Exhausted(PollExhausted {
            attempts,
            waited: started.elapsed(),
            last_observation,
        }))
    };

    loop {
        attempts += 1;
        // A zero timeout still gets its single attempt.
        let budget = deadline
            .saturating_duration_since(Instant::now())
            .max(Duration::from_millis(1));
        match timeout(budget, attempt(attempts)).await {
            Ok(Attempt::Ready(value)) => return Ok(value),
            Ok(Attempt::Abort(err)) => return Err(PollFailure::Aborted(err)),
            Ok(Attempt::Pending(observation)) => last_observation = observation,
            Err(_) => {
                last_observation = format!("attempt {attempts} still running at deadline");
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if attempts >= max_attempts || remaining.is_zero() {
            return exhausted(attempts, last_observation);
        }
        sleep(policy.interval.min(remaining)).await;
        if Instant::now() >= deadline {
            return exhausted(attempts, last_observation);
        }
    }
}

/// `timeout` is only reported; the attempt count is what bounds the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptBudget {
    pub attempts: u64,
    pub interval: Duration,
    pub timeout: Duration,
}

impl AttemptBudget {
    pub fn from_timeout(timeout: Duration, interval: Duration) -> Self {
        let interval_ms = interval.as_millis().max(1);
        let attempts = u64::try_from(timeout.as_millis() / interval_ms).unwrap_or(u64::MAX);
        Self {
            attempts,
            interval,
            timeout,
        }
    }
}
