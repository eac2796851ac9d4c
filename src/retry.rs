// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded-retry convergence polling.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Classification of a failed convergence attempt.
///
/// `Retry` keeps the loop polling until the deadline. `Fatal` stops it
/// immediately for failures that can never resolve. The blanket `From` impl
/// means a plain `?` inside a predicate marks the failure retryable.
#[derive(Debug)]
pub enum Attempt<E> {
    Retry(E),
    Fatal(E),
}

impl<E> From<E> for Attempt<E> {
    fn from(err: E) -> Self {
        Attempt::Retry(err)
    }
}

/// Wait strategy between convergence attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// Sleep the same interval after every failed attempt.
    Fixed(Duration),
    /// Double the interval after every failed attempt, up to a cap.
    Exponential { start: Duration, cap: Duration },
}

impl Backoff {
    /// Delay to sleep after the given failed attempt (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(interval) => interval,
            Backoff::Exponential { start, cap } => start
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(cap),
        }
    }
}

/// Deadline and wait strategy for one `run_until` invocation.
///
/// The timeout bounds wall-clock time measured from the first attempt, not
/// the attempt count; a slow call inside one attempt eats into the budget.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, backoff: Backoff) -> Self {
        Self { timeout, backoff }
    }

    /// Fixed-interval policy, the shape every reconciliation check uses.
    pub fn fixed(timeout: Duration, interval: Duration) -> Self {
        debug_assert!(!interval.is_zero());
        Self::new(timeout, Backoff::Fixed(interval))
    }
}

/// Terminal failure of a `run_until` invocation.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The deadline elapsed; carries the failure from the final attempt only.
    #[error("timed out after {elapsed:?}: {last}")]
    Timeout { elapsed: Duration, last: E },
    /// The predicate reported a failure that can never resolve.
    #[error("{0}")]
    Fatal(E),
}

/// Repeatedly invoke `op` until it succeeds, fails fatally, or the policy's
/// deadline elapses.
///
/// Attempts are strictly sequential. The elapsed check runs after the sleep
/// that follows a failed attempt; that ordering gives the loop one interval
/// of slack past the deadline and is load-bearing for callers' timing
/// expectations. `op` must be safe to invoke more than once.
pub async fn run_until<F, Fut, E>(
    policy: &RetryPolicy,
    mut op: F,
) -> std::result::Result<(), RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<(), Attempt<E>>>,
    E: Display,
{
    let started = Instant::now();
    let mut failed_attempts = 0u32;

    loop {
        match op().await {
            Ok(()) => return Ok(()),
            Err(Attempt::Fatal(err)) => return Err(RetryError::Fatal(err)),
            Err(Attempt::Retry(err)) => {
                sleep(policy.backoff.delay(failed_attempts)).await;
                failed_attempts += 1;

                let elapsed = started.elapsed();
                if elapsed >= policy.timeout {
                    return Err(RetryError::Timeout { elapsed, last: err });
                }

                debug!(
                    attempt = failed_attempts,
                    ?elapsed,
                    "Attempt failed, retrying: {err}"
                );
            }
        }
    }
}
