//! Bounded retry combinator for collaborator calls.
//!
//! Attempts are numbered from 1. Each attempt carries the fee to bid for that
//! attempt (`base_fee * 2^(n-1)`); the delay before attempt `n + 1` is
//! `base_delay * 2^(n-1)`. Both saturate instead of overflowing.

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Cap on the doubling exponent so schedules stay bounded.
const MAX_DOUBLINGS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. `0` is treated as `1`.
    pub max_attempts: u32,
    /// Fee (stroops) bid on the first attempt.
    pub base_fee: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_fee: 100,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Context handed to each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub number: u32,
    pub fee: u32,
}

/// All attempts failed. Carries the last error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gave up after {} attempt(s): {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryExhausted<E> {}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn fee_for_attempt(&self, attempt: u32) -> u32 {
        let shift = attempt.saturating_sub(1).min(MAX_DOUBLINGS);
        self.base_fee.saturating_mul(1u32 << shift)
    }

    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_DOUBLINGS);
        self.base_delay.saturating_mul(1u32 << shift)
    }

    /// Run `op` until it succeeds or attempts are exhausted; every error is
    /// considered retryable.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(op, |_| true).await
    }

    /// Run `op` until it succeeds, attempts are exhausted, or `retryable`
    /// returns `false` for an error (which is then returned immediately).
    pub async fn run_if<T, E, F, Fut, R>(
        &self,
        mut op: F,
        retryable: R,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let max = self.attempts();
        let mut number = 1;
        loop {
            let attempt = Attempt {
                number,
                fee: self.fee_for_attempt(number),
            };
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if number >= max || !retryable(&e) => {
                    return Err(RetryExhausted {
                        attempts: number,
                        last_error: e,
                    });
                }
                Err(_) => {
                    tokio::time::sleep(self.delay_after_attempt(number)).await;
                    number += 1;
                }
            }
        }
    }
}
