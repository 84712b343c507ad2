//! Failure policies for the poll loop.
//!
//! When a fetch fails the loop asks its policy whether to wait and retry or
//! to stop for good. Reducer faults never reach the policy; they always stop
//! the loop.

use roomsync_types::SyncResponse;
use std::error::Error;
use std::time::Duration;

/// Delay used by [`FixedDelay::default`].
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// What to do after a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retry {
    /// Sleep for this long, then fetch again.
    After(Duration),
    /// Stop syncing permanently.
    Stop {
        /// Why the policy gave up.
        reason: String,
    },
}

/// Decides between retry-with-delay and permanent stop.
pub trait FailurePolicy: Send {
    /// Called after each failed fetch.
    ///
    /// `last_response` is the response produced by the failing fetch, if the
    /// transport surfaced one.
    fn on_failed_sync(
        &mut self,
        last_response: Option<&SyncResponse>,
        error: &(dyn Error + 'static),
    ) -> Retry;

    /// Called after each successfully reduced response.
    fn on_sync_succeeded(&mut self) {}
}

/// Always retry after the same delay. Never gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    /// Retry after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// The configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY)
    }
}

impl FailurePolicy for FixedDelay {
    fn on_failed_sync(&mut self, _: Option<&SyncResponse>, _: &(dyn Error + 'static)) -> Retry {
        Retry::After(self.delay)
    }
}

/// Exponential backoff capped at `max`, optionally giving up after a number
/// of consecutive failures.
///
/// Delay for the nth consecutive failure: `min(max, base * 2^(n-1))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    max_attempts: Option<u32>,
    failures: u32,
}

impl ExponentialBackoff {
    /// Backoff starting at `base`, never exceeding `max`, retrying forever.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            max_attempts: None,
            failures: 0,
        }
    }

    /// Give up after `attempts` consecutive failures.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Consecutive failures seen since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }
}

impl FailurePolicy for ExponentialBackoff {
    fn on_failed_sync(&mut self, _: Option<&SyncResponse>, error: &(dyn Error + 'static)) -> Retry {
        self.failures = self.failures.saturating_add(1);
        match self.max_attempts {
            Some(limit) if self.failures >= limit => Retry::Stop {
                reason: format!("giving up after {} failed syncs: {}", self.failures, error),
            },
            _ => Retry::After(self.delay_for(self.failures)),
        }
    }

    fn on_sync_succeeded(&mut self) {
        self.failures = 0;
    }
}
