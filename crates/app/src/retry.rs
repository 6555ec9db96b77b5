//! Bounded retry for optimistic version conflicts.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// How many times a read-version-then-conditional-write cycle may be attempted,
/// and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            min_delay_ms: 5,
            max_delay_ms: 200,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay())
            .with_max_delay(self.max_delay())
            .with_max_times(usize::try_from(self.max_attempts).unwrap_or(usize::MAX))
            .with_jitter()
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("gave up after {attempts} conflicting attempts")]
pub struct RetriesExhausted {
    pub attempts: u32,
}

/// Tracks attempts of one optimistic update.
///
/// Call [`ConflictRetry::conflicted`] each time the conditional write affects no
/// rows. It sleeps for the next backoff delay, or fails once the policy's
/// attempt budget is spent.
#[derive(Debug)]
pub struct ConflictRetry {
    policy: RetryPolicy,
    attempt: u32,
    delays: ExponentialBackoff,
}

impl ConflictRetry {
    #[must_use]
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            policy: *policy,
            attempt: 1,
            delays: policy.backoff(),
        }
    }

    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a version conflict on the current attempt.
    ///
    /// # Errors
    ///
    /// Returns [`RetriesExhausted`] when no attempts remain.
    pub async fn conflicted(&mut self) -> Result<(), RetriesExhausted> {
        if self.attempt >= self.policy.max_attempts {
            return Err(RetriesExhausted {
                attempts: self.attempt,
            });
        }

        let delay = self.delays.next().unwrap_or_else(|| self.policy.max_delay());

        debug!(
            attempt = self.attempt,
            delay_ms = delay.as_millis(),
            "version conflict, retrying"
        );

        tokio::time::sleep(delay).await;
        self.attempt += 1;

        Ok(())
    }
}
