//! Token bucket with bounded waiting.

use std::time::Duration;

use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

#[derive(Debug)]
struct BucketState {
    /// May go negative: tokens already promised to waiting callers.
    tokens: f64,
    last_refill: Instant,
}

/// Global admission bucket.
///
/// Callers reserve a token up front and then sleep until the reservation
/// matures. A reservation that would mature later than the caller's deadline is
/// refused without consuming anything.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket refilling at `rate` tokens per second.
    #[must_use]
    pub fn new(rate: f64, capacity: u32) -> Self {
        let capacity = f64::from(capacity);

        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take `count` tokens, waiting at most `max_wait` for them.
    ///
    /// Returns `false` when the tokens would not be available in time.
    pub async fn take_max_duration(&self, count: u32, max_wait: Duration) -> bool {
        let Some(wait) = self.reserve(f64::from(count), max_wait).await else {
            return false;
        };

        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis(), "waiting for admission token");
            tokio::time::sleep(wait).await;
        }

        true
    }

    /// Tokens currently available, net of outstanding reservations.
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());

        state.tokens
    }

    async fn reserve(&self, count: f64, max_wait: Duration) -> Option<Duration> {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());

        let remaining = state.tokens - count;

        let wait = if remaining >= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(-remaining / self.rate).ok()?
        };

        if wait > max_wait {
            return None;
        }

        state.tokens = remaining;

        Some(wait)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();

        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = now;
    }
}
