//! Token-bucket rate limiter shared across requests to one external service.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Classic token bucket: up to `burst` requests immediately, refilling at
/// `rps` tokens per second. Thread-safe; waiting happens outside the lock
/// so producers never block each other on the timer.
pub struct TokenBucket {
    rps: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// `rps` must be positive; `burst` is clamped to at least 1.
    pub fn new(rps: f64, burst: u32) -> Self {
        Self {
            rps: rps.max(f64::MIN_POSITIVE),
            burst: f64::from(burst.max(1)),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst.max(1)),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, sleeping until one is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rps).min(self.burst);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64((1.0 - state.tokens) / self.rps))
                }
            };

            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }

    /// Non-blocking acquire; used by tests and opportunistic callers.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rps).min(self.burst);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
