//! Exponential backoff with full jitter for remote-service retries.

use rand::{Rng, SeedableRng, rngs::StdRng};
use std::time::Duration;

/// Retry schedule shared by the OCR and translation clients.
///
/// Delay for attempt `n` (0-based) is drawn uniformly from
/// `[0, min(cap, base * 2^n)]` (full jitter). A server-provided
/// `Retry-After` overrides the computed delay.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl BackoffPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Ceiling of the jitter window for a given attempt.
    fn window(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2_u32.saturating_pow(attempt.min(16)));
        exp.min(self.cap)
    }
}

/// Stateful jitter source. Seedable so retry tests are deterministic.
pub struct Backoff {
    policy: BackoffPolicy,
    rng: StdRng,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests.
    pub fn with_seed(policy: BackoffPolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Jittered delay before retrying the given 0-based attempt.
    ///
    /// `server_hint` is the parsed `Retry-After` value when the service
    /// sent one; it wins over the computed window but is still capped.
    pub fn delay(&mut self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        if let Some(hint) = server_hint {
            return hint.min(self.policy.cap);
        }
        let window = self.policy.window(attempt);
        if window.is_zero() {
            return Duration::ZERO;
        }
        let micros = self.rng.gen_range(0..=window.as_micros() as u64);
        Duration::from_micros(micros)
    }
}
