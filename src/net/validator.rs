//! Input plane: shape/range checks and per-socket rate limiting
//!
//! The serde layer already rejects malformed shapes (unknown events, bad
//! direction strings, wrong payload types). What remains here is numeric
//! range checking and the token bucket that caps input frequency without
//! disconnecting the offender.

use std::time::{Duration, Instant};

use crate::net::protocol::PlayerInput;

/// Sustained inputs per second
const INPUT_RATE_PER_SEC: f64 = 60.0;
/// Extra instantaneous burst on top of the sustained rate
const INPUT_BURST: f64 = 10.0;

/// Violations surfaced as `invalid_input` to the client
#[derive(Debug, Clone, thiserror::Error)]
pub enum InputViolation {
    #[error("Input rate exceeded")]
    RateExceeded,
    #[error("Timestamp is not a finite number")]
    NonFiniteTimestamp,
    #[error("Timestamp is negative")]
    NegativeTimestamp,
}

/// Token bucket: refills continuously, spends one token per input
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(refill_per_sec: f64, burst: f64) -> Self {
        let capacity = refill_per_sec + burst;
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    /// Take one token, refilling for the time elapsed since the last call
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.last_refill = now;
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-connection input validator
#[derive(Debug)]
pub struct InputValidator {
    bucket: TokenBucket,
}

impl InputValidator {
    pub fn new() -> Self {
        Self {
            bucket: TokenBucket::new(INPUT_RATE_PER_SEC, INPUT_BURST),
        }
    }

    /// Check one `player_input`: range checks first, then the rate limit
    pub fn validate(&mut self, input: &PlayerInput) -> Result<(), InputViolation> {
        if !input.timestamp.is_finite() {
            return Err(InputViolation::NonFiniteTimestamp);
        }
        if input.timestamp < 0.0 {
            return Err(InputViolation::NegativeTimestamp);
        }
        if !self.bucket.try_acquire() {
            return Err(InputViolation::RateExceeded);
        }
        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}
