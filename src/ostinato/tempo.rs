//! # Delay sequence between ostinato iterations.
//!
//! [`Tempo`] controls how the wait between two refrain invocations grows.
//! It is parameterized by:
//! - [`Tempo::factor`] the multiplicative growth factor;
//! - [`Tempo::first`] the initial delay;
//! - [`Tempo::max`] the delay ceiling.
//!
//! The delay after iteration `n` (0-indexed) is `first × factor^n`, clamped to `max`.
//! Because each delay is derived from the iteration number alone, the sequence is
//! **non-decreasing**: factors below 1.0 (or non-finite ones) are treated as 1.0.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use concertino::Tempo;
//!
//! let tempo = Tempo {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//! };
//!
//! // Iteration 0 uses 'first' (100ms), clamped to max
//! assert_eq!(tempo.delay(0), Duration::from_millis(100));
//!
//! // Iteration 1: first × factor^1 = 200ms
//! assert_eq!(tempo.delay(1), Duration::from_millis(200));
//!
//! // Iteration 10: 100ms × 2^10 = 102_400ms → capped at max=10s
//! assert_eq!(tempo.delay(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

/// Growth policy for the delay between refrain invocations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tempo {
    /// Delay after the first invocation.
    pub first: Duration,
    /// Delay ceiling.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = fixed interval).
    pub factor: f64,
}

impl Default for Tempo {
    /// Returns a tempo with:
    /// - `factor = 1.0` (fixed interval);
    /// - `first = 100ms`;
    /// - `max = 30s`.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 1.0,
        }
    }
}

impl Tempo {
    /// A fixed-interval tempo.
    pub fn fixed(every: Duration) -> Self {
        Self {
            first: every,
            max: every,
            factor: 1.0,
        }
    }

    /// A growing tempo, for polling that should slow down over time.
    pub fn growing(first: Duration, factor: f64, max: Duration) -> Self {
        Self { first, max, factor }
    }

    /// Computes the delay following iteration `iteration` (0-indexed).
    ///
    /// # Notes
    /// - If `factor` is 1.0 or less, the delay stays at `first` (up to `max`).
    /// - If `factor` is greater than 1.0, delays grow exponentially up to `max`.
    pub fn delay(&self, iteration: u32) -> Duration {
        let factor = if self.factor.is_finite() && self.factor > 1.0 {
            self.factor
        } else {
            1.0
        };
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = iteration.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * factor.powi(clamped_exp);

        if !unclamped_secs.is_finite() || unclamped_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped_secs)
        }
    }
}
