//! # Crate-wide defaults.
//!
//! [`Config`] collects the defaults that cues, ostinatos and buses fall back to
//! when built with their `with_defaults` / `From<&Config>` constructors:
//! promise timeout, iteration limit, tempo and bus capacity.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use concertino::{Config, Tempo};
//!
//! let mut cfg = Config::default();
//! cfg.cue_timeout = Duration::from_secs(5);
//! cfg.times = 3;
//! cfg.tempo = Tempo::growing(Duration::from_millis(50), 2.0, Duration::from_secs(2));
//!
//! assert_eq!(cfg.iteration_limit(), Some(3));
//! assert_eq!(cfg.cue_timeout_opt(), Some(Duration::from_secs(5)));
//! ```

use std::time::Duration;

use crate::ostinato::Tempo;

/// Defaults shared by every player built from a config.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default promise timeout for cues (0 = wait indefinitely).
    pub cue_timeout: Duration,
    /// Default number of ostinato iterations per run (0 = until paused).
    pub times: u32,
    /// Default delay sequence between ostinato iterations.
    pub tempo: Tempo,
    /// Capacity of a [`Bus`](crate::Bus) built from this config.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the cue timeout as an `Option`.
    ///
    /// - `None` if `cue_timeout == 0`
    /// - `Some(cue_timeout)` otherwise
    #[inline]
    pub fn cue_timeout_opt(&self) -> Option<Duration> {
        if self.cue_timeout == Duration::ZERO {
            None
        } else {
            Some(self.cue_timeout)
        }
    }

    /// Returns the ostinato iteration limit as an `Option`.
    ///
    /// - `None` if `times == 0` (unbounded)
    /// - `Some(times)` otherwise
    #[inline]
    pub fn iteration_limit(&self) -> Option<u32> {
        if self.times == 0 {
            None
        } else {
            Some(self.times)
        }
    }
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `cue_timeout = 0s` (wait indefinitely)
    /// - `times = 0` (until paused)
    /// - `tempo = Tempo::default()` (every 100ms)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            cue_timeout: Duration::from_secs(0),
            times: 0,
            tempo: Tempo::default(),
            bus_capacity: 1024,
        }
    }
}
