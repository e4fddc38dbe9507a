//! Error types raised by ensembles and cues.
//!
//! This module defines two main error enums:
//!
//! - [`EnsembleError`] - membership errors raised while mutating an [`Ensemble`](crate::Ensemble).
//! - [`CueError`] - construction and wait errors raised by a [`Cue`](crate::Cue).
//!
//! Both types provide `as_label` for logs/metrics. User listeners report their own
//! failures through [`BoxError`].

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by user-supplied cue listeners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by ensemble membership operations.
///
/// All variants are recoverable by the caller (pick another name, remove first, ...).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnsembleError {
    /// The name is already taken inside this ensemble.
    #[error("a player named {name:?} is already in the ensemble")]
    DuplicateName {
        /// The conflicting name.
        name: Arc<str>,
    },

    /// The player already belongs to an ensemble (possibly under another name).
    #[error("player is already a member of an ensemble as {current:?}")]
    AlreadyMember {
        /// The name the player currently holds in its ensemble.
        current: Arc<str>,
    },

    /// Adding the player would make an ensemble contain itself.
    #[error("adding {name:?} would make the ensemble contain itself")]
    Cycle {
        /// The name the player was to be added under.
        name: Arc<str>,
    },

    /// An entry exists under the name but it is not an ensemble.
    #[error("player {name:?} is not an ensemble")]
    NotAnEnsemble {
        /// The name of the offending entry.
        name: Arc<str>,
    },
}

impl EnsembleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use concertino::EnsembleError;
    ///
    /// let err = EnsembleError::DuplicateName { name: "drums".into() };
    /// assert_eq!(err.as_label(), "ensemble_duplicate_name");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EnsembleError::DuplicateName { .. } => "ensemble_duplicate_name",
            EnsembleError::AlreadyMember { .. } => "ensemble_already_member",
            EnsembleError::Cycle { .. } => "ensemble_cycle",
            EnsembleError::NotAnEnsemble { .. } => "ensemble_not_an_ensemble",
        }
    }
}

/// # Errors produced by cues.
///
/// Construction errors (`InvalidEvent`, `UnsupportedEmitter`) are fatal for the cue.
/// The remaining variants are the rejection reasons of [`Cue::promise`](crate::Cue::promise);
/// in every case the pending handler is detached before the error is returned.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CueError {
    /// Event name was empty.
    #[error("cue event name must be a non-empty string")]
    InvalidEvent,

    /// No attach/detach capability could be found for the event on this emitter.
    #[error("emitter cannot carry event {event:?}: {reason}")]
    UnsupportedEmitter {
        /// The configured event name.
        event: Arc<str>,
        /// Why the emitter was rejected.
        reason: &'static str,
    },

    /// No qualifying signal arrived before the deadline.
    #[error("timed out after {timeout:?} waiting for event {event:?}")]
    Timeout {
        /// The configured event name.
        event: Arc<str>,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The cue listener failed while transforming a signal.
    #[error("listener for event {event:?} failed: {source}")]
    Listener {
        /// The configured event name.
        event: Arc<str>,
        /// The listener's error.
        #[source]
        source: BoxError,
    },

    /// The emitter dropped the pending handler before it settled.
    #[error("emitter closed while waiting for event {event:?}")]
    Closed {
        /// The configured event name.
        event: Arc<str>,
    },
}

impl CueError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use concertino::CueError;
    /// use std::time::Duration;
    ///
    /// let err = CueError::Timeout { event: "ready".into(), timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "cue_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CueError::InvalidEvent => "cue_invalid_event",
            CueError::UnsupportedEmitter { .. } => "cue_unsupported_emitter",
            CueError::Timeout { .. } => "cue_timeout",
            CueError::Listener { .. } => "cue_listener_failed",
            CueError::Closed { .. } => "cue_closed",
        }
    }

    /// Returns the event name the error refers to, if any.
    pub fn event(&self) -> Option<&str> {
        match self {
            CueError::InvalidEvent => None,
            CueError::UnsupportedEmitter { event, .. }
            | CueError::Timeout { event, .. }
            | CueError::Listener { event, .. }
            | CueError::Closed { event } => Some(event),
        }
    }

    /// Indicates whether waiting again could succeed.
    ///
    /// Returns `true` for [`CueError::Timeout`] and [`CueError::Listener`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, CueError::Timeout { .. } | CueError::Listener { .. })
    }
}
