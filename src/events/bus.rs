//! # Broadcast bus for external signals.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] carrying named
//! [`Signal`]s. It is the in-process stand-in for an external event emitter:
//! a [`Cue`](crate::Cue) can listen to one signal name on it via
//! [`Source::Broadcast`](crate::Source::Broadcast).
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent signals for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: signals are lost if there are no active receivers at send time.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::value::Value;

/// A named signal with positional arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    /// Signal name a cue filters on.
    pub name: Arc<str>,
    /// Positional arguments handed to the cue listener.
    pub args: Vec<Value>,
}

impl Signal {
    pub fn new(name: impl Into<Arc<str>>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Broadcast channel of [`Signal`]s.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately (send clones internally).
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Signal>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// The minimum capacity is 1 (clamped).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Signal>(capacity);
        Self { tx }
    }

    /// Publishes a signal to all active receivers.
    ///
    /// Returns the number of receivers that will observe it (0 if nobody listens).
    pub fn publish(&self, signal: Signal) -> usize {
        self.tx.send(signal).unwrap_or(0)
    }

    /// Shorthand for `publish(Signal::new(name, args))`.
    pub fn send(&self, name: impl Into<Arc<str>>, args: Vec<Value>) -> usize {
        self.publish(Signal::new(name, args))
    }

    /// Creates a new receiver that will observe subsequent signals.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Returns the underlying sender.
    pub fn sender(&self) -> &broadcast::Sender<Signal> {
        &self.tx
    }
}

impl From<&Config> for Bus {
    fn from(cfg: &Config) -> Self {
        Self::new(cfg.bus_capacity)
    }
}

impl From<broadcast::Sender<Signal>> for Bus {
    fn from(tx: broadcast::Sender<Signal>) -> Self {
        Self { tx }
    }
}
