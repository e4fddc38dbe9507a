//! Events: provenance records, listener handles and the external signal bus.
//!
//! ## Contents
//! - [`Event`] immutable emission record with its provenance chain
//! - [`ListenerId`] handle returned when a listener is registered
//! - [`Bus`], [`Signal`] thin wrapper over `tokio::sync::broadcast` used as an external emitter
//! - [`kind`] event types emitted by the crate itself
//!
//! ## Quick reference
//! - **Publishers**: every player via `emit`; ensembles re-emit bubbled events.
//! - **Consumers**: listeners registered with `Player::on`, cues, `LogWriter` (feature `logging`).

mod bus;
mod event;

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

pub use bus::{Bus, Signal};
pub use event::{Chain, Event};

/// Event types emitted by the crate itself.
pub mod kind {
    /// A property changed through `mutate`. Args: `[property, old, new]`.
    pub const CHANGED: &str = "changed";
    /// A cue listener failed while playing, or an ostinato could not start. Args: `[message]`.
    pub const ERROR: &str = "error";
    /// An ostinato ran out of iterations. Args: `[iterations]`.
    pub const EXHAUSTED: &str = "exhausted";
    /// An ostinato refrain panicked; the sequence stopped. Args: `[message]`.
    pub const PANICKED: &str = "panicked";
}

static LISTENER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Handle identifying one registered listener (player listener or emitter handler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates a fresh, process-unique id.
    pub fn next() -> Self {
        Self(LISTENER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}
