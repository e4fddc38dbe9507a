//! # Players: lifecycle units that emit events.
//!
//! This module provides the player abstraction:
//! - [`Player`] - trait implemented by every lifecycle unit
//! - [`PlayerCore`] - the state every player owns (playing flag, membership, listeners)
//! - [`Part`] - a plain player with no behavior of its own
//!
//! A player is paused when created and unattached (no name, no ensemble). Only an
//! [`Ensemble`] assigns its name and back-reference.
//!
//! ```text
//!          play()                 pause()
//! paused ─────────► playing ─────────────► paused ...
//!   ▲ └─ pause(): no-op   └─ play(): no-op   │
//!   └────────────────────────────────────────┘
//! ```

mod core;

use std::any::Any;
use std::sync::Arc;

pub use self::core::{EnsembleLink, Listener, PlayerCore, PlayerId};

use crate::ensemble::Ensemble;
use crate::events::{Event, ListenerId};
use crate::value::Value;

/// Upcast of a shared player to `Any`, used to recover concrete types from `Arc<dyn Player>`.
pub trait AsAny: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// # Lifecycle unit with an emission channel.
///
/// Implementors provide [`core`](Player::core); everything else has a default that
/// delegates to it. Types with real activation work override [`play`](Player::play) /
/// [`pause`](Player::pause) and call through to [`PlayerCore::set_playing`].
///
/// # Example
/// ```
/// use concertino::{Player, PlayerCore};
///
/// struct Metronome {
///     core: PlayerCore,
/// }
///
/// impl Player for Metronome {
///     fn core(&self) -> &PlayerCore {
///         &self.core
///     }
///
///     fn play(&self) {
///         // start clicking...
///         self.core.set_playing(true);
///     }
/// }
///
/// let m = Metronome { core: PlayerCore::new() };
/// m.play();
/// assert!(m.is_playing());
/// ```
pub trait Player: AsAny {
    /// Returns the shared player state.
    fn core(&self) -> &PlayerCore;

    /// Starts the player. Idempotent.
    fn play(&self) {
        self.core().set_playing(true);
    }

    /// Stops the player. Idempotent.
    fn pause(&self) {
        self.core().set_playing(false);
    }

    /// Returns `Some` when this player is an [`Ensemble`].
    fn as_ensemble(&self) -> Option<&Ensemble> {
        None
    }

    fn id(&self) -> PlayerId {
        self.core().id()
    }

    fn is_playing(&self) -> bool {
        self.core().is_playing()
    }

    /// Name inside the owning ensemble.
    fn name(&self) -> Option<Arc<str>> {
        self.core().name()
    }

    /// The owning ensemble.
    fn ensemble(&self) -> Option<Arc<Ensemble>> {
        self.core().ensemble()
    }

    /// Emits an event and bubbles it to the owning ensemble. Returns the origin event.
    fn emit(&self, kind: &str, args: Vec<Value>) -> Arc<Event> {
        self.core().emit(kind, args)
    }

    /// Registers a listener for `kind`.
    fn on<F>(&self, kind: &str, listener: F) -> ListenerId
    where
        Self: Sized,
        F: Fn(&Arc<Event>) + Send + Sync + 'static,
    {
        self.core().on(kind, listener)
    }

    /// Registers a listener removed after its first invocation.
    fn once<F>(&self, kind: &str, listener: F) -> ListenerId
    where
        Self: Sized,
        F: Fn(&Arc<Event>) + Send + Sync + 'static,
    {
        self.core().once(kind, listener)
    }

    /// Removes a listener.
    fn off(&self, kind: &str, id: ListenerId) -> bool {
        self.core().off(kind, id)
    }
}

/// A plain player: lifecycle and emission only.
///
/// Useful as a leaf of an ensemble or as an in-process event source for a
/// [`Cue`](crate::Cue).
#[derive(Default)]
pub struct Part {
    core: PlayerCore,
}

impl Part {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the part and returns it as a shared handle.
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Player for Part {
    fn core(&self) -> &PlayerCore {
        &self.core
    }
}
