//! # concertino
//!
//! **Concertino** composes async lifecycle units ("players") into named trees,
//! wires them to external signals and repeats async work on a tempo.
//!
//! Every player can be played and paused, emits typed events to listeners, and
//! bubbles each event up through the ensembles that contain it. Bubbled events keep
//! a link to the event they were derived from, so a listener at the top of the tree
//! can see which leaf started it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                         ┌──────────────────────────────────────┐
//!                         │  Ensemble "band"                     │
//!                         │  - ordered, uniquely named players   │
//!                         │  - aggregate play / pause            │
//!                         └──────┬──────────────────┬────────────┘
//!                                ▼                  ▼
//!     ┌──────────────────────────────┐   ┌──────────────────────────────┐
//!     │  Ensemble "strings"          │   │  Ostinato "drum"             │
//!     └──────┬───────────────┬───────┘   │  refrain ─► sleep(tempo) ─┐  │
//!            ▼               ▼           │     ▲─────────────────────┘  │
//!     ┌─────────────┐ ┌─────────────┐    └──────────────────────────────┘
//!     │ Part        │ │ Cue         │◄── Emitter (player / Bus / custom)
//!     │ "violin"    │ │ "door"      │     signal ─► listener(cue, args)
//!     └─────────────┘ └─────────────┘
//!
//! violin.emit("tuned")
//!   └─► violin listeners ─► strings listeners ─► band listeners
//!       Event{violin}      Event{strings,        Event{band,
//!                                source:violin}        source:strings}
//! ```
//!
//! ### Lifecycle
//! ```text
//! Player::play()  ──► PlayerCore::set_playing(true)  ──► "changed"["playing", false, true]
//! Player::pause() ──► PlayerCore::set_playing(false) ──► "changed"["playing", true, false]
//!
//! Ensemble::play()  ─► play every child that is paused, then itself
//! Cue::play()       ─► attach listener to emitter
//! Ostinato::play()  ─► spawn run loop:
//!   ├─► refrain(n).await
//!   ├─► times reached?  ─► pause, emit "exhausted"
//!   └─► sleep(tempo.delay(n)) (cancellable by pause)
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                        |
//! |-------------------|----------------------------------------------------------------|-------------------------------------------|
//! | **Players**       | Lifecycle flag, listener registry, emit and bubbling.          | [`Player`], [`PlayerCore`], [`Part`]      |
//! | **Ensembles**     | Named, ordered player trees with rotate/sort and lookups.      | [`Ensemble`]                              |
//! | **Events**        | Provenance chains, signal bus.                                 | [`Event`], [`Bus`], [`Signal`]            |
//! | **Cues**          | Bind to an emitter's event; promise-style one-shot waits.      | [`Cue`], [`Emitter`], [`Source`]          |
//! | **Ostinatos**     | Repeat an async refrain with a growing delay.                  | [`Ostinato`], [`Refrain`], [`Tempo`]      |
//! | **Errors**        | Typed errors for membership and cue waits.                     | [`EnsembleError`], [`CueError`]           |
//! | **Configuration** | Shared defaults.                                               | [`Config`]                                |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use concertino::{Ensemble, Part, Player, Value};
//!
//! let band = Ensemble::new();
//! let violin = Part::arc();
//! band.add("violin", violin.clone()).unwrap();
//!
//! let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
//! let s = Arc::clone(&seen);
//! band.on("tuned", move |ev| s.lock().push(ev.propagation_path()));
//!
//! violin.emit("tuned", vec![Value::from(440)]);
//! assert_eq!(*seen.lock(), vec![vec![violin.id(), band.id()]]);
//!
//! band.play();
//! assert!(violin.is_playing());
//! ```
mod config;
mod cue;
mod ensemble;
mod error;
mod events;
mod ostinato;
mod players;
mod value;

// ---- Public re-exports ----

pub use config::Config;
pub use cue::{
    BroadcastEmitter, Cue, CueConfig, CueListener, Emitter, Handler, PlayerEmitter, Source,
    first_arg,
};
pub use ensemble::{Ensemble, Entry};
pub use error::{BoxError, CueError, EnsembleError};
pub use events::{Bus, Chain, Event, ListenerId, Signal, kind};
pub use ostinato::{Ostinato, OstinatoConfig, Refrain, RefrainFn, Tempo};
pub use players::{AsAny, EnsembleLink, Listener, Part, Player, PlayerCore, PlayerId};
pub use value::Value;

// Optional: expose a simple built-in event printer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
mod listeners;
#[cfg(feature = "logging")]
pub use listeners::LogWriter;
