//! # Cues: bridging external signals into players.
//!
//! - [`Emitter`] - attach/detach capability implemented once per emitter family
//! - [`Source`] - the emitter families a cue can be built from
//! - [`Cue`] - player that listens to one event and offers a one-shot [`Cue::promise`]
//!
//! ## Quick wiring
//! ```text
//! Cue::new(source, "event", listener)
//!   └─► Source::into_emitter()  (resolved once, fixed order)
//!         play()    ─► emitter.attach(event, bound listener)
//!         pause()   ─► emitter.detach(event, id)
//!         promise() ─► transient attach ... detach
//! ```

mod emitter;
mod player;

pub use emitter::{BroadcastEmitter, Emitter, Handler, PlayerEmitter, Source};
pub use player::{Cue, CueConfig, CueListener, first_arg};
