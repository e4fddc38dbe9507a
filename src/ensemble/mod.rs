//! # Ensembles: trees of named players.
//!
//! [`Ensemble`] is a [`Player`](crate::Player) that owns an ordered, named set of
//! players, possibly other ensembles. Events emitted anywhere in the tree bubble
//! up through every enclosing ensemble (see [`PlayerCore`](crate::PlayerCore)).

mod tree;

pub use tree::{Ensemble, Entry};
