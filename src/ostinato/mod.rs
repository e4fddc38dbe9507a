//! # Repeating players.
//!
//! - [`Ostinato`] the player that runs the loop;
//! - [`Refrain`] / [`RefrainFn`] the repeated unit of work;
//! - [`Tempo`] the delay sequence between iterations.

mod player;
mod refrain;
mod tempo;

pub use player::{Ostinato, OstinatoConfig};
pub use refrain::{Refrain, RefrainFn};
pub use tempo::Tempo;
