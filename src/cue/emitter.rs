//! # Emitter capability and the adapters a cue can listen through.
//!
//! A [`Cue`](crate::Cue) never probes its emitter on every call. The [`Source`] it is
//! built from is resolved **once**, in a fixed order, into an [`Emitter`] adapter:
//!
//! ```text
//! Source::Player(p)     ─► PlayerEmitter     (p.on / p.off)
//! Source::Broadcast(tx) ─► BroadcastEmitter  (tx.subscribe + forwarding task / abort)
//! Source::Custom(e)     ─► e                 (user adapter)
//!                               │
//!                               └─► supports(event)? else UnsupportedEmitter
//! ```
//!
//! The same adapter (and the same [`ListenerId`]) is used to detach what it attached.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::error::CueError;
use crate::events::{Bus, ListenerId, Signal};
use crate::players::Player;
use crate::value::Value;

/// Callback an emitter invokes with the signal's positional arguments.
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// # Attach/detach capability of an external signal source.
///
/// Implement this to bridge any callback-style source (observer, channel, FFI hook)
/// into cues.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use parking_lot::Mutex;
/// use concertino::{Emitter, Handler, ListenerId, Value};
///
/// #[derive(Default)]
/// struct Clicks {
///     handlers: Mutex<Vec<(ListenerId, Handler)>>,
/// }
///
/// impl Clicks {
///     fn click(&self, x: i64) {
///         let hs: Vec<Handler> = self.handlers.lock().iter().map(|(_, h)| h.clone()).collect();
///         for h in hs {
///             h(&[Value::from(x)]);
///         }
///     }
/// }
///
/// impl Emitter for Clicks {
///     fn attach(&self, _event: &str, handler: Handler) -> ListenerId {
///         let id = ListenerId::next();
///         self.handlers.lock().push((id, handler));
///         id
///     }
///
///     fn detach(&self, _event: &str, id: ListenerId) -> bool {
///         let mut hs = self.handlers.lock();
///         let before = hs.len();
///         hs.retain(|(i, _)| *i != id);
///         hs.len() != before
///     }
///
///     fn supports(&self, event: &str) -> bool {
///         event == "click"
///     }
/// }
/// ```
pub trait Emitter: Send + Sync {
    /// Registers `handler` for `event` and returns a key to detach it with.
    fn attach(&self, event: &str, handler: Handler) -> ListenerId;

    /// Unregisters a handler. Returns `true` if it was attached.
    fn detach(&self, event: &str, id: ListenerId) -> bool;

    /// Returns `false` when this emitter can never carry `event`.
    fn supports(&self, _event: &str) -> bool {
        true
    }
}

/// Where a cue listens.
#[derive(Clone)]
pub enum Source {
    /// Events emitted by (or bubbled to) a player.
    Player(Arc<dyn Player>),
    /// Named signals on a tokio broadcast channel.
    Broadcast(broadcast::Sender<Signal>),
    /// A user-provided adapter.
    Custom(Arc<dyn Emitter>),
}

impl Source {
    /// Resolves the adapter for this source, checking it can carry `event`.
    pub(crate) fn into_emitter(self, event: &Arc<str>) -> Result<Arc<dyn Emitter>, CueError> {
        let emitter: Arc<dyn Emitter> = match self {
            Source::Player(player) => Arc::new(PlayerEmitter::new(&player)),
            Source::Broadcast(tx) => {
                let runtime = Handle::try_current().map_err(|_| CueError::UnsupportedEmitter {
                    event: Arc::clone(event),
                    reason: "broadcast source requires a running tokio runtime",
                })?;
                Arc::new(BroadcastEmitter::new(&tx, runtime))
            }
            Source::Custom(emitter) => emitter,
        };

        if !emitter.supports(event) {
            return Err(CueError::UnsupportedEmitter {
                event: Arc::clone(event),
                reason: "emitter does not carry this event",
            });
        }
        Ok(emitter)
    }
}

impl<P: Player> From<Arc<P>> for Source {
    fn from(player: Arc<P>) -> Self {
        Source::Player(player)
    }
}

impl From<Arc<dyn Player>> for Source {
    fn from(player: Arc<dyn Player>) -> Self {
        Source::Player(player)
    }
}

impl From<Arc<dyn Emitter>> for Source {
    fn from(emitter: Arc<dyn Emitter>) -> Self {
        Source::Custom(emitter)
    }
}

impl From<broadcast::Sender<Signal>> for Source {
    fn from(tx: broadcast::Sender<Signal>) -> Self {
        Source::Broadcast(tx)
    }
}

impl From<&Bus> for Source {
    fn from(bus: &Bus) -> Self {
        Source::Broadcast(bus.sender().clone())
    }
}

/// Listens on a player's own listener registry.
///
/// Holds the player weakly: a cue inside an ensemble may listen to that very
/// ensemble without keeping it alive. Handlers receive the **origin** arguments,
/// so a cue on an ensemble sees the payload of events bubbled from below.
pub struct PlayerEmitter {
    player: Weak<dyn Player>,
}

impl PlayerEmitter {
    pub fn new(player: &Arc<dyn Player>) -> Self {
        Self {
            player: Arc::downgrade(player),
        }
    }
}

impl Emitter for PlayerEmitter {
    fn attach(&self, event: &str, handler: Handler) -> ListenerId {
        match self.player.upgrade() {
            Some(player) => player
                .core()
                .on(event, move |ev| handler(ev.origin_args())),
            None => ListenerId::next(),
        }
    }

    fn detach(&self, event: &str, id: ListenerId) -> bool {
        self.player
            .upgrade()
            .is_some_and(|player| player.core().off(event, id))
    }

    fn supports(&self, _event: &str) -> bool {
        self.player.strong_count() > 0
    }
}

/// Listens on a broadcast channel of [`Signal`]s.
///
/// Each attached handler gets its own receiver (resubscribed synchronously inside
/// `attach`, so no signal sent afterwards is missed) and a forwarding task on the
/// runtime captured at construction. Lagged receivers skip ahead; a closed channel
/// ends the task and drops the handler.
///
/// The emitter holds only a receiver, never a sender: once every sender is gone
/// the channel closes and pending promises reject with `CueError::Closed`.
pub struct BroadcastEmitter {
    template: broadcast::Receiver<Signal>,
    runtime: Handle,
    tasks: Mutex<HashMap<ListenerId, JoinHandle<()>>>,
}

impl BroadcastEmitter {
    pub fn new(tx: &broadcast::Sender<Signal>, runtime: Handle) -> Self {
        Self {
            template: tx.subscribe(),
            runtime,
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

impl Emitter for BroadcastEmitter {
    fn attach(&self, event: &str, handler: Handler) -> ListenerId {
        let id = ListenerId::next();
        let mut rx = self.template.resubscribe();
        let event: Arc<str> = Arc::from(event);

        let join = self.runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(signal) if signal.name == event => handler(&signal.args),
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.tasks.lock().insert(id, join);
        id
    }

    fn detach(&self, _event: &str, id: ListenerId) -> bool {
        let join = self.tasks.lock().remove(&id);
        match join {
            Some(join) => {
                join.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for BroadcastEmitter {
    fn drop(&mut self) {
        for (_, join) in self.tasks.get_mut().drain() {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Part;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_player_emitter_attach_detach() {
        let part: Arc<dyn Player> = Part::arc();
        let emitter = PlayerEmitter::new(&part);
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let id = emitter.attach(
            "e",
            Arc::new(move |args: &[Value]| {
                h.fetch_add(args.len(), Ordering::SeqCst);
            }),
        );
        part.emit("e", vec![Value::from(1), Value::from(2)]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(emitter.detach("e", id));
        assert!(!emitter.detach("e", id));
        part.emit("e", vec![Value::from(1)]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dead_player_is_unsupported() {
        let part: Arc<dyn Player> = Part::arc();
        let emitter = PlayerEmitter::new(&part);
        assert!(emitter.supports("e"));
        drop(part);
        assert!(!emitter.supports("e"));
    }

    #[test]
    fn test_broadcast_without_runtime_is_unsupported() {
        let bus = Bus::new(8);
        let err = Source::from(&bus).into_emitter(&Arc::from("e")).err();
        assert!(matches!(err, Some(CueError::UnsupportedEmitter { .. })));
    }

    #[tokio::test]
    async fn test_broadcast_emitter_filters_by_name() {
        let bus = Bus::new(8);
        let emitter = Source::from(&bus).into_emitter(&Arc::from("hit")).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let id = emitter.attach(
            "hit",
            Arc::new(move |args: &[Value]| {
                let _ = tx.send(args.to_vec());
            }),
        );
        bus.send("miss", vec![Value::from(0)]);
        bus.send("hit", vec![Value::from(1)]);

        assert_eq!(rx.recv().await, Some(vec![Value::from(1)]));
        assert!(emitter.detach("hit", id));
    }

    #[tokio::test]
    async fn test_broadcast_emitter_does_not_keep_channel_open() {
        let bus = Bus::new(8);
        let emitter = Source::from(&bus).into_emitter(&Arc::from("hit")).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Vec<Value>>();

        emitter.attach(
            "hit",
            Arc::new(move |args: &[Value]| {
                let _ = tx.send(args.to_vec());
            }),
        );
        drop(bus);

        // The forwarding task sees the closed channel and drops the handler.
        assert_eq!(rx.recv().await, None);
    }
}
