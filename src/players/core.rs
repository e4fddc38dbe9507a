//! # Shared player state: lifecycle flag, membership and listener registry.
//!
//! Every player owns a [`PlayerCore`]. The core is where the lifecycle transition,
//! the guarded property mutation and the emit/bubble protocol live; player types
//! layer their own behavior on top by delegating to it.
//!
//! ## Emit and bubbling
//! ```text
//! violin.emit("tuned")
//!   ├─► Event{ emitter: violin, args }          → violin listeners("tuned")
//!   └─► ensemble = strings
//!        ├─► Event{ emitter: strings, source }   → strings listeners("tuned")
//!        └─► ensemble = band
//!             └─► Event{ emitter: band, source } → band listeners("tuned")
//! ```
//!
//! ## Rules
//! - Listeners for one type run **synchronously, in registration order**, before `emit` returns.
//! - Bubbling happens inside the same call: ancestors observe the event in the same turn.
//! - No lock is held while listeners run, so listeners may call back into the player.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::ensemble::Ensemble;
use crate::events::{Event, ListenerId, kind};
use crate::players::Player;
use crate::value::Value;

static PLAYER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique player identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(u64);

impl PlayerId {
    fn next() -> Self {
        Self(PLAYER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(n: u64) -> Self {
        Self(n)
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Shared handle to a listener callback.
pub type Listener = Arc<dyn Fn(&Arc<Event>) + Send + Sync>;

struct Entry {
    id: ListenerId,
    once: bool,
    listener: Listener,
}

/// Non-owning back-reference from a player to the ensemble holding it.
///
/// Compares by pointer identity so it can flow through [`PlayerCore::mutate`].
#[derive(Clone, Debug)]
pub struct EnsembleLink(Weak<Ensemble>);

impl EnsembleLink {
    pub(crate) fn new(ensemble: &Arc<Ensemble>) -> Self {
        Self(Arc::downgrade(ensemble))
    }

    pub fn upgrade(&self) -> Option<Arc<Ensemble>> {
        self.0.upgrade()
    }
}

impl PartialEq for EnsembleLink {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl From<EnsembleLink> for Value {
    fn from(link: EnsembleLink) -> Self {
        link.upgrade().map_or(Value::Null, |e| Value::Player(e.id()))
    }
}

/// Lifecycle state, membership and listeners of one player.
pub struct PlayerCore {
    id: PlayerId,
    playing: Mutex<bool>,
    name: Mutex<Option<Arc<str>>>,
    ensemble: Mutex<Option<EnsembleLink>>,
    listeners: Mutex<HashMap<Arc<str>, Vec<Entry>>>,
}

impl Default for PlayerCore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerCore {
    /// Creates a paused, unattached core with a fresh id.
    pub fn new() -> Self {
        Self {
            id: PlayerId::next(),
            playing: Mutex::new(false),
            name: Mutex::new(None),
            ensemble: Mutex::new(None),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn id(&self) -> PlayerId {
        self.id
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        *self.playing.lock()
    }

    /// Name inside the owning ensemble (`None` when unattached).
    pub fn name(&self) -> Option<Arc<str>> {
        self.name.lock().clone()
    }

    /// The owning ensemble, if attached and still alive.
    pub fn ensemble(&self) -> Option<Arc<Ensemble>> {
        self.ensemble.lock().as_ref().and_then(EnsembleLink::upgrade)
    }

    /// Base lifecycle transition; emits `changed("playing", old, new)` only on change.
    pub fn set_playing(&self, playing: bool) -> bool {
        self.mutate("playing", &self.playing, playing)
    }

    /// Assigns `value` to `slot` and emits [`kind::CHANGED`] with `[property, old, new]`.
    ///
    /// Returns `false` (and emits nothing) when the value is unchanged. The slot lock is
    /// released before listeners run.
    pub fn mutate<T>(&self, property: &str, slot: &Mutex<T>, value: T) -> bool
    where
        T: PartialEq + Clone + Into<Value>,
    {
        let old = {
            let mut cur = slot.lock();
            if *cur == value {
                return false;
            }
            std::mem::replace(&mut *cur, value.clone())
        };
        self.emit(
            kind::CHANGED,
            vec![Value::from(property), old.into(), value.into()],
        );
        true
    }

    /// Records membership: name first, then the ensemble back-reference.
    pub(crate) fn join(&self, name: Arc<str>, ensemble: &Arc<Ensemble>) {
        self.mutate("name", &self.name, Some(name));
        self.mutate("ensemble", &self.ensemble, Some(EnsembleLink::new(ensemble)));
    }

    /// Clears membership: ensemble first, so the name change no longer bubbles.
    pub(crate) fn leave(&self) {
        self.mutate("ensemble", &self.ensemble, None);
        self.mutate("name", &self.name, None);
    }

    /// Registers a listener for `kind`.
    pub fn on<F>(&self, kind: &str, listener: F) -> ListenerId
    where
        F: Fn(&Arc<Event>) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(listener), false)
    }

    /// Registers a listener that is removed right before its first invocation.
    pub fn once<F>(&self, kind: &str, listener: F) -> ListenerId
    where
        F: Fn(&Arc<Event>) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(listener), true)
    }

    /// Registers an already shared listener.
    pub fn register(&self, kind: &str, listener: Listener, once: bool) -> ListenerId {
        let id = ListenerId::next();
        self.listeners
            .lock()
            .entry(Arc::from(kind))
            .or_default()
            .push(Entry { id, once, listener });
        id
    }

    /// Removes a listener. Returns `true` if it was registered.
    pub fn off(&self, kind: &str, id: ListenerId) -> bool {
        let mut map = self.listeners.lock();
        let Some(list) = map.get_mut(kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| e.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(kind);
        }
        removed
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: &str) -> usize {
        self.listeners.lock().get(kind).map_or(0, Vec::len)
    }

    /// Emits an origin event from this player and bubbles it up the ensemble tree.
    ///
    /// Returns the origin event.
    pub fn emit(&self, kind: &str, args: Vec<Value>) -> Arc<Event> {
        let ev = Arc::new(Event::new(self.id, kind, args).with_emitter_name(self.name()));
        self.dispatch(&ev);
        ev
    }

    /// Notifies local listeners, then hands a derived event to the owning ensemble.
    pub(crate) fn dispatch(&self, ev: &Arc<Event>) {
        for listener in self.snapshot(&ev.kind) {
            listener(ev);
        }

        if let Some(parent) = self.ensemble() {
            let up = Event::derived(parent.id(), Arc::clone(ev)).with_emitter_name(parent.name());
            parent.core().dispatch(&Arc::new(up));
        }
    }

    /// Clones the listeners for `kind` in registration order, dropping `once` entries.
    fn snapshot(&self, kind: &str) -> Vec<Listener> {
        let mut map = self.listeners.lock();
        let Some(list) = map.get_mut(kind) else {
            return Vec::new();
        };
        let out = list.iter().map(|e| Arc::clone(&e.listener)).collect();
        list.retain(|e| !e.once);
        if list.is_empty() {
            map.remove(kind);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_listeners_run_in_registration_order() {
        let core = PlayerCore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            core.on("e", move |_| seen.lock().push(tag));
        }
        core.emit("e", Vec::new());
        core.emit("other", Vec::new());

        assert_eq!(*seen.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_off_and_once() {
        let core = PlayerCore::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let id = core.on("e", move |_| {
            h.fetch_add(1, AtomicOrdering::SeqCst);
        });
        let h = Arc::clone(&hits);
        core.once("e", move |_| {
            h.fetch_add(10, AtomicOrdering::SeqCst);
        });
        assert_eq!(core.listener_count("e"), 2);

        core.emit("e", Vec::new());
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 11);
        assert_eq!(core.listener_count("e"), 1);

        assert!(core.off("e", id));
        assert!(!core.off("e", id));
        core.emit("e", Vec::new());
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 11);
    }

    #[test]
    fn test_mutate_emits_only_on_change() {
        let core = PlayerCore::new();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let c = Arc::clone(&changes);
        core.on(kind::CHANGED, move |ev| c.lock().push(ev.args.clone()));

        let slot = Mutex::new(1_i64);
        assert!(core.mutate("volume", &slot, 2));
        assert!(!core.mutate("volume", &slot, 2));

        assert_eq!(*slot.lock(), 2);
        assert_eq!(
            *changes.lock(),
            vec![vec![Value::from("volume"), Value::from(1_i64), Value::from(2_i64)]]
        );
    }

    #[test]
    fn test_listener_may_reenter_core() {
        let core = Arc::new(PlayerCore::new());
        let weak = Arc::downgrade(&core);
        core.on("ping", move |_| {
            if let Some(core) = weak.upgrade() {
                core.emit("pong", Vec::new());
            }
        });
        let pongs = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&pongs);
        core.on("pong", move |_| {
            p.fetch_add(1, AtomicOrdering::SeqCst);
        });

        core.emit("ping", Vec::new());
        assert_eq!(pongs.load(AtomicOrdering::SeqCst), 1);
    }
}
