//! # Ensemble: a player owning a named, ordered set of players.
//!
//! The ensemble owns its children (`Arc<dyn Player>`); each child holds only a
//! non-owning back-reference ([`EnsembleLink`](crate::EnsembleLink)) so the tree never forms
//! a retain cycle.
//!
//! ## Membership protocol
//! ```text
//! add(name, p)     ─► players.push((name, p)) ─► p.name = name ─► p.ensemble = self
//! remove(name)     ─► players.remove(name)    ─► p.ensemble = ∅ ─► p.name = ∅
//! rotate(name?)    ─► remove + add (re-inserted at the end, same identity)
//! sort(cmp, limit) ─► reorder ─► split tail off ─► tail players detached
//! ```
//! Each back-reference change goes through `mutate`, so `changed` events fire.
//!
//! ## Rules
//! - Names are unique within one ensemble.
//! - A player belongs to at most one ensemble at a time.
//! - `remove` never pauses the removed player; its lifecycle is the caller's business.
//! - The player list lock is never held while listeners or children run.

use std::cmp::Ordering;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::EnsembleError;
use crate::players::{Player, PlayerCore};

/// One `(name, player)` entry.
pub type Entry = (Arc<str>, Arc<dyn Player>);

/// A player that is also a named, ordered collection of players.
///
/// # Example
/// ```
/// use concertino::{Ensemble, Part, Player};
///
/// let band = Ensemble::new();
/// band.add("drums", Part::arc())?.add("bass", Part::arc())?;
///
/// band.play();
/// assert!(band.get("drums").is_some_and(|p| p.is_playing()));
///
/// assert_eq!(band.rotate(None).and_then(|p| p.name()).as_deref(), Some("drums"));
/// let names: Vec<String> = band.names().iter().map(|n| n.to_string()).collect();
/// assert_eq!(names, ["bass", "drums"]);
/// # Ok::<(), concertino::EnsembleError>(())
/// ```
pub struct Ensemble {
    core: PlayerCore,
    me: Weak<Ensemble>,
    players: Mutex<Vec<Entry>>,
}

impl std::fmt::Debug for Ensemble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ensemble").finish_non_exhaustive()
    }
}

impl Ensemble {
    /// Creates an empty, paused ensemble.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            core: PlayerCore::new(),
            me: me.clone(),
            players: Mutex::new(Vec::new()),
        })
    }

    /// Adds `player` under `name`.
    ///
    /// ### Errors
    /// - [`EnsembleError::DuplicateName`] if `name` is taken here
    /// - [`EnsembleError::AlreadyMember`] if `player` belongs to an ensemble
    /// - [`EnsembleError::Cycle`] if `player` is this ensemble or one of its ancestors
    pub fn add(
        &self,
        name: impl Into<Arc<str>>,
        player: Arc<dyn Player>,
    ) -> Result<&Self, EnsembleError> {
        let name = name.into();
        if let Some(current) = player.name() {
            return Err(EnsembleError::AlreadyMember { current });
        }
        if self.is_self_or_ancestor(player.id()) {
            return Err(EnsembleError::Cycle { name });
        }
        {
            let mut players = self.players.lock();
            if players.iter().any(|(n, _)| *n == name) {
                return Err(EnsembleError::DuplicateName { name });
            }
            players.push((Arc::clone(&name), Arc::clone(&player)));
        }
        self.bind(name, &player);
        Ok(self)
    }

    /// Returns the player registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Player>> {
        self.players
            .lock()
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, p)| Arc::clone(p))
    }

    /// Returns the nested ensemble registered under `name`.
    pub fn get_ensemble(&self, name: &str) -> Option<Arc<Ensemble>> {
        self.get(name)?.into_any().downcast::<Ensemble>().ok()
    }

    /// Returns the nested ensemble under `name`, creating an empty one if absent.
    ///
    /// A created ensemble takes this ensemble's play/pause state before it is added,
    /// which makes nested paths easy to build:
    /// ```
    /// use concertino::Ensemble;
    ///
    /// let root = Ensemble::new();
    /// let leaf = root.get_or_create("a")?.get_or_create("b")?;
    /// assert!(root.get_ensemble("a").is_some_and(|a| a.has("b")));
    /// # let _ = leaf;
    /// # Ok::<(), concertino::EnsembleError>(())
    /// ```
    ///
    /// ### Errors
    /// [`EnsembleError::NotAnEnsemble`] if another kind of player holds the name.
    pub fn get_or_create(&self, name: impl Into<Arc<str>>) -> Result<Arc<Ensemble>, EnsembleError> {
        let name = name.into();
        if let Some(existing) = self.get(&name) {
            return existing
                .into_any()
                .downcast::<Ensemble>()
                .map_err(|_| EnsembleError::NotAnEnsemble { name });
        }

        let child = Ensemble::new();
        if self.is_playing() {
            child.play();
        }
        self.add(name, child.clone())?;
        Ok(child)
    }

    /// Membership test.
    pub fn has(&self, name: &str) -> bool {
        self.players.lock().iter().any(|(n, _)| n.as_ref() == name)
    }

    /// Removes the player under `name`. Returns whether anything was removed.
    pub fn remove(&self, name: &str) -> bool {
        self.take(name).is_some()
    }

    /// Removes and returns the player under `name`, clearing its back-references.
    pub fn take(&self, name: &str) -> Option<Arc<dyn Player>> {
        let (_, player) = {
            let mut players = self.players.lock();
            let idx = players.iter().position(|(n, _)| n.as_ref() == name)?;
            players.remove(idx)
        };
        player.core().leave();
        Some(player)
    }

    /// Moves one entry to the end of the order and returns it.
    ///
    /// With `None` the current first entry is rotated. Returns `None` when the name
    /// is absent or the ensemble is empty.
    pub fn rotate(&self, name: Option<&str>) -> Option<Arc<dyn Player>> {
        let key: Arc<str> = match name {
            Some(n) => Arc::from(n),
            None => Arc::clone(&self.players.lock().first()?.0),
        };
        let player = self.take(&key)?;
        self.players.lock().push((Arc::clone(&key), Arc::clone(&player)));
        self.bind(key, &player);
        Some(player)
    }

    /// Reorders the entries by `cmp`; with `limit`, keeps only the first `limit`.
    ///
    /// Returns the trimmed tail in sorted order. Trimmed players are detached exactly
    /// like [`remove`](Self::remove) does, so they can be added anywhere again.
    ///
    /// The sort is stable. `cmp` runs while the entry list is locked and must not
    /// call back into this ensemble.
    pub fn sort<F>(&self, mut cmp: F, limit: Option<usize>) -> Vec<Entry>
    where
        F: FnMut((&str, &Arc<dyn Player>), (&str, &Arc<dyn Player>)) -> Ordering,
    {
        let tail = {
            let mut players = self.players.lock();
            players.sort_by(|a, b| cmp((a.0.as_ref(), &a.1), (b.0.as_ref(), &b.1)));
            match limit {
                Some(n) if n < players.len() => players.split_off(n),
                _ => Vec::new(),
            }
        };
        for (_, player) in &tail {
            player.core().leave();
        }
        tail
    }

    /// Flattens the tree depth-first in entry order.
    ///
    /// Nested ensembles are always recursed into; they appear in the output only
    /// when `include_ensembles` is set (right before their own descendants).
    pub fn descendants(&self, include_ensembles: bool) -> Vec<Arc<dyn Player>> {
        let mut out = Vec::new();
        self.collect_descendants(include_ensembles, &mut out);
        out
    }

    fn collect_descendants(&self, include_ensembles: bool, out: &mut Vec<Arc<dyn Player>>) {
        for (_, player) in self.entries() {
            match player.as_ensemble() {
                Some(nested) => {
                    if include_ensembles {
                        out.push(Arc::clone(&player));
                    }
                    nested.collect_descendants(include_ensembles, out);
                }
                None => out.push(player),
            }
        }
    }

    /// Snapshot of the entries in order.
    pub fn entries(&self) -> Vec<Entry> {
        self.players.lock().clone()
    }

    /// Snapshot of the names in order.
    pub fn names(&self) -> Vec<Arc<str>> {
        self.players
            .lock()
            .iter()
            .map(|(n, _)| Arc::clone(n))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.players.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.lock().is_empty()
    }

    fn bind(&self, name: Arc<str>, player: &Arc<dyn Player>) {
        if let Some(me) = self.me.upgrade() {
            player.core().join(name, &me);
        }
    }

    fn is_self_or_ancestor(&self, id: crate::PlayerId) -> bool {
        if self.id() == id {
            return true;
        }
        let mut cur = self.ensemble();
        while let Some(e) = cur {
            if e.id() == id {
                return true;
            }
            cur = e.ensemble();
        }
        false
    }

    /// Aggregate transition; children already in the target state are left alone.
    fn transition(&self, playing: bool) {
        if self.is_playing() == playing {
            return;
        }
        for (_, player) in self.entries() {
            if player.is_playing() == playing {
                continue;
            }
            if playing {
                player.play();
            } else {
                player.pause();
            }
        }
        self.core.set_playing(playing);
    }
}

impl Player for Ensemble {
    fn core(&self) -> &PlayerCore {
        &self.core
    }

    fn play(&self) {
        self.transition(true);
    }

    fn pause(&self) {
        self.transition(false);
    }

    fn as_ensemble(&self) -> Option<&Ensemble> {
        Some(self)
    }
}

impl Drop for Ensemble {
    fn drop(&mut self) {
        for (_, player) in self.players.get_mut().drain(..) {
            player.core().leave();
        }
    }
}
