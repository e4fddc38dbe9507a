//! # Events emitted by players.
//!
//! An [`Event`] is an immutable record of one emission. When a player belongs to an
//! [`Ensemble`](crate::Ensemble), the ensemble re-emits the event wrapped in a new
//! record whose [`Event::source`] points at the inner one. Following `source`
//! always terminates at the [`origin`](Event::origin): the innermost emission.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! A bubbled wrapper always has a larger `seq` than its source.
//!
//! ## Example
//! ```rust
//! use concertino::{Ensemble, Player, Value};
//!
//! let band = Ensemble::new();
//! let strings = band.get_or_create("strings").unwrap();
//! let violins = strings.get_or_create("violins").unwrap();
//!
//! let ev = violins.emit("tuned", vec![Value::from(440)]);
//! assert_eq!(ev.kind.as_ref(), "tuned");
//! assert_eq!(ev.depth(), 1);
//! assert!(ev.was_emitted_by(violins.id()));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::players::PlayerId;
use crate::value::Value;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// One emission, optionally derived from an earlier one.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp
/// - `source`: the event this one was bubbled from (`None` for an origin)
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Identity of the player that produced this record.
    pub emitter: PlayerId,
    /// Name the emitter held inside its ensemble at emission time.
    pub emitter_name: Option<Arc<str>>,
    /// Event type.
    pub kind: Arc<str>,
    /// Positional arguments. Bubbled wrappers carry none of their own.
    pub args: Vec<Value>,
    /// The event this one was derived from.
    pub source: Option<Arc<Event>>,
}

impl Event {
    /// Creates an origin event with the current timestamp and next sequence number.
    pub fn new(emitter: PlayerId, kind: impl Into<Arc<str>>, args: Vec<Value>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            emitter,
            emitter_name: None,
            kind: kind.into(),
            args,
            source: None,
        }
    }

    /// Creates the wrapper an ensemble emits when `source` bubbles up to it.
    pub fn derived(emitter: PlayerId, source: Arc<Event>) -> Self {
        Self {
            kind: Arc::clone(&source.kind),
            source: Some(source),
            ..Event::new(emitter, "", Vec::new())
        }
    }

    /// Attaches the emitter's name.
    #[inline]
    pub fn with_emitter_name(mut self, name: Option<Arc<str>>) -> Self {
        self.emitter_name = name;
        self
    }

    /// Walks from this event back to its origin (inclusive on both ends).
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    /// The innermost emission this event was derived from (itself when it is an origin).
    pub fn origin(&self) -> &Event {
        let mut cur = self;
        while let Some(src) = cur.source.as_deref() {
            cur = src;
        }
        cur
    }

    /// Returns `true` when this event has no source.
    #[inline]
    pub fn is_origin(&self) -> bool {
        self.source.is_none()
    }

    /// Number of records in the chain, counting this one.
    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    /// Emitters ordered from the origin (innermost) to this event (outermost).
    pub fn propagation_path(&self) -> Vec<PlayerId> {
        let mut path: Vec<PlayerId> = self.chain().map(|ev| ev.emitter).collect();
        path.reverse();
        path
    }

    /// Returns `true` if `player` emitted any record of this chain.
    pub fn was_emitted_by(&self, player: PlayerId) -> bool {
        self.chain().any(|ev| ev.emitter == player)
    }

    /// Arguments of the origin event.
    ///
    /// Bubbled wrappers have empty `args`; listeners on an ensemble usually want these.
    #[inline]
    pub fn origin_args(&self) -> &[Value] {
        &self.origin().args
    }
}

/// Iterator over an event and its sources, outermost first.
pub struct Chain<'a> {
    next: Option<&'a Event>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = cur.source.as_deref();
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u64) -> PlayerId {
        PlayerId::from_raw(n)
    }

    #[test]
    fn test_origin_event_is_its_own_origin() {
        let ev = Event::new(pid(1), "e", vec![Value::from(1)]);
        assert!(ev.is_origin());
        assert_eq!(ev.origin().seq, ev.seq);
        assert_eq!(ev.depth(), 1);
        assert_eq!(ev.propagation_path(), vec![pid(1)]);
    }

    #[test]
    fn test_derived_chain_views() {
        let inner = Arc::new(Event::new(pid(1), "e", vec![Value::from("x")]));
        let mid = Arc::new(Event::derived(pid(2), Arc::clone(&inner)));
        let outer = Event::derived(pid(3), Arc::clone(&mid));

        assert_eq!(outer.kind.as_ref(), "e");
        assert!(outer.args.is_empty());
        assert_eq!(outer.origin_args(), &[Value::from("x")]);
        assert_eq!(outer.depth(), 3);
        assert_eq!(outer.origin().seq, inner.seq);
        assert_eq!(outer.propagation_path(), vec![pid(1), pid(2), pid(3)]);
        assert!(outer.was_emitted_by(pid(2)));
        assert!(!outer.was_emitted_by(pid(4)));
        assert!(outer.seq > mid.seq && mid.seq > inner.seq);
    }
}
