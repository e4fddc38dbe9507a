//! # Cue: a player bound to one event of an external emitter.
//!
//! While playing, every signal of the configured event is handed to the cue's
//! listener, invoked with the cue itself as receiver. Independently of that, any
//! number of one-shot waits can be started with [`Cue::promise`].
//!
//! ## Promise flow
//! ```text
//! promise(timeout, predicate)
//!   ├─► attach transient handler ──────────────┐ (own ListenerId, `attached` untouched)
//!   │                                          ▼
//!   │   signal ─► listener(cue, args) ─┬─ Err(e)           → settle Err(Listener)
//!   │                                  ├─ Ok(r), pred(r)   → settle Ok(r)
//!   │                                  └─ Ok(r), !pred(r)  → keep waiting
//!   ├─► race: settled │ timeout elapsed → Err(Timeout) │ handler dropped → Err(Closed)
//!   └─► detach handler (drop guard: every exit path, including a dropped future)
//! ```
//!
//! ## Rules
//! - The handler is attached when `promise` is called, not when the wait is first polled.
//! - A promise settles **at most once**; later signals are ignored without calling the listener.
//! - A zero timeout waits indefinitely.
//! - The timer is dropped (cancelled) as soon as the wait settles.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time;

use crate::config::Config;
use crate::cue::emitter::{Emitter, Handler, Source};
use crate::error::{BoxError, CueError};
use crate::events::{ListenerId, kind};
use crate::players::{Player, PlayerCore};
use crate::value::Value;

/// Listener type: transforms a signal's arguments into an optional result.
pub type CueListener = dyn Fn(&Cue, &[Value]) -> Result<Option<Value>, BoxError> + Send + Sync;

/// Listener that yields the first signal argument, if any.
pub fn first_arg(_cue: &Cue, args: &[Value]) -> Result<Option<Value>, BoxError> {
    Ok(args.first().cloned())
}

/// Per-cue settings.
#[derive(Clone, Copy, Debug)]
pub struct CueConfig {
    /// Timeout used by [`Cue::promise_default`] (`None` = wait indefinitely).
    pub timeout: Option<Duration>,
    /// Pause the cue after the first signal delivered while playing.
    pub once: bool,
}

impl Default for CueConfig {
    /// Returns a config with no timeout and `once = false`.
    fn default() -> Self {
        Self {
            timeout: None,
            once: false,
        }
    }
}

impl From<&Config> for CueConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            timeout: cfg.cue_timeout_opt(),
            ..Self::default()
        }
    }
}

/// A player that listens to one event of an external emitter.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use concertino::{Cue, Part, Player, Value, first_arg};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), concertino::CueError> {
///     let door = Part::arc();
///     let cue = Cue::new(door.clone(), "opened", first_arg)?;
///
///     let wait = cue.promise(Duration::from_secs(1));
///     door.emit("opened", vec![Value::from("front")]);
///     assert_eq!(wait.await?, Value::from("front"));
///     Ok(())
/// }
/// ```
pub struct Cue {
    core: PlayerCore,
    emitter: Arc<dyn Emitter>,
    event: Arc<str>,
    listener: Arc<CueListener>,
    bound: Handler,
    config: CueConfig,
    attached: Mutex<Option<ListenerId>>,
    me: Weak<Cue>,
}

impl Cue {
    /// Creates a paused cue for `event` on `source` with the default [`CueConfig`].
    ///
    /// ### Errors
    /// - [`CueError::InvalidEvent`] if `event` is empty
    /// - [`CueError::UnsupportedEmitter`] if the source cannot carry `event`
    pub fn new<F>(
        source: impl Into<Source>,
        event: impl Into<Arc<str>>,
        listener: F,
    ) -> Result<Arc<Self>, CueError>
    where
        F: Fn(&Cue, &[Value]) -> Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        Self::with_config(source, event, listener, CueConfig::default())
    }

    /// Creates a cue with explicit settings.
    pub fn with_config<F>(
        source: impl Into<Source>,
        event: impl Into<Arc<str>>,
        listener: F,
        config: CueConfig,
    ) -> Result<Arc<Self>, CueError>
    where
        F: Fn(&Cue, &[Value]) -> Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        let event: Arc<str> = event.into();
        if event.is_empty() {
            return Err(CueError::InvalidEvent);
        }
        let emitter = source.into().into_emitter(&event)?;
        let listener: Arc<CueListener> = Arc::new(listener);

        Ok(Arc::new_cyclic(|me: &Weak<Cue>| {
            let weak = me.clone();
            let bound: Handler = Arc::new(move |args: &[Value]| {
                if let Some(cue) = weak.upgrade() {
                    cue.deliver(args);
                }
            });
            Self {
                core: PlayerCore::new(),
                emitter,
                event,
                listener,
                bound,
                config,
                attached: Mutex::new(None),
                me: me.clone(),
            }
        }))
    }

    /// Creates a cue whose promise timeout comes from the crate-wide [`Config`].
    pub fn with_defaults<F>(
        source: impl Into<Source>,
        event: impl Into<Arc<str>>,
        listener: F,
        cfg: &Config,
    ) -> Result<Arc<Self>, CueError>
    where
        F: Fn(&Cue, &[Value]) -> Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        Self::with_config(source, event, listener, CueConfig::from(cfg))
    }

    /// The configured event name.
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn config(&self) -> CueConfig {
        self.config
    }

    /// Returns `true` while the bound listener is registered on the emitter.
    pub fn is_attached(&self) -> bool {
        self.attached.lock().is_some()
    }

    /// Waits for the first signal whose listener result is `Some`.
    ///
    /// Equivalent to [`promise_matching`](Self::promise_matching) with `Option::is_some`.
    pub fn promise(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Value, CueError>> + Send + '_ {
        let wait = self.promise_matching(timeout, Option::<Value>::is_some);
        async move { Ok(wait.await?.unwrap_or_default()) }
    }

    /// [`promise`](Self::promise) with the timeout from this cue's [`CueConfig`].
    pub fn promise_default(&self) -> impl Future<Output = Result<Value, CueError>> + Send + '_ {
        let wait = self.settle(self.config.timeout, Option::<Value>::is_some);
        async move { Ok(wait.await?.unwrap_or_default()) }
    }

    /// Waits for the first signal whose listener result satisfies `predicate`.
    ///
    /// The handler is attached before this returns, so a signal emitted between the
    /// call and the first poll of the returned future is not missed.
    ///
    /// ### Errors
    /// - [`CueError::Listener`] if the listener fails on a signal
    /// - [`CueError::Timeout`] if `timeout > 0` elapses first
    /// - [`CueError::Closed`] if the emitter drops the pending handler
    pub fn promise_matching<P>(
        &self,
        timeout: Duration,
        predicate: P,
    ) -> impl Future<Output = Result<Option<Value>, CueError>> + Send + '_
    where
        P: Fn(&Option<Value>) -> bool + Send + Sync + 'static,
    {
        let timeout = (!timeout.is_zero()).then_some(timeout);
        self.settle(timeout, predicate)
    }

    /// Attaches a pending handler now and returns the wait for it to settle.
    fn settle<P>(
        &self,
        timeout: Option<Duration>,
        predicate: P,
    ) -> impl Future<Output = Result<Option<Value>, CueError>> + Send + '_
    where
        P: Fn(&Option<Value>) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel::<Result<Option<Value>, CueError>>();
        let handler = self.pending_handler(tx, predicate);

        let id = self.emitter.attach(&self.event, handler);
        let detach = DetachGuard {
            emitter: self.emitter.as_ref(),
            event: &self.event,
            id,
        };

        async move {
            let _detach = detach;
            let settled = match timeout {
                None => rx.await,
                Some(timeout) => match time::timeout(timeout, rx).await {
                    Ok(settled) => settled,
                    Err(_elapsed) => {
                        return Err(CueError::Timeout {
                            event: Arc::clone(&self.event),
                            timeout,
                        });
                    }
                },
            };

            settled.unwrap_or_else(|_dropped| {
                Err(CueError::Closed {
                    event: Arc::clone(&self.event),
                })
            })
        }
    }

    /// Builds the transient handler that settles a pending promise at most once.
    fn pending_handler<P>(
        &self,
        tx: oneshot::Sender<Result<Option<Value>, CueError>>,
        predicate: P,
    ) -> Handler
    where
        P: Fn(&Option<Value>) -> bool + Send + Sync + 'static,
    {
        let slot = Mutex::new(Some(tx));
        let me = self.me.clone();
        let listener = Arc::clone(&self.listener);
        let event = Arc::clone(&self.event);

        Arc::new(move |args: &[Value]| {
            if slot.lock().is_none() {
                return;
            }
            let Some(cue) = me.upgrade() else {
                return;
            };
            let outcome = match listener(cue.as_ref(), args) {
                Ok(res) if predicate(&res) => Ok(res),
                Ok(_) => return,
                Err(source) => Err(CueError::Listener {
                    event: Arc::clone(&event),
                    source,
                }),
            };
            let tx = slot.lock().take();
            if let Some(tx) = tx {
                let _ = tx.send(outcome);
            }
        })
    }

    /// Runs the listener for a signal received while playing.
    fn deliver(&self, args: &[Value]) {
        if let Err(err) = (self.listener)(self, args) {
            self.core
                .emit(kind::ERROR, vec![Value::from(err.to_string())]);
        }
        if self.config.once {
            self.pause();
        }
    }
}

impl Player for Cue {
    fn core(&self) -> &PlayerCore {
        &self.core
    }

    fn play(&self) {
        if self.attached.lock().is_none() {
            let id = self.emitter.attach(&self.event, Arc::clone(&self.bound));
            let mut attached = self.attached.lock();
            if attached.is_none() {
                *attached = Some(id);
            } else {
                drop(attached);
                self.emitter.detach(&self.event, id);
            }
        }
        self.core.set_playing(true);
    }

    fn pause(&self) {
        let id = self.attached.lock().take();
        if let Some(id) = id {
            self.emitter.detach(&self.event, id);
        }
        self.core.set_playing(false);
    }
}

impl Drop for Cue {
    fn drop(&mut self) {
        if let Some(id) = self.attached.get_mut().take() {
            self.emitter.detach(&self.event, id);
        }
    }
}

/// Detaches a pending promise handler when the wait ends (or is dropped).
struct DetachGuard<'a> {
    emitter: &'a dyn Emitter,
    event: &'a str,
    id: ListenerId,
}

impl Drop for DetachGuard<'_> {
    fn drop(&mut self) {
        self.emitter.detach(self.event, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Part;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn door() -> (Arc<Part>, Arc<Cue>) {
        let door = Part::arc();
        let cue = Cue::new(door.clone(), "knock", first_arg).unwrap();
        (door, cue)
    }

    #[test]
    fn test_empty_event_rejected() {
        let err = Cue::new(Part::arc(), "", first_arg).err();
        assert!(matches!(err, Some(CueError::InvalidEvent)));
    }

    #[test]
    fn test_play_pause_attach_detach() {
        let door = Part::arc();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let cue = Cue::new(door.clone(), "knock", move |_cue: &Cue, _args: &[Value]| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        })
        .unwrap();

        cue.play();
        cue.play();
        assert!(cue.is_attached() && cue.is_playing());
        assert_eq!(door.core().listener_count("knock"), 1);

        door.emit("knock", Vec::new());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        cue.pause();
        cue.pause();
        assert!(!cue.is_attached() && !cue.is_playing());
        assert_eq!(door.core().listener_count("knock"), 0);
        door.emit("knock", Vec::new());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_receives_cue_as_receiver() {
        let door = Part::arc();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        let cue = Cue::new(door.clone(), "knock", move |cue: &Cue, _args: &[Value]| {
            *s.lock() = Some(cue.id());
            Ok(None)
        })
        .unwrap();
        cue.play();
        door.emit("knock", Vec::new());
        assert_eq!(*seen.lock(), Some(cue.id()));
    }

    #[test]
    fn test_listener_error_while_playing_is_emitted() {
        let door = Part::arc();
        let cue = Cue::new(door.clone(), "knock", |_: &Cue, _: &[Value]| {
            Err("jammed".into())
        })
        .unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&errors);
        cue.on(kind::ERROR, move |ev| e.lock().push(ev.args[0].clone()));

        cue.play();
        door.emit("knock", Vec::new());
        assert_eq!(*errors.lock(), vec![Value::from("jammed")]);
    }

    #[test]
    fn test_once_pauses_after_first_signal() {
        let door = Part::arc();
        let cue = Cue::with_config(
            door.clone(),
            "knock",
            first_arg,
            CueConfig {
                once: true,
                ..CueConfig::default()
            },
        )
        .unwrap();
        cue.play();
        door.emit("knock", Vec::new());
        assert!(!cue.is_playing());
        assert!(!cue.is_attached());
        assert_eq!(door.core().listener_count("knock"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promise_resolves_and_detaches() {
        let (door, cue) = door();
        let wait = cue.promise(Duration::from_millis(100));
        let knock = async {
            tokio::task::yield_now().await;
            door.emit("knock", Vec::new());
            door.emit("knock", vec![Value::from(3)]);
        };
        let (res, ()) = tokio::join!(wait, knock);

        assert_eq!(res.unwrap(), Value::from(3));
        assert_eq!(door.core().listener_count("knock"), 0);
        assert!(!cue.is_attached());
    }

    #[tokio::test(start_paused = true)]
    async fn test_promise_sees_signal_emitted_before_first_poll() {
        let (door, cue) = door();
        let wait = cue.promise(Duration::from_millis(100));
        assert_eq!(door.core().listener_count("knock"), 1);

        door.emit("knock", vec![Value::from("ready")]);
        assert_eq!(wait.await.unwrap(), Value::from("ready"));
        assert_eq!(door.core().listener_count("knock"), 0);
    }

    #[test]
    fn test_unpolled_promise_detaches_on_drop() {
        let (door, cue) = door();
        let wait = cue.promise(Duration::ZERO);
        assert_eq!(door.core().listener_count("knock"), 1);
        drop(wait);
        assert_eq!(door.core().listener_count("knock"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promise_default_uses_config_timeout() {
        let door = Part::arc();
        let cfg = Config {
            cue_timeout: Duration::from_millis(30),
            ..Config::default()
        };
        let cue = Cue::with_defaults(door.clone(), "knock", first_arg, &cfg).unwrap();
        assert_eq!(cue.config().timeout, Some(Duration::from_millis(30)));

        let err = cue.promise_default().await.unwrap_err();
        assert!(matches!(
            err,
            CueError::Timeout { timeout, .. } if timeout == Duration::from_millis(30)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_promise_times_out_naming_event() {
        let (door, cue) = door();
        let wait = cue.promise(Duration::from_millis(50));
        let noise = async {
            tokio::task::yield_now().await;
            door.emit("knock", Vec::new());
        };
        let (res, ()) = tokio::join!(wait, noise);

        let err = res.unwrap_err();
        assert!(matches!(err, CueError::Timeout { .. }));
        assert_eq!(err.event(), Some("knock"));
        assert_eq!(door.core().listener_count("knock"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promise_listener_error_rejects() {
        let door = Part::arc();
        let cue = Cue::new(door.clone(), "knock", |_: &Cue, _: &[Value]| {
            Err("jammed".into())
        })
        .unwrap();
        let wait = cue.promise(Duration::ZERO);
        let knock = async {
            tokio::task::yield_now().await;
            door.emit("knock", Vec::new());
        };
        let (res, ()) = tokio::join!(wait, knock);

        assert!(matches!(res, Err(CueError::Listener { .. })));
        assert_eq!(door.core().listener_count("knock"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promise_is_independent_of_play() {
        let (door, cue) = door();
        cue.play();
        let wait = cue.promise_matching(Duration::from_secs(1), |r| {
            r.as_ref().and_then(Value::as_int).is_some_and(|n| n > 1)
        });
        let knock = async {
            tokio::task::yield_now().await;
            assert_eq!(door.core().listener_count("knock"), 2);
            door.emit("knock", vec![Value::from(1)]);
            door.emit("knock", vec![Value::from(2)]);
        };
        let (res, ()) = tokio::join!(wait, knock);

        assert_eq!(res.unwrap(), Some(Value::from(2)));
        assert!(cue.is_attached());
        assert_eq!(door.core().listener_count("knock"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_promise_detaches() {
        let (door, cue) = door();
        let res = time::timeout(Duration::from_millis(10), cue.promise(Duration::ZERO)).await;
        assert!(res.is_err());
        assert_eq!(door.core().listener_count("knock"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promise_closed_when_source_dropped() {
        let door = Part::arc();
        let cue = Cue::new(door.clone(), "knock", first_arg).unwrap();
        let wait = cue.promise(Duration::ZERO);
        let gone = async move {
            tokio::task::yield_now().await;
            drop(door);
        };
        let (res, ()) = tokio::join!(wait, gone);
        assert!(matches!(res, Err(CueError::Closed { .. })));
    }

    #[tokio::test]
    async fn test_promise_closed_when_bus_dropped() {
        let bus = crate::Bus::new(8);
        let cue = Cue::new(&bus, "knock", first_arg).unwrap();
        let wait = cue.promise(Duration::ZERO);
        drop(bus);

        let res = time::timeout(Duration::from_secs(5), wait).await;
        assert!(matches!(res, Ok(Err(CueError::Closed { .. }))));
    }
}
