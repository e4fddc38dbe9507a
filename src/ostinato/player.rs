//! # Ostinato: a player that repeats an async refrain.
//!
//! While playing, the refrain is invoked, awaited, and after a [`Tempo`] delay
//! invoked again, until paused or until [`OstinatoConfig::times`] iterations have run.
//!
//! ## Run loop
//! ```text
//! play()
//!   └─► spawn run(generation, token)
//!         loop:
//!           ├─ token cancelled? ─────────────────────────────► exit
//!           ├─ iterations == times? ─► finish: paused + "exhausted"
//!           ├─ refrain.play(n).await (never interrupted)
//!           │     └─ panicked ─────► finish: paused + "panicked"
//!           └─ select! { sleep(tempo.delay(n-1)), token.cancelled() ─► exit }
//! ```
//!
//! ## Rules
//! - `pause()` cancels the run token: an in-flight refrain runs to completion but no
//!   further invocation is started.
//! - Each `play()` after a pause starts a new run with a new generation. A stale run
//!   can never pause or emit for a newer one.
//! - `play()` while already playing is a no-op.
//! - `play()`, `pause()` and a run ending on its own never interleave, so
//!   `is_playing()` always agrees with whether a run is live.
//! - Dropping the ostinato stops its run at the next boundary.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::events::kind;
use crate::ostinato::refrain::{Refrain, RefrainFn};
use crate::ostinato::tempo::Tempo;
use crate::players::{Player, PlayerCore};
use crate::value::Value;

/// Per-ostinato settings.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OstinatoConfig {
    /// Number of iterations per run (`None` = until paused).
    pub times: Option<u32>,
    /// Delay sequence between iterations.
    pub tempo: Tempo,
}

impl From<&Config> for OstinatoConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            times: cfg.iteration_limit(),
            tempo: cfg.tempo,
        }
    }
}

/// Cancellation handle of the current run.
struct Run {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct RunState {
    current: Option<Run>,
    generation: u64,
}

/// A player that repeatedly invokes an async refrain while playing.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
/// use concertino::{Ostinato, OstinatoConfig, Player, Tempo};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let beats = Arc::new(AtomicU32::new(0));
///     let b = Arc::clone(&beats);
///     let drum = Ostinato::with_config(
///         move |_n| {
///             let b = Arc::clone(&b);
///             async move {
///                 b.fetch_add(1, Ordering::SeqCst);
///             }
///         },
///         OstinatoConfig {
///             times: Some(3),
///             tempo: Tempo::fixed(Duration::from_millis(5)),
///         },
///     );
///
///     drum.play();
///     tokio::time::sleep(Duration::from_millis(100)).await;
///     assert_eq!(beats.load(Ordering::SeqCst), 3);
///     assert!(!drum.is_playing());
/// }
/// ```
pub struct Ostinato {
    core: PlayerCore,
    refrain: Arc<dyn Refrain>,
    config: OstinatoConfig,
    state: Mutex<RunState>,
    /// Serializes play/pause/finish together with the `playing` flag they set.
    /// Reentrant so listeners of those transitions may call back in.
    transition: ReentrantMutex<()>,
    iterations: AtomicU32,
    me: Weak<Ostinato>,
}

impl Ostinato {
    /// Creates a paused ostinato that repeats `refrain` until paused.
    pub fn new<F, Fut>(refrain: F) -> Arc<Self>
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::with_config(refrain, OstinatoConfig::default())
    }

    /// Creates a paused ostinato with explicit settings.
    pub fn with_config<F, Fut>(refrain: F, config: OstinatoConfig) -> Arc<Self>
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::from_refrain(RefrainFn::arc(refrain), config)
    }

    /// Creates an ostinato whose iteration limit and tempo come from [`Config`].
    pub fn with_defaults<F, Fut>(refrain: F, cfg: &Config) -> Arc<Self>
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::with_config(refrain, OstinatoConfig::from(cfg))
    }

    /// Creates an ostinato around a shared [`Refrain`] implementation.
    pub fn from_refrain(refrain: Arc<dyn Refrain>, config: OstinatoConfig) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Ostinato>| Self {
            core: PlayerCore::new(),
            refrain,
            config,
            state: Mutex::new(RunState::default()),
            transition: ReentrantMutex::new(()),
            iterations: AtomicU32::new(0),
            me: me.clone(),
        })
    }

    pub fn config(&self) -> OstinatoConfig {
        self.config
    }

    /// Refrain invocations completed by the current (or last) run.
    pub fn iterations(&self) -> u32 {
        self.iterations.load(Ordering::SeqCst)
    }

    /// Ends run `generation` on its own (limit reached or refrain panicked).
    fn finish(&self, generation: u64, kind: &str, arg: Value) {
        let _transition = self.transition.lock();
        {
            let mut state = self.state.lock();
            if !state
                .current
                .as_ref()
                .is_some_and(|run| run.generation == generation)
            {
                return;
            }
            if let Some(run) = state.current.take() {
                run.token.cancel();
            }
        }
        self.core.set_playing(false);
        self.core.emit(kind, vec![arg]);
    }

    async fn run(
        me: Weak<Ostinato>,
        refrain: Arc<dyn Refrain>,
        config: OstinatoConfig,
        generation: u64,
        token: CancellationToken,
    ) {
        let mut iteration: u32 = 0;

        loop {
            if token.is_cancelled() {
                break;
            }
            if config.times.is_some_and(|times| iteration >= times) {
                if let Some(ostinato) = me.upgrade() {
                    ostinato.finish(generation, kind::EXHAUSTED, Value::from(iteration));
                }
                break;
            }

            let played = AssertUnwindSafe(refrain.play(iteration + 1))
                .catch_unwind()
                .await;
            if let Err(panic) = played {
                if let Some(ostinato) = me.upgrade() {
                    ostinato.finish(generation, kind::PANICKED, Value::from(panic_message(&*panic)));
                }
                break;
            }

            iteration += 1;
            match me.upgrade() {
                Some(ostinato) => ostinato.iterations.store(iteration, Ordering::SeqCst),
                None => break,
            }
            if config.times.is_some_and(|times| iteration >= times) {
                continue;
            }

            let sleep = time::sleep(config.tempo.delay(iteration - 1));
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = token.cancelled() => { break; }
            }
        }
    }
}

impl Player for Ostinato {
    fn core(&self) -> &PlayerCore {
        &self.core
    }

    /// Starts a new run unless one is already going.
    ///
    /// Requires a tokio runtime; without one an `"error"` event is emitted and the
    /// ostinato stays paused.
    fn play(&self) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                self.core.emit(kind::ERROR, vec![Value::from(err.to_string())]);
                return;
            }
        };

        let _transition = self.transition.lock();
        let (generation, token) = {
            let mut state = self.state.lock();
            if state.current.is_some() {
                return;
            }
            state.generation += 1;
            let token = CancellationToken::new();
            state.current = Some(Run {
                generation: state.generation,
                token: token.clone(),
            });
            (state.generation, token)
        };

        self.iterations.store(0, Ordering::SeqCst);
        self.core.set_playing(true);
        runtime.spawn(Self::run(
            self.me.clone(),
            Arc::clone(&self.refrain),
            self.config,
            generation,
            token,
        ));
    }

    fn pause(&self) {
        let _transition = self.transition.lock();
        let run = self.state.lock().current.take();
        if let Some(run) = run {
            run.token.cancel();
        }
        self.core.set_playing(false);
    }
}

impl Drop for Ostinato {
    fn drop(&mut self) {
        if let Some(run) = self.state.get_mut().current.take() {
            run.token.cancel();
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "refrain panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    fn counting(
        config: OstinatoConfig,
    ) -> (Arc<Ostinato>, Arc<Mutex<Vec<Instant>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let c = Arc::clone(&calls);
        let ostinato = Ostinato::with_config(
            move |_n| {
                let c = Arc::clone(&c);
                async move {
                    c.lock().push(Instant::now());
                }
            },
            config,
        );
        (ostinato, calls)
    }

    fn every_10ms(times: Option<u32>) -> OstinatoConfig {
        OstinatoConfig {
            times,
            tempo: Tempo::fixed(Duration::from_millis(10)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_times_then_pauses() {
        let (ostinato, calls) = counting(every_10ms(Some(3)));
        let exhausted = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&exhausted);
        ostinato.on(kind::EXHAUSTED, move |ev| e.lock().push(ev.args[0].clone()));

        ostinato.play();
        assert!(ostinato.is_playing());
        time::sleep(Duration::from_millis(200)).await;

        assert_eq!(calls.lock().len(), 3);
        assert_eq!(ostinato.iterations(), 3);
        assert!(!ostinato.is_playing());
        assert_eq!(*exhausted.lock(), vec![Value::from(3u32)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_further_invocations() {
        let (ostinato, calls) = counting(every_10ms(None));
        ostinato.play();
        time::sleep(Duration::from_millis(5)).await;
        assert_eq!(calls.lock().len(), 1);

        ostinato.pause();
        assert!(!ostinato.is_playing());
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_grow_with_factor() {
        let (ostinato, calls) = counting(OstinatoConfig {
            times: Some(4),
            tempo: Tempo::growing(Duration::from_millis(10), 2.0, Duration::from_millis(25)),
        });
        ostinato.play();
        time::sleep(Duration::from_secs(1)).await;

        let calls = calls.lock();
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(25),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_while_playing_is_noop() {
        let (ostinato, calls) = counting(every_10ms(Some(2)));
        ostinato.play();
        ostinato.play();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_exhaustion() {
        let (ostinato, calls) = counting(every_10ms(Some(2)));
        ostinato.play();
        time::sleep(Duration::from_millis(100)).await;
        assert!(!ostinato.is_playing());

        ostinato.play();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.lock().len(), 4);
        assert_eq!(ostinato.iterations(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_times_exhausts_immediately() {
        let (ostinato, calls) = counting(every_10ms(Some(0)));
        ostinato.play();
        time::sleep(Duration::from_millis(50)).await;
        assert!(calls.lock().is_empty());
        assert!(!ostinato.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_refrain_pauses_and_reports() {
        async fn broken(_n: u32) {
            panic!("broken string");
        }
        let ostinato = Ostinato::new(broken);
        let panics = Arc::new(Mutex::new(Vec::new()));
        let p = Arc::clone(&panics);
        ostinato.on(kind::PANICKED, move |ev| p.lock().push(ev.args[0].clone()));

        ostinato.play();
        time::sleep(Duration::from_millis(10)).await;
        assert!(!ostinato.is_playing());
        assert_eq!(*panics.lock(), vec![Value::from("broken string")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_from_exhausted_listener_keeps_playing() {
        let (ostinato, calls) = counting(every_10ms(Some(1)));
        let weak = Arc::downgrade(&ostinato);
        let replays = Arc::new(AtomicU32::new(0));
        let r = Arc::clone(&replays);
        ostinato.on(kind::EXHAUSTED, move |_| {
            if r.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(o) = weak.upgrade() {
                    o.play();
                }
            }
        });

        ostinato.play();
        time::sleep(Duration::from_millis(5)).await;
        assert_eq!(calls.lock().len(), 2);
        assert_eq!(replays.load(Ordering::SeqCst), 2);
        assert!(!ostinato.is_playing());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_play_racing_a_finishing_run_stays_consistent() {
        use std::sync::atomic::AtomicBool;

        for _ in 0..50 {
            let armed = Arc::new(AtomicBool::new(true));
            let beats = Arc::new(AtomicU32::new(0));
            let (a, b) = (Arc::clone(&armed), Arc::clone(&beats));
            let ostinato = Ostinato::with_config(
                move |_n| {
                    let (a, b) = (Arc::clone(&a), Arc::clone(&b));
                    async move {
                        b.fetch_add(1, Ordering::SeqCst);
                        if a.swap(false, Ordering::SeqCst) {
                            panic!("first beat");
                        }
                    }
                },
                OstinatoConfig {
                    times: None,
                    tempo: Tempo::fixed(Duration::from_millis(1)),
                },
            );
            ostinato.play();

            // Hammer play() from another thread while the first run ends by panicking.
            let o = Arc::clone(&ostinato);
            let b = Arc::clone(&beats);
            tokio::task::spawn_blocking(move || {
                while b.load(Ordering::SeqCst) < 2 {
                    o.play();
                    std::thread::yield_now();
                }
            })
            .await
            .unwrap();

            // A second run is live, so the player must report playing.
            assert!(ostinato.is_playing());
            ostinato.pause();
        }
    }

    #[test]
    fn test_play_without_runtime_stays_paused() {
        let ostinato = Ostinato::new(|_n| async {});
        let errors = Arc::new(Mutex::new(0));
        let e = Arc::clone(&errors);
        ostinato.on(kind::ERROR, move |_| *e.lock() += 1);

        ostinato.play();
        assert!(!ostinato.is_playing());
        assert_eq!(*errors.lock(), 1);
    }
}
