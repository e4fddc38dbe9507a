//! # Refrain: the unit of work an ostinato repeats.
//!
//! This module defines the [`Refrain`] trait (async) and a function-backed
//! implementation [`RefrainFn`]. An ostinato holds its refrain as `Arc<dyn Refrain>`.
//!
//! A refrain is not cancelled when the ostinato is paused: an invocation already in
//! progress always runs to completion.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

/// # Async unit of repeated work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use concertino::Refrain;
///
/// struct Poll;
///
/// #[async_trait]
/// impl Refrain for Poll {
///     async fn play(&self, iteration: u32) {
///         // check something...
///         let _ = iteration;
///     }
/// }
/// ```
#[async_trait]
pub trait Refrain: Send + Sync + 'static {
    /// Runs one iteration. `iteration` starts at 1 for each run of the ostinato.
    async fn play(&self, iteration: u32);
}

/// Function-backed refrain.
///
/// Wraps a closure that *creates* a new future per invocation.
#[derive(Debug)]
pub struct RefrainFn<F> {
    f: F,
}

impl<F> RefrainFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the refrain and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Refrain for RefrainFn<F>
where
    F: Fn(u32) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn play(&self, iteration: u32) {
        (self.f)(iteration).await
    }
}
