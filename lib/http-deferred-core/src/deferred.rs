//! Settle-once deferred values with ordered callback registration.
//!
//! A [`Deferred`] is settled exactly once, either resolved with a value or
//! rejected with an error. Callbacks registered with [`Deferred::done`],
//! [`Deferred::fail`] and [`Deferred::always`] run in registration order when
//! it settles; callbacks registered afterwards run immediately with the
//! stored outcome.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use http_deferred_core::Deferred;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let deferred = Deferred::<u32, String>::new();
//!
//! let log = Arc::clone(&seen);
//! deferred.done(move |value| log.lock().unwrap().push(*value));
//!
//! deferred.resolve(42);
//! deferred.resolve(7); // ignored, already settled
//!
//! assert_eq!(*seen.lock().unwrap(), vec![42]);
//! ```

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tracing::trace;

// ============================================================================
// Promise Contract
// ============================================================================

/// Minimal contract of a settle-once asynchronous outcome.
///
/// Implemented by [`Deferred`] and [`ErrorAwareRequest`](crate::ErrorAwareRequest),
/// and accepted by the [`when_all`](crate::when_all) and
/// [`all_settled`](crate::all_settled) combinators.
pub trait Promise {
    /// Value of a successful outcome.
    type Value;
    /// Error of a failed outcome.
    type Error;

    /// Register a callback for the successful outcome.
    fn on_done<F>(&self, callback: F)
    where
        F: FnOnce(&Self::Value) + Send + 'static;

    /// Register a callback for the failed outcome.
    fn on_fail<F>(&self, callback: F)
    where
        F: FnOnce(&Self::Error) + Send + 'static;

    /// Register a callback for either outcome.
    fn on_always<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static;

    /// Register a progress callback. Transports without progress ignore it.
    fn on_progress<F>(&self, _callback: F)
    where
        F: FnMut(&Progress) + Send + 'static,
    {
    }

    /// Start the underlying work, if it is started lazily.
    ///
    /// Calling it again, or on an eager promise, does nothing.
    fn start(&self) {}
}

// ============================================================================
// Progress
// ============================================================================

/// Progress notification of a pending outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Units done so far (usually bytes).
    pub loaded: u64,
    /// Expected total, when known.
    pub total: Option<u64>,
}

impl Progress {
    /// Creates a progress notification.
    #[must_use]
    pub const fn new(loaded: u64, total: Option<u64>) -> Self {
        Self { loaded, total }
    }

    /// Fraction done, when the total is known and non-zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> Option<f64> {
        self.total
            .filter(|total| *total > 0)
            .map(|total| self.loaded as f64 / total as f64)
    }
}

// ============================================================================
// Deferred
// ============================================================================

/// Observable state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Resolved,
    /// Settled with an error.
    Rejected,
}

type Callback<A> = Box<dyn FnOnce(&A) + Send>;
type AlwaysCallback = Box<dyn FnOnce() + Send>;
type ProgressCallback = Box<dyn FnMut(&Progress) + Send>;
type Starter = Box<dyn FnOnce() + Send>;

enum Observer<T, E> {
    Done(Callback<T>),
    Fail(Callback<E>),
    Always(AlwaysCallback),
}

impl<T, E> Observer<T, E> {
    fn run(self, outcome: &Result<T, E>) {
        match (self, outcome) {
            (Self::Done(callback), Ok(value)) => callback(value),
            (Self::Fail(callback), Err(error)) => callback(error),
            (Self::Always(callback), _) => callback(),
            _ => {}
        }
    }
}

enum State<T, E> {
    Pending {
        observers: Vec<Observer<T, E>>,
        progress: Vec<ProgressCallback>,
    },
    // Outcome stored, observers still running. Observers registered now are
    // queued behind them.
    Dispatching {
        outcome: Arc<Result<T, E>>,
        queued: Vec<Observer<T, E>>,
    },
    Settled(Arc<Result<T, E>>),
}

impl<T, E> State<T, E> {
    fn outcome(&self) -> Option<&Arc<Result<T, E>>> {
        match self {
            Self::Pending { .. } => None,
            Self::Dispatching { outcome, .. } | Self::Settled(outcome) => Some(outcome),
        }
    }
}

struct Shared<T, E> {
    state: State<T, E>,
    starter: Option<Starter>,
    wakers: Vec<Waker>,
}

/// A settle-once outcome with ordered callbacks.
///
/// Cloning is cheap and every clone observes the same outcome.
pub struct Deferred<T, E> {
    shared: Arc<Mutex<Shared<T, E>>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T, E> Deferred<T, E> {
    /// Creates a pending deferred.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: State::Pending {
                    observers: Vec::new(),
                    progress: Vec::new(),
                },
                starter: None,
                wakers: Vec::new(),
            })),
        }
    }

    /// Creates a deferred already resolved with `value`.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        let deferred = Self::new();
        deferred.resolve(value);
        deferred
    }

    /// Creates a deferred already rejected with `error`.
    #[must_use]
    pub fn rejected(error: E) -> Self {
        let deferred = Self::new();
        deferred.reject(error);
        deferred
    }

    fn lock(&self) -> MutexGuard<'_, Shared<T, E>> {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DeferredState {
        match self.lock().state.outcome().map(|outcome| outcome.is_ok()) {
            None => DeferredState::Pending,
            Some(true) => DeferredState::Resolved,
            Some(false) => DeferredState::Rejected,
        }
    }

    /// Returns `true` until the deferred settles.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == DeferredState::Pending
    }

    /// The outcome, once settled.
    #[must_use]
    pub fn outcome(&self) -> Option<Arc<Result<T, E>>> {
        self.lock().state.outcome().cloned()
    }

    /// Resolve with `value`.
    ///
    /// Returns `false` and drops the value if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject with `error`.
    ///
    /// Returns `false` and drops the error if already settled.
    pub fn reject(&self, error: E) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: Result<T, E>) -> bool {
        let outcome = Arc::new(outcome);
        let previous = {
            let mut shared = self.lock();
            if shared.state.outcome().is_some() {
                trace!("deferred already settled, ignoring outcome");
                return false;
            }
            std::mem::replace(
                &mut shared.state,
                State::Dispatching {
                    outcome: Arc::clone(&outcome),
                    queued: Vec::new(),
                },
            )
        };

        let mut batch = match previous {
            State::Pending { observers, .. } => observers,
            State::Dispatching { .. } | State::Settled(_) => Vec::new(),
        };
        let wakers = loop {
            for observer in batch {
                observer.run(&outcome);
            }
            let mut shared = self.lock();
            match &mut shared.state {
                State::Dispatching { queued, .. } if !queued.is_empty() => {
                    batch = std::mem::take(queued);
                }
                _ => {
                    shared.state = State::Settled(Arc::clone(&outcome));
                    break std::mem::take(&mut shared.wakers);
                }
            }
        };
        wakers.into_iter().for_each(Waker::wake);
        true
    }

    fn observe(&self, observer: Observer<T, E>) {
        let replay = {
            let mut shared = self.lock();
            match &mut shared.state {
                State::Pending {
                    observers: queued, ..
                }
                | State::Dispatching { queued, .. } => {
                    queued.push(observer);
                    return;
                }
                State::Settled(outcome) => Arc::clone(outcome),
            }
        };
        observer.run(&replay);
    }

    /// Register a callback for the resolved value.
    pub fn done<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.observe(Observer::Done(Box::new(callback)));
        self
    }

    /// Register a callback for the rejection.
    pub fn fail<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&E) + Send + 'static,
    {
        self.observe(Observer::Fail(Box::new(callback)));
        self
    }

    /// Register a callback for either outcome.
    pub fn always<F>(&self, callback: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.observe(Observer::Always(Box::new(callback)));
        self
    }

    /// Register a progress callback. Ignored once settled.
    pub fn progress<F>(&self, callback: F) -> &Self
    where
        F: FnMut(&Progress) + Send + 'static,
    {
        if let State::Pending { progress, .. } = &mut self.lock().state {
            progress.push(Box::new(callback));
        }
        self
    }

    /// Send a progress notification to the progress callbacks.
    ///
    /// Returns `false` if already settled.
    pub fn notify(&self, progress: Progress) -> bool {
        let mut callbacks = match &mut self.lock().state {
            State::Pending {
                progress: callbacks,
                ..
            } => std::mem::take(callbacks),
            _ => return false,
        };

        for callback in &mut callbacks {
            callback(&progress);
        }

        if let State::Pending {
            progress: registered,
            ..
        } = &mut self.lock().state
        {
            // Callbacks added while notifying go after the existing ones.
            callbacks.append(registered);
            *registered = callbacks;
        }
        true
    }

    pub(crate) fn set_starter<F>(&self, starter: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.lock().starter = Some(Box::new(starter));
    }

    /// Start the work behind a lazy deferred.
    ///
    /// Only the first call does anything; eager deferreds ignore it.
    pub fn start(&self) -> &Self {
        let starter = self.lock().starter.take();
        if let Some(starter) = starter {
            trace!("starting deferred work");
            starter();
        }
        self
    }
}

impl<T, E> Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Settle a new deferred with the output of `future`, spawned on the
    /// current tokio runtime by the first [`start`](Self::start) or `.await`.
    ///
    /// Callbacks registered before starting are guaranteed to see the
    /// outcome in registration order, whatever the runtime flavor.
    ///
    /// # Panics
    ///
    /// Starting panics outside of a tokio runtime.
    pub fn lazy<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let deferred = Self::new();
        let shared = Arc::downgrade(&deferred.shared);
        deferred.set_starter(move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let settle = Self { shared };
            tokio::spawn(async move {
                settle.settle(future.await);
            });
        });
        deferred
    }

    /// Settle a new deferred with the output of `future`, spawned right away
    /// on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let deferred = Self::lazy(future);
        deferred.start();
        deferred
    }

    /// Chain a continuation.
    ///
    /// The returned deferred settles with whatever the matching callback
    /// returns. It is a plain [`Deferred`], whatever wrapped this one;
    /// starting it starts this one.
    pub fn then<U, E2, S, F>(&self, on_success: S, on_failure: F) -> Deferred<U, E2>
    where
        U: Send + Sync + 'static,
        E2: Send + Sync + 'static,
        S: FnOnce(&T) -> Result<U, E2> + Send + 'static,
        F: FnOnce(&E) -> Result<U, E2> + Send + 'static,
    {
        let next = Deferred::new();
        let parent = self.clone();
        next.set_starter(move || {
            parent.start();
        });
        let on_done = next.clone();
        self.done(move |value| {
            on_done.settle(on_success(value));
        });
        let on_fail = next.clone();
        self.fail(move |error| {
            on_fail.settle(on_failure(error));
        });
        next
    }
}

impl<T, E> Promise for Deferred<T, E> {
    type Value = T;
    type Error = E;

    fn on_done<F>(&self, callback: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.done(callback);
    }

    fn on_fail<F>(&self, callback: F)
    where
        F: FnOnce(&E) + Send + 'static,
    {
        self.fail(callback);
    }

    fn on_always<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.always(callback);
    }

    fn on_progress<F>(&self, callback: F)
    where
        F: FnMut(&Progress) + Send + 'static,
    {
        self.progress(callback);
    }

    fn start(&self) {
        Deferred::start(self);
    }
}

// ============================================================================
// Awaiting
// ============================================================================

/// Future resolving to the outcome of a [`Deferred`].
///
/// Completes only after every callback registered before settlement has run.
#[must_use = "futures do nothing unless polled"]
pub struct DeferredFuture<T, E> {
    deferred: Deferred<T, E>,
}

impl<T, E> fmt::Debug for DeferredFuture<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeferredFuture").field(&self.deferred).finish()
    }
}

impl<T: Clone, E: Clone> Future for DeferredFuture<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.deferred.start();
        let mut shared = self.deferred.lock();
        if let State::Settled(outcome) = &shared.state {
            return Poll::Ready(Result::clone(outcome));
        }
        if !shared.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            shared.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T: Clone, E: Clone> IntoFuture for Deferred<T, E> {
    type Output = Result<T, E>;
    type IntoFuture = DeferredFuture<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        DeferredFuture { deferred: self }
    }
}
