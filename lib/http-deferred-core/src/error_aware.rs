//! Status-code based failure dispatch on top of a request promise.
//!
//! [`ErrorAwareRequest`] wraps anything implementing [`Promise`] whose error
//! is an [`Error`], and routes the failure through handlers bound to status
//! codes:
//!
//! - [`handle`](ErrorAwareRequest::handle) runs for matching codes, in
//!   registration order, until a handler returns [`Propagation::Stop`];
//! - [`fail`](ErrorAwareRequest::fail) runs only if no code handler ran;
//! - [`unhandled`](ErrorAwareRequest::unhandled) runs only if no `handle`
//!   call ever claimed the failing code.
//!
//! Every failure observer reads the shared [`DispatchPhase`] and flags as
//! left by the observers registered before it.
//!
//! # Example
//!
//! ```
//! use http_deferred_core::{Deferred, Error, ErrorAwareRequest, Propagation};
//!
//! let response = Deferred::<String, Error>::new();
//! let request = ErrorAwareRequest::new(&response);
//!
//! request
//!     .handle(401, |_| Propagation::Stop)?
//!     .handle("5XX", |payload| println!("server error: {}", payload.message))?
//!     .fail(|payload| println!("failed: {}", payload.message));
//!
//! response.reject(Error::http(401, "Unauthorized"));
//! assert!(request.has_been_handled());
//! # Ok::<(), Error>(())
//! ```

use std::collections::HashSet;
use std::fmt;
use std::future::IntoFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::{Deferred, DeferredFuture, Error, ErrorCodes, ErrorPayload, Progress, Promise, Result};

// ============================================================================
// Propagation
// ============================================================================

/// Value returned by a status handler.
///
/// Handlers may also return `()` (continue) or a `bool`, where `false` is
/// the stop sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Let later handlers for the same failure run.
    #[default]
    Continue,
    /// Skip every later code handler for this failure.
    Stop,
}

impl From<()> for Propagation {
    fn from((): ()) -> Self {
        Self::Continue
    }
}

impl From<bool> for Propagation {
    fn from(keep_going: bool) -> Self {
        if keep_going {
            Self::Continue
        } else {
            Self::Stop
        }
    }
}

// ============================================================================
// Dispatch State
// ============================================================================

/// Where the failure dispatch of a request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPhase {
    /// No failure observer has fired.
    #[default]
    Unsettled,
    /// A code handler ran.
    Handled,
    /// The `unhandled` handler ran first.
    Unhandled,
    /// The generic `fail` handler ran first.
    GenericFailed,
}

#[derive(Debug, Default)]
struct DispatchState {
    phase: DispatchPhase,
    has_been_handled: bool,
    stop_propagation: bool,
    registered_codes: HashSet<u16>,
}

impl DispatchState {
    fn claim(&mut self, codes: &[u16]) {
        self.registered_codes.extend(codes.iter().copied());
    }

    fn enter_handler(&mut self, codes: &[u16], status: u16) -> bool {
        if self.stop_propagation || !codes.contains(&status) {
            return false;
        }
        self.has_been_handled = true;
        self.phase = DispatchPhase::Handled;
        true
    }

    fn leave_handler(&mut self, propagation: Propagation) {
        if propagation == Propagation::Stop {
            self.stop_propagation = true;
        }
    }

    fn enter_unhandled(&mut self, status: u16) -> bool {
        if self.registered_codes.contains(&status) {
            return false;
        }
        self.stop_propagation = true;
        self.settle_phase(DispatchPhase::Unhandled);
        true
    }

    fn enter_fail(&mut self) -> bool {
        if self.has_been_handled {
            return false;
        }
        self.settle_phase(DispatchPhase::GenericFailed);
        true
    }

    fn settle_phase(&mut self, phase: DispatchPhase) {
        if self.phase == DispatchPhase::Unsettled {
            self.phase = phase;
        }
    }
}

fn lock(state: &Mutex<DispatchState>) -> MutexGuard<'_, DispatchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Error Aware Request
// ============================================================================

/// A request promise with status-code aware failure handlers.
///
/// Cloning is cheap; clones share handlers and dispatch state, so a handler
/// can capture a clone and call [`stop_handling`](Self::stop_handling).
pub struct ErrorAwareRequest<T> {
    inner: Deferred<T, Error>,
    state: Arc<Mutex<DispatchState>>,
    starter: Arc<dyn Fn() + Send + Sync>,
}

impl<T> Clone for ErrorAwareRequest<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            state: Arc::clone(&self.state),
            starter: Arc::clone(&self.starter),
        }
    }
}

impl<T> fmt::Debug for ErrorAwareRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorAwareRequest")
            .field("inner", &self.inner)
            .field("state", &*lock(&self.state))
            .finish_non_exhaustive()
    }
}

impl<T> ErrorAwareRequest<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap a request.
    ///
    /// Only attaches callbacks to `request`; it neither issues nor awaits it.
    /// A lazy `request` is started by [`start`](Self::start) or `.await`.
    pub fn new<P>(request: &P) -> Self
    where
        P: Promise<Value = T, Error = Error> + Clone + Send + Sync + 'static,
    {
        let inner = Deferred::new();

        let resolve = inner.clone();
        request.on_done(move |value| {
            resolve.resolve(value.clone());
        });
        let reject = inner.clone();
        request.on_fail(move |error| {
            reject.reject(error.clone());
        });
        let notify = inner.clone();
        request.on_progress(move |progress| {
            notify.notify(*progress);
        });

        let source = request.clone();
        Self {
            inner,
            state: Arc::default(),
            starter: Arc::new(move || source.start()),
        }
    }
}

impl<T> ErrorAwareRequest<T> {
    /// Register a callback for the successful outcome.
    pub fn done<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.inner.done(callback);
        self
    }

    /// Register a callback for either outcome.
    pub fn always<F>(&self, callback: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.always(callback);
        self
    }

    /// Register a progress callback.
    pub fn progress<F>(&self, callback: F) -> &Self
    where
        F: FnMut(&Progress) + Send + 'static,
    {
        self.inner.progress(callback);
        self
    }

    /// Send a progress notification to this request's progress callbacks.
    pub fn notify(&self, progress: Progress) -> &Self {
        self.inner.notify(progress);
        self
    }

    /// Chain a continuation.
    ///
    /// The result is a plain [`Deferred`]: status handlers cannot be
    /// registered on it.
    pub fn then<U, E2, S, F>(&self, on_success: S, on_failure: F) -> Deferred<U, E2>
    where
        T: Send + Sync + 'static,
        U: Send + Sync + 'static,
        E2: Send + Sync + 'static,
        S: FnOnce(&T) -> std::result::Result<U, E2> + Send + 'static,
        F: FnOnce(&Error) -> std::result::Result<U, E2> + Send + 'static,
    {
        let next = self.inner.then(on_success, on_failure);
        let starter = Arc::clone(&self.starter);
        next.set_starter(move || starter());
        next
    }

    /// Issue the wrapped request, if it was created lazily.
    ///
    /// Register handlers first: once started, the outcome may arrive on
    /// another thread at any time. Awaiting the request starts it too.
    pub fn start(&self) -> &Self {
        (self.starter)();
        self
    }

    /// Handle failures whose status is one of `codes`.
    ///
    /// `codes` is a status code, a list of codes, a [`StatusGroup`](crate::StatusGroup)
    /// or a group alias (`"4XX"`, `"5XX"`). The handler receives the decoded
    /// failure body; returning [`Propagation::Stop`] (or `false`) skips every
    /// later code handler for this failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidErrorCode`] for an unknown group alias. Nothing
    /// is registered in that case.
    pub fn handle<C, F, R>(&self, codes: C, handler: F) -> Result<&Self>
    where
        C: Into<ErrorCodes>,
        F: FnOnce(&ErrorPayload) -> R + Send + 'static,
        R: Into<Propagation>,
    {
        let codes = codes.into().resolve()?;
        lock(&self.state).claim(&codes);

        let state = Arc::clone(&self.state);
        self.inner.fail(move |error| {
            let status = error.dispatch_status();
            if !lock(&state).enter_handler(&codes, status) {
                return;
            }
            debug!(status, "running status handler");
            let propagation = handler(&ErrorPayload::from_error(error)).into();
            if propagation == Propagation::Stop {
                debug!(status, "status handler stopped propagation");
            }
            lock(&state).leave_handler(propagation);
        });
        Ok(self)
    }

    /// Handle failures whose status no `handle` call claimed.
    ///
    /// Once it runs, later code handlers for this failure are skipped.
    pub fn unhandled<F>(&self, handler: F) -> &Self
    where
        F: FnOnce(&ErrorPayload) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        self.inner.fail(move |error| {
            let status = error.dispatch_status();
            if !lock(&state).enter_unhandled(status) {
                return;
            }
            debug!(status, "running unhandled handler");
            handler(&ErrorPayload::from_error(error));
        });
        self
    }

    /// Handle failures no code handler ran for.
    pub fn fail<F>(&self, handler: F) -> &Self
    where
        F: FnOnce(&ErrorPayload) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        self.inner.fail(move |error| {
            if !lock(&state).enter_fail() {
                return;
            }
            debug!(status = error.dispatch_status(), "running fail handler");
            handler(&ErrorPayload::from_error(error));
        });
        self
    }

    /// The stop sentinel, for `return request.stop_handling()` in a handler.
    #[must_use]
    pub const fn stop_handling(&self) -> Propagation {
        Propagation::Stop
    }

    /// Returns `true` once a code handler has run.
    #[must_use]
    pub fn has_been_handled(&self) -> bool {
        lock(&self.state).has_been_handled
    }

    /// Current dispatch phase.
    #[must_use]
    pub fn phase(&self) -> DispatchPhase {
        lock(&self.state).phase
    }

    /// Returns `true` if some `handle` call claimed `code`.
    #[must_use]
    pub fn is_registered(&self, code: u16) -> bool {
        lock(&self.state).registered_codes.contains(&code)
    }
}

impl<T> Promise for ErrorAwareRequest<T> {
    type Value = T;
    type Error = Error;

    fn on_done<F>(&self, callback: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.inner.done(callback);
    }

    // Raw failure, bypassing status dispatch.
    fn on_fail<F>(&self, callback: F)
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        self.inner.fail(callback);
    }

    fn on_always<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.always(callback);
    }

    fn on_progress<F>(&self, callback: F)
    where
        F: FnMut(&Progress) + Send + 'static,
    {
        self.inner.progress(callback);
    }

    fn start(&self) {
        ErrorAwareRequest::start(self);
    }
}

impl<T: Clone> IntoFuture for ErrorAwareRequest<T> {
    type Output = Result<T>;
    type IntoFuture = DeferredFuture<T, Error>;

    fn into_future(self) -> Self::IntoFuture {
        self.start();
        self.inner.into_future()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert2::{check, let_assert};
    use bytes::Bytes;

    use super::*;
    use crate::{StatusGroup, all_settled, when_all};

    type Response = Deferred<String, Error>;

    fn setup() -> (Response, ErrorAwareRequest<String>) {
        let response = Response::new();
        let request = ErrorAwareRequest::new(&response);
        (response, request)
    }

    fn respond(response: &Response, status: u16) {
        response.reject(Error::http_with_body(status, "error", Bytes::from("{}")));
    }

    /// Call counter usable from `Send + 'static` handlers.
    #[derive(Clone, Default)]
    struct Spy(Arc<AtomicUsize>);

    impl Spy {
        fn hit(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }

        fn called(&self) -> bool {
            self.count() > 0
        }
    }

    #[test]
    fn proxies_done() {
        let (response, request) = setup();
        let (done, failed) = (Spy::default(), Spy::default());
        let (d, f) = (done.clone(), failed.clone());
        request.done(move |_| d.hit()).fail(move |_| f.hit());

        response.resolve("ok".to_string());

        check!(done.count() == 1);
        check!(!failed.called());
    }

    #[test]
    fn proxies_fail() {
        let (response, request) = setup();
        let (done, failed) = (Spy::default(), Spy::default());
        let (d, f) = (done.clone(), failed.clone());
        request.done(move |_| d.hit()).fail(move |_| f.hit());

        respond(&response, 500);

        check!(!done.called());
        check!(failed.count() == 1);
        check!(request.phase() == DispatchPhase::GenericFailed);
    }

    #[test]
    fn proxies_always() {
        let (response, request) = setup();
        let always = Spy::default();
        let a = always.clone();
        request.always(move || a.hit());

        response.resolve("ok".to_string());

        check!(always.count() == 1);
    }

    #[test]
    fn handles_registered_status_codes() {
        let (response, request) = setup();
        let handled = Spy::default();
        let h = handled.clone();
        let_assert!(Ok(_) = request.handle([123], move |_| h.hit()));

        respond(&response, 123);

        check!(handled.count() == 1);
        check!(request.has_been_handled());
        check!(request.phase() == DispatchPhase::Handled);
    }

    #[test]
    fn ignores_success() {
        let (response, request) = setup();
        let handled = Spy::default();
        let h = handled.clone();
        let_assert!(Ok(_) = request.handle([123], move |_| h.hit()));

        response.resolve("ok".to_string());

        check!(!handled.called());
        check!(!request.has_been_handled());
        check!(request.phase() == DispatchPhase::Unsettled);
    }

    #[test]
    fn handles_multiple_codes_once() {
        let (response, request) = setup();
        let handled = Spy::default();
        let h = handled.clone();
        let_assert!(Ok(_) = request.handle([123, 456], move |_| h.hit()));

        respond(&response, 123);

        check!(handled.count() == 1);
    }

    #[test]
    fn handled_failure_skips_fail() {
        let (response, request) = setup();
        let (handled, failed) = (Spy::default(), Spy::default());
        let (h, f) = (handled.clone(), failed.clone());
        let_assert!(Ok(_) = request.handle(500, move |_| h.hit()));
        request.fail(move |_| f.hit());

        respond(&response, 500);

        check!(handled.count() == 1);
        check!(!failed.called());
        check!(request.has_been_handled());
    }

    #[test]
    fn unmatched_failure_calls_fail() {
        let (response, request) = setup();
        let (handled, failed) = (Spy::default(), Spy::default());
        let (h, f) = (handled.clone(), failed.clone());
        let_assert!(Ok(_) = request.handle(500, move |_| h.hit()));
        request.fail(move |_| f.hit());

        respond(&response, 404);

        check!(!handled.called());
        check!(failed.count() == 1);
        check!(!request.has_been_handled());
    }

    #[test]
    fn fail_registered_first_still_runs() {
        let (response, request) = setup();
        let (handled, failed) = (Spy::default(), Spy::default());
        let (h, f) = (handled.clone(), failed.clone());
        request.fail(move |_| f.hit());
        let_assert!(Ok(_) = request.handle(500, move |_| h.hit()));

        respond(&response, 500);

        check!(failed.count() == 1);
        check!(handled.count() == 1);
        check!(request.phase() == DispatchPhase::Handled);
    }

    #[test]
    fn handled_failure_still_calls_always() {
        let (response, request) = setup();
        let (handled, always) = (Spy::default(), Spy::default());
        let (h, a) = (handled.clone(), always.clone());
        let_assert!(Ok(_) = request.handle(500, move |_| h.hit()));
        request.always(move || a.hit());

        respond(&response, 500);

        check!(handled.called());
        check!(always.count() == 1);
    }

    #[test]
    fn runs_every_matching_handler() {
        let (response, request) = setup();
        let (first, second) = (Spy::default(), Spy::default());
        let (h1, h2) = (first.clone(), second.clone());
        let_assert!(Ok(_) = request.handle(500, move |_| h1.hit()));
        let_assert!(Ok(_) = request.handle("5XX", move |_| h2.hit()));

        respond(&response, 500);

        check!(first.count() == 1);
        check!(second.count() == 1);
    }

    #[test]
    fn stop_handling_skips_later_observers() {
        let (response, request) = setup();
        let (later, failed, unhandled) = (Spy::default(), Spy::default(), Spy::default());
        let (l, f, u) = (later.clone(), failed.clone(), unhandled.clone());

        let this = request.clone();
        let_assert!(Ok(_) = request.handle(500, move |_| this.stop_handling()));
        let_assert!(Ok(_) = request.handle(500, move |_| l.hit()));
        request.fail(move |_| f.hit()).unhandled(move |_| u.hit());

        respond(&response, 500);

        check!(!later.called());
        check!(!failed.called());
        check!(!unhandled.called());
        check!(request.has_been_handled());
    }

    #[test]
    fn false_is_the_stop_sentinel() {
        let (response, request) = setup();
        let later = Spy::default();
        let l = later.clone();
        let_assert!(Ok(_) = request.handle(500, |_| false));
        let_assert!(Ok(_) = request.handle(500, move |_| l.hit()));

        respond(&response, 500);

        check!(!later.called());
    }

    #[test]
    fn continue_keeps_propagating() {
        let (response, request) = setup();
        let later = Spy::default();
        let l = later.clone();
        let_assert!(Ok(_) = request.handle(500, |_| true));
        let_assert!(Ok(_) = request.handle(500, |_| Propagation::Continue));
        let_assert!(Ok(_) = request.handle(500, move |_| l.hit()));

        respond(&response, 500);

        check!(later.count() == 1);
    }

    #[test]
    fn unhandled_without_handlers() {
        for status in [0, 400, 404, 500, 599] {
            let (response, request) = setup();
            let unhandled = Spy::default();
            let u = unhandled.clone();
            request.unhandled(move |_| u.hit());

            respond(&response, status);

            check!(unhandled.count() == 1);
            check!(request.phase() == DispatchPhase::Unhandled);
        }
    }

    #[test]
    fn unhandled_skips_claimed_codes() {
        let (response, request) = setup();
        let unhandled = Spy::default();
        let u = unhandled.clone();
        request.unhandled(move |_| u.hit());
        // Claimed after `unhandled` was registered, still before settlement.
        let_assert!(Ok(_) = request.handle(StatusGroup::ClientError, |_| Propagation::Continue));

        respond(&response, 404);

        check!(!unhandled.called());
        check!(request.is_registered(404));
        check!(!request.is_registered(500));
    }

    #[test]
    fn unhandled_ignores_stop_sentinel() {
        let (response, request) = setup();
        let unhandled = Spy::default();
        let u = unhandled.clone();
        let_assert!(Ok(_) = request.handle(500, |_| Propagation::Stop));
        request.unhandled(move |_| u.hit());

        respond(&response, 503);

        check!(unhandled.count() == 1);
    }

    #[test]
    fn unhandled_stops_later_code_handlers() {
        let (response, request) = setup();
        let (unhandled, failed) = (Spy::default(), Spy::default());
        let (u, f) = (unhandled.clone(), failed.clone());
        request.unhandled(move |_| u.hit()).fail(move |_| f.hit());

        respond(&response, 418);

        check!(unhandled.count() == 1);
        // `fail` only looks at whether a code handler ran.
        check!(failed.count() == 1);
        check!(request.phase() == DispatchPhase::Unhandled);
    }

    #[test]
    fn invalid_alias_is_rejected() {
        let (response, request) = setup();
        let handled = Spy::default();
        let h = handled.clone();

        let_assert!(Err(Error::InvalidErrorCode(alias)) = request.handle("6XX", move |_| h.hit()));
        check!(alias == "6XX");

        respond(&response, 600);
        check!(!handled.called());
        check!(!request.is_registered(600));
    }

    #[test]
    fn handler_receives_decoded_payload() {
        let (response, request) = setup();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let_assert!(
            Ok(_) = request.handle(422, move |payload| {
                *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload.clone());
            })
        );

        response.reject(Error::http_with_body(
            422,
            "Unprocessable Entity",
            Bytes::from(r#"{"message":"invalid email","field":"email"}"#),
        ));

        let payload = seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let_assert!(Some(payload) = payload);
        check!(payload.message == "invalid email");
        check!(payload.get("field") == Some(&serde_json::json!("email")));
    }

    #[test]
    fn malformed_body_yields_synthetic_message() {
        let (response, request) = setup();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        request.fail(move |payload| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = payload.message.clone();
        });

        response.reject(Error::http_with_body(500, "error", Bytes::from("not json")));

        let message = seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
        check!(message.contains("not json"));
        check!(message.contains("500"));
    }

    #[test]
    fn handles_after_settlement() {
        let response = Response::rejected(Error::http(500, "Internal Server Error"));
        let request = ErrorAwareRequest::new(&response);
        let (handled, failed) = (Spy::default(), Spy::default());
        let (h, f) = (handled.clone(), failed.clone());

        let_assert!(Ok(_) = request.handle(500, move |_| h.hit()));
        request.fail(move |_| f.hit());

        check!(handled.count() == 1);
        check!(!failed.called());
    }

    #[test]
    fn forwards_progress() {
        let (response, request) = setup();
        let seen = Spy::default();
        let s = seen.clone();
        request.progress(move |_| s.hit());

        response.notify(Progress::new(1, Some(2)));
        request.notify(Progress::new(2, Some(2)));

        check!(seen.count() == 2);
    }

    #[test]
    fn then_escapes_the_wrapper() {
        let (response, request) = setup();
        let length = request.then(|body| Ok::<_, u16>(body.len()), |error| Err(error.dispatch_status()));

        respond(&response, 503);

        let_assert!(Some(outcome) = length.outcome());
        check!(*outcome == Err(503));
    }

    #[test]
    fn is_chainable() {
        let (_response, request) = setup();
        let_assert!(Ok(chained) = request.handle([123, 456], |_| ()));
        check!(std::ptr::eq(chained, &request));
        check!(std::ptr::eq(request.fail(|_| ()), &request));
        check!(std::ptr::eq(request.unhandled(|_| ()), &request));
    }

    #[test]
    fn works_with_when_all() {
        let (first_response, first) = setup();
        let (second_response, second) = setup();
        let all_done = Spy::default();
        let a = all_done.clone();
        when_all(&[first.clone(), second.clone()]).done(move |_| a.hit());

        first_response.resolve("one".to_string());
        second_response.resolve("two".to_string());

        check!(all_done.count() == 1);
    }

    #[test]
    fn handles_with_all_settled() {
        let (first_response, first) = setup();
        let (second_response, second) = setup();
        let (all_done, handled) = (Spy::default(), Spy::default());
        let (a, h) = (all_done.clone(), handled.clone());
        let_assert!(Ok(_) = first.handle(500, move |_| h.hit()));
        all_settled(&[first.clone(), second.clone()]).done(move |_| a.hit());

        respond(&first_response, 500);
        second_response.resolve("ok".to_string());

        check!(all_done.count() == 1);
        check!(handled.count() == 1);
    }

    #[test]
    fn handlers_added_during_dispatch_run_last() {
        let (response, request) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));

        let (this, log) = (request.clone(), Arc::clone(&order));
        let_assert!(
            Ok(_) = request.handle(500, move |_| {
                log.lock().expect("order").push("first");
                let nested = Arc::clone(&log);
                let_assert!(
                    Ok(_) = this.handle(500, move |_| {
                        nested.lock().expect("order").push("nested");
                    })
                );
            })
        );
        let log = Arc::clone(&order);
        let_assert!(
            Ok(_) = request.handle(500, move |_| {
                log.lock().expect("order").push("second");
            })
        );

        respond(&response, 500);

        check!(*order.lock().expect("order") == ["first", "second", "nested"]);
    }

    #[test]
    fn stop_applies_to_handlers_added_during_dispatch() {
        let (response, request) = setup();
        let nested = Spy::default();

        let (this, n) = (request.clone(), nested.clone());
        let_assert!(
            Ok(_) = request.handle(500, move |_| {
                let_assert!(Ok(_) = this.handle(500, move |_| n.hit()));
                Propagation::Stop
            })
        );

        respond(&response, 500);

        check!(!nested.called());
    }

    #[tokio::test]
    async fn lazy_request_starts_on_await() {
        let response = Deferred::lazy(async { Err::<String, _>(Error::http(503, "Service Unavailable")) });
        let request = ErrorAwareRequest::new(&response);
        tokio::task::yield_now().await;
        check!(response.is_pending());

        let handled = Spy::default();
        let h = handled.clone();
        let_assert!(Ok(_) = request.handle("5XX", move |_| h.hit()));

        let outcome = request.clone().await;

        check!(outcome.is_err());
        check!(handled.count() == 1);
    }

    #[tokio::test]
    async fn await_outcome() {
        let response = Deferred::spawn(async { Err::<String, _>(Error::http(404, "Not Found")) });
        let request = ErrorAwareRequest::new(&response);
        let failed = Spy::default();
        let f = failed.clone();
        request.fail(move |_| f.hit());

        let outcome = request.clone().await;

        let_assert!(Err(error) = outcome);
        check!(error.status() == Some(404));
        check!(failed.count() == 1);
    }
}
